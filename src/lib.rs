// src/lib.rs
//! One-time batch migration for the recruiting marketplace: Firestore
//! documents out, normalized Supabase/Postgres rows in.
//!
//! The pipeline is five strictly sequential phases (users, companies, jobs,
//! talent applications, job applications); later phases resolve foreign keys
//! through identifier maps rebuilt from the tables earlier phases filled.

pub mod config;
pub mod migrate;
pub mod source;
pub mod target;

pub use config::MigrationConfig;
pub use migrate::{MigrationReport, Migrator, TableStats};
pub use source::{DocumentSource, FirestoreSource, SourceDocument};
pub use target::{RecordSink, Row, SupabaseTarget};
