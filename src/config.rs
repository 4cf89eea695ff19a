// src/config.rs
//! Migration configuration - config.yaml endpoints plus env-only secrets

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

/// Fully resolved configuration for one migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub firebase_project_id: String,
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub google_access_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EndpointConfig {
    firebase_project_id: Option<String>,
    supabase_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    local: EndpointConfig,
    production: EndpointConfig,
}

impl MigrationConfig {
    /// Load configuration based on environment.
    ///
    /// Endpoints come from the environment or config.yaml (environment wins);
    /// credentials come from the environment only. A missing service role key
    /// aborts here, before any migration work starts.
    pub fn load() -> Result<Self> {
        let environment = Self::get_environment();
        info!("Loading configuration for environment: {}", environment);

        let endpoints = Self::load_endpoints_file(&environment)?;

        let firebase_project_id = std::env::var("FIREBASE_PROJECT_ID")
            .ok()
            .or(endpoints.firebase_project_id)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "FIREBASE_PROJECT_ID not set and no firebase_project_id in config.yaml"
                )
            })?;

        let supabase_url = std::env::var("SUPABASE_URL")
            .ok()
            .or(endpoints.supabase_url)
            .ok_or_else(|| {
                anyhow::anyhow!("SUPABASE_URL not set and no supabase_url in config.yaml")
            })?;

        let supabase_service_role_key =
            std::env::var("SUPABASE_SERVICE_ROLE_KEY").map_err(|_| {
                anyhow::anyhow!(
                    "SUPABASE_SERVICE_ROLE_KEY environment variable not set. \
                     The migration writes with the service role and cannot run without it."
                )
            })?;

        let google_access_token = std::env::var("GOOGLE_ACCESS_TOKEN").map_err(|_| {
            anyhow::anyhow!(
                "GOOGLE_ACCESS_TOKEN environment variable not set. \
                 Needed to read the Firestore source collections."
            )
        })?;

        Ok(Self {
            firebase_project_id,
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_service_role_key,
            google_access_token,
        })
    }

    fn get_environment() -> String {
        std::env::var("HIREBRIDGE_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .or_else(|_| std::env::var("ENV"))
            .unwrap_or_else(|_| "local".to_string())
    }

    /// config.yaml is optional; without it every endpoint must come from env.
    fn load_endpoints_file(environment: &str) -> Result<EndpointConfig> {
        let config_path = PathBuf::from("config.yaml");
        if !config_path.exists() {
            return Ok(EndpointConfig::default());
        }

        let config_content =
            std::fs::read_to_string(&config_path).context("Failed to read config.yaml")?;

        let config_file: ConfigFile =
            serde_yaml::from_str(&config_content).context("Failed to parse config.yaml")?;

        Ok(match environment {
            "production" => config_file.production,
            _ => config_file.local,
        })
    }
}
