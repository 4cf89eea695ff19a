// src/migrate/applications.rs
//! Application phases: flat records wired to earlier phases through id maps.
//!
//! Talent and applicant references are hard requirements; a lookup miss
//! skips the record. The `job_id` on a job application is different: the
//! source data historically tolerated jobs that were never linked, so it is
//! resolved when possible and left null otherwise.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::id_map::IdMap;
use super::transform::{coerce_timestamp, non_empty_str, opt_str};
use super::{row, TableStats};
use crate::source::DocumentSource;
use crate::target::RecordSink;

pub(crate) async fn migrate_talent_applications<S: DocumentSource, T: RecordSink>(
    source: &S,
    sink: &T,
    run_at: DateTime<Utc>,
) -> Result<TableStats> {
    let documents = source.read_all("talent_applications").await?;
    let user_ids = IdMap::load(sink, "users").await?;

    let mut stats = TableStats::with_total(documents.len());
    info!("Migrating {} talent applications", stats.total);

    for doc in documents {
        let talent_id = match opt_str(&doc.fields, "talentId")
            .and_then(|source_talent| user_ids.get(source_talent))
        {
            Some(id) => id,
            None => {
                warn!(
                    "Skipping talent application {}: talentId {:?} has no migrated user",
                    doc.id,
                    opt_str(&doc.fields, "talentId")
                );
                stats.record_failure();
                continue;
            }
        };

        let parent = row(json!({
            "source_id": doc.id.as_str(),
            "talent_id": talent_id,
            "message": opt_str(&doc.fields, "message"),
            "status": opt_str(&doc.fields, "status").unwrap_or("pending"),
            "created_at": coerce_timestamp(doc.fields.get("createdAt"), run_at).to_rfc3339(),
        }));

        match sink.insert_returning_id("talent_applications", &parent).await {
            Ok(_) => stats.record_success(),
            Err(e) => {
                warn!("Failed to migrate talent application {}: {:#}", doc.id, e);
                stats.record_failure();
            }
        }
    }

    info!(
        "TalentApplications phase done: {}/{} (failed: {})",
        stats.success, stats.total, stats.failed
    );
    Ok(stats)
}

pub(crate) async fn migrate_job_applications<S: DocumentSource, T: RecordSink>(
    source: &S,
    sink: &T,
    run_at: DateTime<Utc>,
) -> Result<TableStats> {
    let documents = source.read_all("job_applications").await?;
    let user_ids = IdMap::load(sink, "users").await?;
    let company_ids = IdMap::load(sink, "companies").await?;
    let job_ids = IdMap::load(sink, "jobs").await?;

    let mut stats = TableStats::with_total(documents.len());
    info!("Migrating {} job applications", stats.total);

    for doc in documents {
        let applicant_id = match opt_str(&doc.fields, "applicantId")
            .and_then(|source_applicant| user_ids.get(source_applicant))
        {
            Some(id) => id,
            None => {
                warn!(
                    "Skipping job application {}: applicantId {:?} has no migrated user",
                    doc.id,
                    opt_str(&doc.fields, "applicantId")
                );
                stats.record_failure();
                continue;
            }
        };

        let company_id = match opt_str(&doc.fields, "companyId")
            .and_then(|source_company| company_ids.get(source_company))
        {
            Some(id) => id,
            None => {
                warn!(
                    "Skipping job application {}: companyId {:?} has no migrated company",
                    doc.id,
                    opt_str(&doc.fields, "companyId")
                );
                stats.record_failure();
                continue;
            }
        };

        // Nullable by design: the source never guaranteed a job link, so an
        // unresolvable jobId degrades to null instead of skipping the record.
        let job_id = opt_str(&doc.fields, "jobId")
            .and_then(|source_job| {
                let resolved = job_ids.get(source_job);
                if resolved.is_none() {
                    warn!(
                        "Job application {} references unmigrated job {}; leaving job_id null",
                        doc.id, source_job
                    );
                }
                resolved
            })
            .map(Value::from)
            .unwrap_or(Value::Null);

        let parent = row(json!({
            "source_id": doc.id.as_str(),
            "applicant_id": applicant_id,
            "company_id": company_id,
            "job_id": job_id,
            "cover_letter": non_empty_str(&doc.fields, "coverLetter"),
            "status": opt_str(&doc.fields, "status").unwrap_or("pending"),
            "created_at": coerce_timestamp(doc.fields.get("createdAt"), run_at).to_rfc3339(),
        }));

        match sink.insert_returning_id("job_applications", &parent).await {
            Ok(_) => stats.record_success(),
            Err(e) => {
                warn!("Failed to migrate job application {}: {:#}", doc.id, e);
                stats.record_failure();
            }
        }
    }

    info!(
        "JobApplications phase done: {}/{} (failed: {})",
        stats.success, stats.total, stats.failed
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::super::companies::migrate_companies;
    use super::super::jobs::migrate_jobs;
    use super::super::testutil::{MemorySink, MemorySource};
    use super::super::users::migrate_users;
    use super::*;

    fn run_at() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    async fn seeded_sink(source: &MemorySource) -> MemorySink {
        let sink = MemorySink::default();
        migrate_users(source, &sink, run_at()).await.unwrap();
        migrate_companies(source, &sink, run_at()).await.unwrap();
        migrate_jobs(source, &sink, run_at()).await.unwrap();
        sink
    }

    #[tokio::test]
    async fn talent_application_requires_a_migrated_talent() {
        let mut source = MemorySource::default();
        source.put("users", "u1", json!({"fullName": "Kim Jiyoung"}));
        source.put(
            "talent_applications",
            "t1",
            json!({"talentId": "u1", "message": "Interested", "status": "reviewing"}),
        );
        source.put(
            "talent_applications",
            "t2",
            json!({"talentId": "ghost"}),
        );

        let sink = seeded_sink(&source).await;
        let stats = migrate_talent_applications(&source, &sink, run_at())
            .await
            .unwrap();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 1);

        let rows = sink.rows("talent_applications");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("status"), Some(&json!("reviewing")));
        assert!(rows[0].get("talent_id").unwrap().is_i64());
    }

    #[tokio::test]
    async fn job_application_requires_applicant_and_company() {
        let mut source = MemorySource::default();
        source.put("users", "u1", json!({"fullName": "Kim Jiyoung"}));
        source.put("companies", "c1", json!({"name": "Hanbit Soft"}));
        source.put(
            "job_applications",
            "a1",
            json!({"applicantId": "u1", "companyId": "c1"}),
        );
        source.put(
            "job_applications",
            "a2",
            json!({"applicantId": "u1", "companyId": "ghost"}),
        );
        source.put(
            "job_applications",
            "a3",
            json!({"applicantId": "ghost", "companyId": "c1"}),
        );

        let sink = seeded_sink(&source).await;
        let stats = migrate_job_applications(&source, &sink, run_at())
            .await
            .unwrap();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(sink.rows("job_applications").len(), 1);
    }

    #[tokio::test]
    async fn job_reference_resolves_when_possible_and_nulls_otherwise() {
        let mut source = MemorySource::default();
        source.put("users", "u1", json!({"fullName": "Kim Jiyoung"}));
        source.put("companies", "c1", json!({"name": "Hanbit Soft"}));
        source.put(
            "jobs",
            "j1",
            json!({"title": "Backend", "companyId": "c1"}),
        );
        source.put(
            "job_applications",
            "a1",
            json!({"applicantId": "u1", "companyId": "c1", "jobId": "j1"}),
        );
        source.put(
            "job_applications",
            "a2",
            json!({"applicantId": "u1", "companyId": "c1", "jobId": "gone"}),
        );
        source.put(
            "job_applications",
            "a3",
            json!({"applicantId": "u1", "companyId": "c1"}),
        );

        let sink = seeded_sink(&source).await;
        let stats = migrate_job_applications(&source, &sink, run_at())
            .await
            .unwrap();

        // A dangling or absent jobId degrades to null, never to a skip.
        assert_eq!(stats.success, 3);
        assert_eq!(stats.failed, 0);

        let job_ids = sink.column("job_applications", "job_id");
        assert!(job_ids[0].is_i64());
        assert_eq!(job_ids[1], Value::Null);
        assert_eq!(job_ids[2], Value::Null);
    }

    #[tokio::test]
    async fn empty_application_collections_report_zero() {
        let source = MemorySource::default();
        let sink = MemorySink::default();

        let stats = migrate_talent_applications(&source, &sink, run_at())
            .await
            .unwrap();
        assert_eq!(stats, TableStats::with_total(0));

        let stats = migrate_job_applications(&source, &sink, run_at())
            .await
            .unwrap();
        assert_eq!(stats, TableStats::with_total(0));
    }
}
