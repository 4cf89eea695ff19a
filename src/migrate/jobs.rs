// src/migrate/jobs.rs
//! Jobs phase: depends on the Companies phase for `company_id` resolution.
//!
//! A job whose `companyId` cannot be resolved against the freshly migrated
//! companies table is skipped and counted failed; it is never inserted with
//! a dangling reference.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::id_map::IdMap;
use super::transform::{
    coerce_f64, coerce_i64, coerce_timestamp, non_empty_str, opt_str, string_list,
};
use super::{insert_child_batch, row, TableStats};
use crate::source::DocumentSource;
use crate::target::{RecordSink, Row};

pub(crate) async fn migrate_jobs<S: DocumentSource, T: RecordSink>(
    source: &S,
    sink: &T,
    run_at: DateTime<Utc>,
) -> Result<TableStats> {
    let documents = source.read_all("jobs").await?;
    let company_ids = IdMap::load(sink, "companies").await?;

    let mut stats = TableStats::with_total(documents.len());
    info!("Migrating {} jobs", stats.total);

    for doc in documents {
        let company_id = match opt_str(&doc.fields, "companyId")
            .and_then(|source_company| company_ids.get(source_company))
        {
            Some(id) => id,
            None => {
                warn!(
                    "Skipping job {}: companyId {:?} has no migrated company",
                    doc.id,
                    opt_str(&doc.fields, "companyId")
                );
                stats.record_failure();
                continue;
            }
        };

        let parent = job_row(&doc.id, company_id, &doc.fields, run_at);
        let job_id = match sink.insert_returning_id("jobs", &parent).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to migrate job {}: {:#}", doc.id, e);
                stats.record_failure();
                continue;
            }
        };

        insert_job_children(sink, job_id, &doc.fields, &doc.id).await;
        stats.record_success();
    }

    info!(
        "Jobs phase done: {}/{} (failed: {})",
        stats.success, stats.total, stats.failed
    );
    Ok(stats)
}

fn job_row(
    source_id: &str,
    company_id: i64,
    fields: &Map<String, Value>,
    run_at: DateTime<Utc>,
) -> Row {
    let mut parent = row(json!({
        "source_id": source_id,
        "company_id": company_id,
        "title": opt_str(fields, "title"),
        "description": opt_str(fields, "description"),
        "employment_type": non_empty_str(fields, "employmentType"),
        "experience_level": non_empty_str(fields, "experienceLevel"),
        "deadline": fields
            .get("deadline")
            .map(|v| coerce_timestamp(Some(v), run_at).to_rfc3339()),
        "created_at": coerce_timestamp(fields.get("createdAt"), run_at).to_rfc3339(),
    }));

    // Posting tier, payment status and placement flatten onto the parent row.
    if let Some(Value::Object(posting)) = fields.get("posting") {
        parent.extend(row(json!({
            "tier": opt_str(posting, "tier"),
            "posting_price": coerce_i64(posting.get("price")),
            "posting_duration_days": coerce_i64(posting.get("durationDays")),
        })));
    }
    if let Some(Value::Object(payment)) = fields.get("payment") {
        parent.extend(row(json!({
            "payment_status": opt_str(payment, "status"),
            "payment_method": non_empty_str(payment, "method"),
            "paid_at": payment
                .get("paidAt")
                .map(|v| coerce_timestamp(Some(v), run_at).to_rfc3339()),
        })));
    }
    if let Some(Value::Object(placement)) = fields.get("placement") {
        parent.extend(row(json!({
            "is_featured": placement
                .get("isFeatured")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            "display_order": coerce_i64(placement.get("order")),
        })));
    }

    parent
}

async fn insert_job_children<T: RecordSink>(
    sink: &T,
    job_id: i64,
    fields: &Map<String, Value>,
    source_id: &str,
) {
    for (field, table, column) in [
        ("mainTasks", "job_main_tasks", "task"),
        ("requirements", "job_requirements", "requirement"),
        (
            "preferredQualifications",
            "job_preferred_qualifications",
            "qualification",
        ),
        ("benefits", "job_benefits", "benefit"),
        ("tags", "job_tags", "tag"),
    ] {
        let rows: Vec<Row> = string_list(fields.get(field))
            .into_iter()
            .map(|entry| {
                let mut child = Row::new();
                child.insert("job_id".to_string(), json!(job_id));
                child.insert(column.to_string(), json!(entry));
                child
            })
            .collect();
        insert_child_batch(sink, table, rows, source_id).await;
    }

    if let Some(Value::Object(manager)) = fields.get("manager") {
        let managers = vec![row(json!({
            "job_id": job_id,
            "name": opt_str(manager, "name"),
            "email": non_empty_str(manager, "email"),
            "phone": non_empty_str(manager, "phone"),
            "position": opt_str(manager, "position"),
        }))];
        insert_child_batch(sink, "job_managers", managers, source_id).await;
    }

    if let Some(Value::Object(conditions)) = fields.get("workConditions") {
        let work_conditions = vec![row(json!({
            "job_id": job_id,
            "location": opt_str(conditions, "location"),
            "is_remote": conditions
                .get("remote")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            "weekly_hours": coerce_f64(conditions.get("weeklyHours")),
            "salary_min": coerce_i64(conditions.get("salaryMin")),
            "salary_max": coerce_i64(conditions.get("salaryMax")),
        }))];
        insert_child_batch(sink, "job_work_conditions", work_conditions, source_id).await;
    }
}
