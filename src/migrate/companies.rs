// src/migrate/companies.rs
//! Companies phase: company profile rows plus tech stack, benefits, stats,
//! recruiters and offices child tables.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::transform::{
    coerce_i64, coerce_timestamp, non_empty_str, object_list, opt_str, string_list,
};
use super::{insert_child_batch, row, TableStats};
use crate::source::DocumentSource;
use crate::target::{RecordSink, Row};

pub(crate) async fn migrate_companies<S: DocumentSource, T: RecordSink>(
    source: &S,
    sink: &T,
    run_at: DateTime<Utc>,
) -> Result<TableStats> {
    let documents = source.read_all("companies").await?;
    let mut stats = TableStats::with_total(documents.len());
    info!("Migrating {} companies", stats.total);

    for doc in documents {
        let parent = company_row(&doc.id, &doc.fields, run_at);

        let company_id = match sink.insert_returning_id("companies", &parent).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to migrate company {}: {:#}", doc.id, e);
                stats.record_failure();
                continue;
            }
        };

        insert_company_children(sink, company_id, &doc.fields, &doc.id).await;
        stats.record_success();
    }

    info!(
        "Companies phase done: {}/{} (failed: {})",
        stats.success, stats.total, stats.failed
    );
    Ok(stats)
}

fn company_row(source_id: &str, fields: &Map<String, Value>, run_at: DateTime<Utc>) -> Row {
    row(json!({
        "source_id": source_id,
        "name": opt_str(fields, "name"),
        "registration_number": non_empty_str(fields, "registrationNumber"),
        "contact_email": non_empty_str(fields, "contactEmail"),
        "contact_phone": non_empty_str(fields, "contactPhone"),
        "description": opt_str(fields, "description"),
        "website": non_empty_str(fields, "website"),
        // Year often arrives as a numeric string.
        "founded_year": coerce_i64(fields.get("foundedYear")),
        "employee_count": coerce_i64(fields.get("employeeCount")),
        "created_at": coerce_timestamp(fields.get("createdAt"), run_at).to_rfc3339(),
    }))
}

async fn insert_company_children<T: RecordSink>(
    sink: &T,
    company_id: i64,
    fields: &Map<String, Value>,
    source_id: &str,
) {
    let tech_stack: Vec<Row> = string_list(fields.get("techStack"))
        .into_iter()
        .map(|tech| row(json!({"company_id": company_id, "tech": tech})))
        .collect();
    insert_child_batch(sink, "company_tech_stack", tech_stack, source_id).await;

    // Benefits arrive grouped by category: {"culture": ["a", "b"], ...}.
    if let Some(Value::Object(grouped)) = fields.get("benefits") {
        let mut benefits = Vec::new();
        for (category, entries) in grouped {
            for benefit in string_list(Some(entries)) {
                benefits.push(row(json!({
                    "company_id": company_id,
                    "category": category,
                    "benefit": benefit,
                })));
            }
        }
        insert_child_batch(sink, "company_benefits", benefits, source_id).await;
    }

    if let Some(Value::Object(company_stats)) = fields.get("stats") {
        let stats_row = vec![row(json!({
            "company_id": company_id,
            "average_salary": coerce_i64(company_stats.get("averageSalary")),
            "average_tenure_years": coerce_i64(company_stats.get("averageTenureYears")),
            "turnover_rate": company_stats.get("turnoverRate").cloned(),
        }))];
        insert_child_batch(sink, "company_stats", stats_row, source_id).await;
    }

    let recruiters: Vec<Row> = object_list(fields.get("recruiters"))
        .map(|recruiter| {
            row(json!({
                "company_id": company_id,
                "name": opt_str(recruiter, "name"),
                "email": non_empty_str(recruiter, "email"),
                "position": opt_str(recruiter, "position"),
            }))
        })
        .collect();
    insert_child_batch(sink, "company_recruiters", recruiters, source_id).await;

    let offices: Vec<Row> = object_list(fields.get("offices"))
        .map(|office| {
            row(json!({
                "company_id": company_id,
                "name": opt_str(office, "name"),
                "address": opt_str(office, "address"),
                "city": opt_str(office, "city"),
                "is_headquarters": office
                    .get("isHeadquarters")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }))
        })
        .collect();
    insert_child_batch(sink, "company_offices", offices, source_id).await;
}
