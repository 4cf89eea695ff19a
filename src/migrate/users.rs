// src/migrate/users.rs
//! Users phase: one `users` row per document plus the profile child tables.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::transform::{
    coerce_i64, coerce_timestamp, flatten_preferences, non_empty_str, object_list, opt_str,
    string_list,
};
use super::{insert_child_batch, row, TableStats};
use crate::source::DocumentSource;
use crate::target::{RecordSink, Row};

pub(crate) async fn migrate_users<S: DocumentSource, T: RecordSink>(
    source: &S,
    sink: &T,
    run_at: DateTime<Utc>,
) -> Result<TableStats> {
    let documents = source.read_all("users").await?;
    let mut stats = TableStats::with_total(documents.len());
    info!("Migrating {} users", stats.total);

    for doc in documents {
        // Legacy documents nest the profile under `preferences`.
        let fields = flatten_preferences(doc.fields);
        let parent = user_row(&doc.id, &fields, run_at);

        let user_id = match sink.insert_returning_id("users", &parent).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to migrate user {}: {:#}", doc.id, e);
                stats.record_failure();
                continue;
            }
        };

        insert_user_children(sink, user_id, &fields, &doc.id).await;
        stats.record_success();
    }

    info!(
        "Users phase done: {}/{} (failed: {})",
        stats.success, stats.total, stats.failed
    );
    Ok(stats)
}

fn user_row(source_id: &str, fields: &Map<String, Value>, run_at: DateTime<Utc>) -> Row {
    row(json!({
        "source_id": source_id,
        "full_name": opt_str(fields, "fullName"),
        "headline": opt_str(fields, "headline"),
        "email": non_empty_str(fields, "email"),
        "phone": non_empty_str(fields, "phone"),
        "bio": opt_str(fields, "bio"),
        "is_open_to_work": fields
            .get("isOpenToWork")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        "created_at": coerce_timestamp(fields.get("createdAt"), run_at).to_rfc3339(),
    }))
}

async fn insert_user_children<T: RecordSink>(
    sink: &T,
    user_id: i64,
    fields: &Map<String, Value>,
    source_id: &str,
) {
    let skills: Vec<Row> = string_list(fields.get("skills"))
        .into_iter()
        .map(|skill| row(json!({"user_id": user_id, "skill": skill})))
        .collect();
    insert_child_batch(sink, "user_skills", skills, source_id).await;

    let languages: Vec<Row> = object_list(fields.get("languages"))
        .map(|lang| {
            row(json!({
                "user_id": user_id,
                "name": opt_str(lang, "name"),
                "level": opt_str(lang, "level"),
            }))
        })
        .collect();
    insert_child_batch(sink, "user_languages", languages, source_id).await;

    let experiences: Vec<Row> = object_list(fields.get("experiences"))
        .map(|exp| {
            row(json!({
                "user_id": user_id,
                "company": opt_str(exp, "company"),
                "title": opt_str(exp, "title"),
                "start_date": opt_str(exp, "startDate"),
                "end_date": opt_str(exp, "endDate"),
                "description": opt_str(exp, "description"),
            }))
        })
        .collect();
    insert_child_batch(sink, "user_experiences", experiences, source_id).await;

    let educations: Vec<Row> = object_list(fields.get("educations"))
        .map(|edu| {
            row(json!({
                "user_id": user_id,
                "school": opt_str(edu, "school"),
                "degree": opt_str(edu, "degree"),
                "major": opt_str(edu, "major"),
                "start_date": opt_str(edu, "startDate"),
                "end_date": opt_str(edu, "endDate"),
            }))
        })
        .collect();
    insert_child_batch(sink, "user_educations", educations, source_id).await;

    let positions: Vec<Row> = string_list(fields.get("desiredPositions"))
        .into_iter()
        .map(|position| row(json!({"user_id": user_id, "position": position})))
        .collect();
    insert_child_batch(sink, "user_desired_positions", positions, source_id).await;

    let locations: Vec<Row> = string_list(fields.get("preferredLocations"))
        .into_iter()
        .map(|location| row(json!({"user_id": user_id, "location": location})))
        .collect();
    insert_child_batch(sink, "user_preferred_locations", locations, source_id).await;

    if let Some(Value::Object(range)) = fields.get("salaryRange") {
        let salary = vec![row(json!({
            "user_id": user_id,
            "min_amount": coerce_i64(range.get("min")),
            "max_amount": coerce_i64(range.get("max")),
            "currency": opt_str(range, "currency").unwrap_or("KRW"),
            "negotiable": range
                .get("negotiable")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }))];
        insert_child_batch(sink, "user_salary_ranges", salary, source_id).await;
    }
}
