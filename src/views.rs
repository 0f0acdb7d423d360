use chrono::DateTime;

use crate::models::PoRecord;

/// Records sharing one calendar month of receipt. `key` sorts as `YYYY-MM`;
/// unparseable timestamps collect under "Unknown Month" / "0000-00".
#[derive(Debug, Clone, PartialEq)]
pub struct MonthBucket {
    pub label: String,
    pub key: String,
    pub groups: Vec<CandidateGroup>,
}

/// Records within one month sharing a candidate key, in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGroup {
    pub key: String,
    pub display: String,
    pub records: Vec<PoRecord>,
}

/// Case-insensitive substring filter over the searchable text of each
/// record. An empty or whitespace query matches everything.
pub fn filter_records(records: &[PoRecord], query: &str) -> Vec<PoRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| haystack(record).contains(&needle))
        .cloned()
        .collect()
}

fn haystack(record: &PoRecord) -> String {
    let extracted = &record.extracted;
    let mut parts: Vec<&str> = vec![&record.subject];
    if let Some(from) = &record.from {
        parts.push(&from.name);
        parts.push(&from.address);
    }
    parts.push(&record.received);
    for field in [
        &extracted.candidate_name,
        &extracted.email,
        &extracted.location,
        &extracted.job_location,
        &extracted.end_client,
        &extracted.rate,
    ] {
        if let Some(value) = field {
            parts.push(value);
        }
    }
    parts.join(" ").to_lowercase()
}

/// Month label and sort key for a received timestamp.
pub fn month_parts(received: &str) -> (String, String) {
    match DateTime::parse_from_rfc3339(received) {
        Ok(dt) => (dt.format("%B %Y").to_string(), dt.format("%Y-%m").to_string()),
        Err(_) => ("Unknown Month".to_string(), "0000-00".to_string()),
    }
}

/// Epoch seconds for ordering; absent or malformed timestamps compare as 0.
pub fn received_epoch(received: &str) -> i64 {
    DateTime::parse_from_rfc3339(received)
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

/// Candidate grouping key: extracted name, else the subject, else
/// "Untitled".
pub fn candidate_key(record: &PoRecord) -> String {
    if let Some(name) = &record.extracted.candidate_name {
        return name.clone();
    }
    let subject = record.subject.trim();
    if !subject.is_empty() {
        return subject.to_string();
    }
    "Untitled".to_string()
}

/// Company dedup key: end client, else job location, else
/// "Unknown Company".
pub fn company_key(record: &PoRecord) -> String {
    record
        .extracted
        .end_client
        .clone()
        .or_else(|| record.extracted.job_location.clone())
        .unwrap_or_else(|| "Unknown Company".to_string())
}

/// Filters, buckets by month, and groups by candidate. Buckets are built
/// in first-seen order, then emitted most recent month first (descending
/// string comparison on the sort key, so "0000-00" lands last). Groups
/// keep their first-seen order within a bucket.
pub fn month_buckets(records: &[PoRecord], query: &str) -> Vec<MonthBucket> {
    let mut buckets: Vec<MonthBucket> = Vec::new();

    for record in filter_records(records, query) {
        let (label, key) = month_parts(&record.received);
        let bucket_idx = match buckets.iter().position(|b| b.key == key) {
            Some(idx) => idx,
            None => {
                buckets.push(MonthBucket {
                    label,
                    key,
                    groups: Vec::new(),
                });
                buckets.len() - 1
            }
        };

        let group_key = candidate_key(&record);
        let bucket = &mut buckets[bucket_idx];
        match bucket.groups.iter_mut().find(|g| g.key == group_key) {
            Some(group) => group.records.push(record),
            None => bucket.groups.push(CandidateGroup {
                display: group_key.clone(),
                key: group_key,
                records: vec![record],
            }),
        }
    }

    buckets.sort_by(|a, b| b.key.cmp(&a.key));
    buckets
}

/// At most one record per distinct company key, keeping the one with the
/// maximum received timestamp (equal timestamps: the later-encountered
/// record wins). Survivors come back newest first.
pub fn dedup_by_company(group: &CandidateGroup) -> Vec<PoRecord> {
    let mut kept: Vec<(String, PoRecord)> = Vec::new();

    for record in &group.records {
        let key = company_key(record);
        match kept.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                if received_epoch(&record.received) >= received_epoch(&existing.received) {
                    *existing = record.clone();
                }
            }
            None => kept.push((key, record.clone())),
        }
    }

    let mut survivors: Vec<PoRecord> = kept.into_iter().map(|(_, record)| record).collect();
    survivors.sort_by_key(|record| std::cmp::Reverse(received_epoch(&record.received)));
    survivors
}
