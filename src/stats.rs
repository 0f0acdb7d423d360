use chrono::DateTime;

use crate::models::PoRecord;

/// One support person's share of the filtered record set.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportStatRow {
    pub support_by: String,
    pub count: usize,
    /// Distinct candidate names among the matches, in first-seen order.
    pub candidates: Vec<String>,
}

/// Counts records per support person under the year/month filter ("All"
/// passes everything). Records whose timestamp does not parse cannot be
/// excluded by a period filter and are always counted. Rows come back by
/// count descending, ties in first-encountered order.
pub fn support_stats(records: &[PoRecord], year: &str, month: &str) -> Vec<SupportStatRow> {
    let mut rows: Vec<SupportStatRow> = Vec::new();

    for record in records {
        if !matches_period(&record.received, year, month) {
            continue;
        }
        let support_by = record
            .extracted
            .interview_support_by
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());
        let candidate = record
            .extracted
            .candidate_name
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());

        match rows.iter_mut().find(|row| row.support_by == support_by) {
            Some(row) => {
                row.count += 1;
                if !row.candidates.contains(&candidate) {
                    row.candidates.push(candidate);
                }
            }
            None => rows.push(SupportStatRow {
                support_by,
                count: 1,
                candidates: vec![candidate],
            }),
        }
    }

    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

fn matches_period(received: &str, year: &str, month: &str) -> bool {
    let Ok(dt) = DateTime::parse_from_rfc3339(received) else {
        return true;
    };
    (year == "All" || dt.format("%Y").to_string() == year)
        && (month == "All" || dt.format("%m").to_string() == month)
}

/// Year and month of the maximum parseable received timestamp, zero-padded.
pub fn latest_period(records: &[PoRecord]) -> Option<(String, String)> {
    records
        .iter()
        .filter_map(|record| DateTime::parse_from_rfc3339(&record.received).ok())
        .max()
        .map(|dt| (dt.format("%Y").to_string(), dt.format("%m").to_string()))
}

/// Filters left unset default to the latest period; an explicit choice
/// (including "All") is used as given.
pub fn resolve_period(
    year: Option<&str>,
    month: Option<&str>,
    records: &[PoRecord],
) -> (String, String) {
    match latest_period(records) {
        Some((latest_year, latest_month)) => (
            year.map(str::to_string).unwrap_or(latest_year),
            month.map(str::to_string).unwrap_or(latest_month),
        ),
        None => (
            year.unwrap_or("All").to_string(),
            month.unwrap_or("All").to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedFields, PoRecord};

    fn record(id: &str, received: &str, support_by: Option<&str>, candidate: Option<&str>) -> PoRecord {
        PoRecord {
            id: id.to_string(),
            subject: format!("PO {id}"),
            from: None,
            received: received.to_string(),
            body_preview: String::new(),
            web_link: String::new(),
            extracted: ExtractedFields {
                interview_support_by: support_by.map(str::to_string),
                candidate_name: candidate.map(str::to_string),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_counts_and_ordering() {
        let records = vec![
            record("1", "2024-03-01T08:00:00Z", Some("Alice"), Some("Jane Doe")),
            record("2", "2024-03-02T08:00:00Z", Some("Bob"), Some("Raj Patel")),
            record("3", "2024-03-03T08:00:00Z", Some("Alice"), Some("Wei Chen")),
            record("4", "2024-03-04T08:00:00Z", Some("Alice"), Some("Jane Doe")),
        ];
        let rows = support_stats(&records, "2024", "03");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].support_by, "Alice");
        assert_eq!(rows[0].count, 3);
        assert_eq!(rows[0].candidates, vec!["Jane Doe", "Wei Chen"]);
        assert_eq!(rows[1].support_by, "Bob");
        assert_eq!(rows[1].count, 1);
    }

    #[test]
    fn test_tied_counts_keep_first_encountered_order() {
        let records = vec![
            record("1", "2024-03-01T08:00:00Z", Some("Bob"), None),
            record("2", "2024-03-02T08:00:00Z", Some("Alice"), None),
        ];
        let rows = support_stats(&records, "All", "All");
        assert_eq!(rows[0].support_by, "Bob");
        assert_eq!(rows[1].support_by, "Alice");
    }

    #[test]
    fn test_absent_names_fall_back_to_unknown() {
        let records = vec![record("1", "2024-03-01T08:00:00Z", None, None)];
        let rows = support_stats(&records, "All", "All");
        assert_eq!(rows[0].support_by, "Unknown");
        assert_eq!(rows[0].candidates, vec!["Unknown"]);
    }

    #[test]
    fn test_period_filter_excludes_other_months() {
        let records = vec![
            record("1", "2024-03-01T08:00:00Z", Some("Alice"), None),
            record("2", "2024-04-01T08:00:00Z", Some("Alice"), None),
        ];
        let rows = support_stats(&records, "2024", "03");
        assert_eq!(rows[0].count, 1);
    }

    #[test]
    fn test_unparseable_dates_bypass_the_period_filter() {
        let records = vec![
            record("1", "2024-03-01T08:00:00Z", Some("A"), Some("Jane Doe")),
            record("2", "2024-03-02T08:00:00Z", Some("A"), Some("Raj Patel")),
            record("3", "2024-03-03T08:00:00Z", Some("A"), Some("Wei Chen")),
            record("4", "2024-03-04T08:00:00Z", Some("B"), Some("Jane Doe")),
            record("5", "not-a-date", Some("C"), Some("Undated")),
        ];
        let rows = support_stats(&records, "2024", "03");
        let c_row = rows.iter().find(|r| r.support_by == "C").unwrap();
        assert_eq!(c_row.count, 1);

        // Still counted under a filter that matches nothing else.
        let rows = support_stats(&records, "2019", "01");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].support_by, "C");
    }

    #[test]
    fn test_latest_period() {
        let records = vec![
            record("1", "2024-03-05T10:00:00Z", None, None),
            record("2", "2024-04-01T09:00:00Z", None, None),
            record("3", "bad", None, None),
        ];
        assert_eq!(
            latest_period(&records),
            Some(("2024".to_string(), "04".to_string()))
        );
        assert_eq!(latest_period(&[record("x", "bad", None, None)]), None);
    }

    #[test]
    fn test_resolve_period_seeds_unset_filters() {
        let records = vec![record("1", "2024-04-01T09:00:00Z", None, None)];
        assert_eq!(
            resolve_period(None, None, &records),
            ("2024".to_string(), "04".to_string())
        );
        // An explicit "All" is honored, not re-seeded.
        assert_eq!(
            resolve_period(Some("All"), None, &records),
            ("All".to_string(), "04".to_string())
        );
        assert_eq!(
            resolve_period(None, None, &[]),
            ("All".to_string(), "All".to_string())
        );
    }
}
