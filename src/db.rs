use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::path::PathBuf;

use crate::models::{ExtractedFields, PoRecord, Sender};

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Ok(Self { conn, path })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "potrack") {
            Ok(proj_dirs.data_dir().join("potrack.db"))
        } else {
            // Fallback to current directory
            Ok(PathBuf::from("potrack.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                subject TEXT NOT NULL DEFAULT '',
                from_name TEXT,
                from_address TEXT,
                received_at TEXT NOT NULL DEFAULT '',
                body_preview TEXT NOT NULL DEFAULT '',
                web_link TEXT NOT NULL DEFAULT '',
                candidate_name TEXT,
                phone_number TEXT,
                email TEXT,
                location TEXT,
                position_applied TEXT,
                job_location TEXT,
                end_client TEXT,
                rate TEXT,
                interview_support_by TEXT,
                team_lead TEXT,
                manager TEXT,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_records_received ON records(received_at);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='records'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'potrack init' first."
            ));
        }
        Ok(())
    }

    /// Insert-or-replace keyed by message id. A re-fetched message replaces
    /// its record wholesale; nothing is patched in place.
    pub fn upsert_record(&self, record: &PoRecord) -> Result<()> {
        let extracted = &record.extracted;
        self.conn.execute(
            r#"
            INSERT INTO records (
                id, subject, from_name, from_address, received_at,
                body_preview, web_link,
                candidate_name, phone_number, email, location,
                position_applied, job_location, end_client, rate,
                interview_support_by, team_lead, manager, fetched_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                subject = excluded.subject,
                from_name = excluded.from_name,
                from_address = excluded.from_address,
                received_at = excluded.received_at,
                body_preview = excluded.body_preview,
                web_link = excluded.web_link,
                candidate_name = excluded.candidate_name,
                phone_number = excluded.phone_number,
                email = excluded.email,
                location = excluded.location,
                position_applied = excluded.position_applied,
                job_location = excluded.job_location,
                end_client = excluded.end_client,
                rate = excluded.rate,
                interview_support_by = excluded.interview_support_by,
                team_lead = excluded.team_lead,
                manager = excluded.manager,
                fetched_at = excluded.fetched_at
            "#,
            params![
                record.id,
                record.subject,
                record.from.as_ref().map(|f| f.name.clone()),
                record.from.as_ref().map(|f| f.address.clone()),
                record.received,
                record.body_preview,
                record.web_link,
                extracted.candidate_name,
                extracted.phone_number,
                extracted.email,
                extracted.location,
                extracted.position_applied,
                extracted.job_location,
                extracted.end_client,
                extracted.rate,
                extracted.interview_support_by,
                extracted.team_lead,
                extracted.manager,
            ],
        )?;
        Ok(())
    }

    /// The working set, newest first. Ties and unparseable timestamps fall
    /// back to id order so the grouping engine sees a stable encounter
    /// order.
    pub fn list_records(&self) -> Result<Vec<PoRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject, from_name, from_address, received_at,
                    body_preview, web_link,
                    candidate_name, phone_number, email, location,
                    position_applied, job_location, end_client, rate,
                    interview_support_by, team_lead, manager
             FROM records
             ORDER BY received_at DESC, id ASC",
        )?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list records")
    }

    pub fn get_record(&self, id: &str) -> Result<Option<PoRecord>> {
        let result = self.conn.query_row(
            "SELECT id, subject, from_name, from_address, received_at,
                    body_preview, web_link,
                    candidate_name, phone_number, email, location,
                    position_applied, job_location, end_client, rate,
                    interview_support_by, team_lead, manager
             FROM records WHERE id = ?1",
            [id],
            Self::row_to_record,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count_records(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<PoRecord> {
        let from_name: Option<String> = row.get(2)?;
        let from_address: Option<String> = row.get(3)?;
        let from = match (from_name, from_address) {
            (None, None) => None,
            (name, address) => Some(Sender {
                name: name.unwrap_or_default(),
                address: address.unwrap_or_default(),
            }),
        };

        Ok(PoRecord {
            id: row.get(0)?,
            subject: row.get(1)?,
            from,
            received: row.get(4)?,
            body_preview: row.get(5)?,
            web_link: row.get(6)?,
            extracted: ExtractedFields {
                candidate_name: row.get(7)?,
                phone_number: row.get(8)?,
                email: row.get(9)?,
                location: row.get(10)?,
                position_applied: row.get(11)?,
                job_location: row.get(12)?,
                end_client: row.get(13)?,
                rate: row.get(14)?,
                interview_support_by: row.get(15)?,
                team_lead: row.get(16)?,
                manager: row.get(17)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedFields;

    fn sample(id: &str, received: &str, client: Option<&str>) -> PoRecord {
        PoRecord {
            id: id.to_string(),
            subject: format!("PO {id}"),
            from: Some(Sender {
                name: "Recruiting".to_string(),
                address: "po@staffing.example".to_string(),
            }),
            received: received.to_string(),
            body_preview: "preview".to_string(),
            web_link: format!("https://outlook.example/{id}"),
            extracted: ExtractedFields {
                end_client: client.map(str::to_string),
                ..Default::default()
            },
        }
    }

    fn open_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    #[test]
    fn test_upsert_and_get_round_trip() {
        let db = open_db();
        let record = sample("a1", "2024-03-05T10:00:00Z", Some("AcmeCo"));
        db.upsert_record(&record).unwrap();
        let loaded = db.get_record("a1").unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_upsert_replaces_wholesale() {
        let db = open_db();
        db.upsert_record(&sample("a1", "2024-03-05T10:00:00Z", Some("AcmeCo")))
            .unwrap();

        // Re-fetching the same id replaces every column, including fields
        // that went from present to absent.
        let replacement = sample("a1", "2024-03-06T10:00:00Z", None);
        db.upsert_record(&replacement).unwrap();

        assert_eq!(db.count_records().unwrap(), 1);
        let loaded = db.get_record("a1").unwrap().unwrap();
        assert_eq!(loaded.received, "2024-03-06T10:00:00Z");
        assert_eq!(loaded.extracted.end_client, None);
    }

    #[test]
    fn test_list_orders_newest_first() {
        let db = open_db();
        db.upsert_record(&sample("old", "2024-03-01T10:00:00Z", None))
            .unwrap();
        db.upsert_record(&sample("new", "2024-04-01T10:00:00Z", None))
            .unwrap();
        db.upsert_record(&sample("undated", "", None)).unwrap();

        let ids: Vec<String> = db
            .list_records()
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["new", "old", "undated"]);
    }

    #[test]
    fn test_get_missing_record() {
        let db = open_db();
        assert!(db.get_record("nope").unwrap().is_none());
    }
}
