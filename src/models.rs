use serde::{Deserialize, Serialize};

/// Sender of a mailbox message, flattened from the nested upstream shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub name: String,
    pub address: String,
}

/// A message as fetched from the mailbox API, before extraction.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    pub subject: String,
    pub from: Option<Sender>,
    pub received: String, // ISO-8601, possibly empty
    pub body_preview: String,
    pub web_link: String,
    pub body_html: String,
}

/// Fields pulled out of one notification letter. Every field is either a
/// trimmed non-empty string or None; extraction never fails.
///
/// On the wire each field is a string, with the empty string standing in
/// for an absent value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default, with = "blank")]
    pub candidate_name: Option<String>,
    #[serde(default, with = "blank")]
    pub email: Option<String>,
    #[serde(default, with = "blank")]
    pub phone_number: Option<String>,
    #[serde(default, with = "blank")]
    pub location: Option<String>,
    #[serde(default, with = "blank")]
    pub position_applied: Option<String>,
    #[serde(default, with = "blank")]
    pub job_location: Option<String>,
    #[serde(default, with = "blank")]
    pub end_client: Option<String>,
    #[serde(default, with = "blank")]
    pub rate: Option<String>,
    #[serde(default, with = "blank")]
    pub interview_support_by: Option<String>,
    #[serde(default, with = "blank")]
    pub team_lead: Option<String>,
    #[serde(default, with = "blank")]
    pub manager: Option<String>,
}

/// A fetched message joined with its extracted fields. The unit stored and
/// displayed; re-fetching the same id replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoRecord {
    pub id: String,
    pub subject: String,
    pub from: Option<Sender>,
    #[serde(rename = "receivedDateTime")]
    pub received: String,
    #[serde(rename = "bodyPreview")]
    pub body_preview: String,
    #[serde(rename = "webLink")]
    pub web_link: String,
    pub extracted: ExtractedFields,
}

mod blank {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let trimmed = raw.trim();
        Ok(if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> PoRecord {
        PoRecord {
            id: "AAMk123".to_string(),
            subject: "PO for Jane Doe".to_string(),
            from: Some(Sender {
                name: "Recruiting".to_string(),
                address: "noreply@staffing.example".to_string(),
            }),
            received: "2024-03-05T10:00:00Z".to_string(),
            body_preview: "Name of Candidate: Jane Doe".to_string(),
            web_link: "https://outlook.example/AAMk123".to_string(),
            extracted: ExtractedFields {
                candidate_name: Some("Jane Doe".to_string()),
                end_client: Some("AcmeCo".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_record_json_field_names() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["id"], "AAMk123");
        assert_eq!(value["receivedDateTime"], "2024-03-05T10:00:00Z");
        assert_eq!(value["bodyPreview"], "Name of Candidate: Jane Doe");
        assert_eq!(value["webLink"], "https://outlook.example/AAMk123");
        assert_eq!(value["from"]["name"], "Recruiting");
        assert_eq!(value["from"]["address"], "noreply@staffing.example");
        assert_eq!(value["extracted"]["candidate_name"], "Jane Doe");
        assert_eq!(value["extracted"]["end_client"], "AcmeCo");
    }

    #[test]
    fn test_absent_fields_serialize_as_empty_strings() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["extracted"]["manager"], "");
        assert_eq!(value["extracted"]["rate"], "");
        assert_eq!(value["extracted"]["team_lead"], "");
    }

    #[test]
    fn test_missing_sender_serializes_as_null() {
        let mut record = sample_record();
        record.from = None;
        let value = serde_json::to_value(record).unwrap();
        assert!(value["from"].is_null());
    }

    #[test]
    fn test_empty_strings_deserialize_as_absent() {
        let json = r#"{
            "id": "x", "subject": "s", "from": null,
            "receivedDateTime": "", "bodyPreview": "", "webLink": "",
            "extracted": {
                "candidate_name": "Jane Doe", "email": "", "phone_number": "",
                "location": "  ", "position_applied": "", "job_location": "",
                "end_client": "", "rate": "", "interview_support_by": "",
                "team_lead": "", "manager": ""
            }
        }"#;
        let record: PoRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.extracted.candidate_name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.extracted.email, None);
        assert_eq!(record.extracted.location, None);
    }

    #[test]
    fn test_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: PoRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
