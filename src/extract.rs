use anyhow::Result;
use regex::Regex;

use crate::models::ExtractedFields;

#[derive(Debug, Clone, Copy)]
enum Field {
    CandidateName,
    PhoneNumber,
    Email,
    Location,
    PositionApplied,
    JobLocation,
    EndClient,
    Rate,
}

/// How the text after an anchor is captured.
#[derive(Debug, Clone, Copy)]
enum Capture {
    /// Free text, non-greedy, up to the first terminator or end of text.
    Until(&'static [&'static str]),
    /// A run of digits and phone punctuation.
    Phone,
    /// An email-address-shaped token.
    Email,
    /// A 2-3 letter code.
    Code,
    /// Numeric amount with an optional unit, currency symbol excluded.
    Amount,
}

struct FieldRule {
    field: Field,
    anchor: &'static str,
    capture: Capture,
}

/// The letter grammar: one rule per labeled field, in letter order.
const RULES: &[FieldRule] = &[
    FieldRule {
        field: Field::CandidateName,
        anchor: "Name of Candidate:",
        capture: Capture::Until(&["SST", "Location", "PO"]),
    },
    FieldRule {
        field: Field::PhoneNumber,
        anchor: "Personal Phone Number",
        capture: Capture::Phone,
    },
    FieldRule {
        field: Field::Email,
        anchor: "Email ID",
        capture: Capture::Email,
    },
    FieldRule {
        field: Field::Location,
        anchor: "Location",
        capture: Capture::Code,
    },
    FieldRule {
        field: Field::PositionApplied,
        anchor: "Position that Applied:",
        capture: Capture::Until(&["Job Location"]),
    },
    FieldRule {
        field: Field::JobLocation,
        anchor: "Job Location:",
        capture: Capture::Until(&["Implementation/End Client"]),
    },
    FieldRule {
        field: Field::EndClient,
        anchor: "Implementation/End Client",
        capture: Capture::Until(&["Vendor Details", "Rate:"]),
    },
    FieldRule {
        field: Field::Rate,
        anchor: "Rate:",
        capture: Capture::Amount,
    },
];

impl FieldRule {
    fn pattern(&self) -> String {
        let anchor = regex::escape(self.anchor);
        match self.capture {
            Capture::Until(terminators) => {
                let stops = terminators
                    .iter()
                    .map(|t| regex::escape(t))
                    .collect::<Vec<_>>()
                    .join("|");
                format!(r"(?i){anchor}\s*:?\s*(.+?)\s*(?:{stops}|$)")
            }
            Capture::Phone => format!(r"(?i){anchor}\s*:?\s*([0-9(+][0-9()+\-. ]*)"),
            Capture::Email => format!(
                r"(?i){anchor}\s*:?\s*([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{{2,}})"
            ),
            Capture::Code => format!(r"(?i){anchor}\s*:?\s*([A-Za-z]{{2,3}})\b"),
            Capture::Amount => {
                format!(r"(?i){anchor}\s*\$?\s*([0-9][0-9.,]*(?:\s*/\s*[A-Za-z]+)?)")
            }
        }
    }
}

/// Applies the field grammar to normalized letter text. Anchors that do not
/// occur resolve to absent fields; extraction is total over all inputs.
pub struct FieldExtractor {
    rules: Vec<(Field, Regex)>,
    support_section: Regex,
    support_by: Regex,
    team_lead: Regex,
    manager: Regex,
}

impl FieldExtractor {
    pub fn new() -> Result<Self> {
        let mut rules = Vec::with_capacity(RULES.len());
        for rule in RULES {
            rules.push((rule.field, Regex::new(&rule.pattern())?));
        }
        Ok(Self {
            rules,
            // The support block is isolated first so that a "Manager" label
            // elsewhere in the letter is never captured.
            support_section: Regex::new(
                r"(?i)Interview Support.*?Support by\s*:?\s*(.+?)\s*(?:Marketing Application|Thanks|$)",
            )?,
            support_by: Regex::new(r"(?i)^(.*?)\s*(?:Team Lead|$)")?,
            team_lead: Regex::new(r"(?i)Team Lead\s*:?\s*(.*?)\s*(?:Manager|$)")?,
            manager: Regex::new(r"(?i)Manager\s*:?\s*(.*?)\s*(?:Marketing|$)")?,
        })
    }

    pub fn extract(&self, text: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::default();

        for (field, re) in &self.rules {
            let value = first_capture(re, text);
            match field {
                Field::CandidateName => fields.candidate_name = value,
                Field::PhoneNumber => fields.phone_number = value,
                Field::Email => fields.email = value,
                Field::Location => fields.location = value,
                Field::PositionApplied => fields.position_applied = value,
                Field::JobLocation => fields.job_location = value,
                Field::EndClient => fields.end_client = value,
                Field::Rate => fields.rate = value,
            }
        }

        if let Some(span) = first_capture(&self.support_section, text) {
            fields.interview_support_by = first_capture(&self.support_by, &span);
            fields.team_lead = first_capture(&self.team_lead, &span);
            fields.manager = first_capture(&self.manager, &span);
        }

        fields
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}
