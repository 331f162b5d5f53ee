//! Note templates and structured note output.
//!
//! Templates are immutable configuration: a prompt body with named
//! placeholders plus the sections the generated text must contain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Appointment, PatientDetails};

/// Kind of document to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Soap,
    ClientSummary,
    Email,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [
        TemplateKind::Soap,
        TemplateKind::ClientSummary,
        TemplateKind::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Soap => "soap",
            TemplateKind::ClientSummary => "client_summary",
            TemplateKind::Email => "email",
        }
    }

    /// Template definition for this kind.
    pub fn spec(&self) -> &'static TemplateSpec {
        match self {
            TemplateKind::Soap => &SOAP_TEMPLATE,
            TemplateKind::ClientSummary => &CLIENT_SUMMARY_TEMPLATE,
            TemplateKind::Email => &EMAIL_TEMPLATE,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(|c: char| c == ' ' || c == '-', "_").as_str() {
            "soap" | "soap_note" => Ok(TemplateKind::Soap),
            "client_summary" | "summary" => Ok(TemplateKind::ClientSummary),
            "email" | "client_email" => Ok(TemplateKind::Email),
            _ => Err(s.to_string()),
        }
    }
}

/// A note template.
#[derive(Debug)]
pub struct TemplateSpec {
    pub kind: TemplateKind,
    /// Display name
    pub title: &'static str,
    /// Prompt body with `{placeholder}` slots
    pub body: &'static str,
    /// Headings the output must contain, in expected order
    pub required_sections: &'static [&'static str],
}

/// Placeholders recognized by [`TemplateSpec::render`].
pub const PLACEHOLDERS: &[&str] = &[
    "patient_name",
    "species",
    "breed",
    "age",
    "owner_name",
    "veterinarian",
    "visit_date",
    "reason",
    "transcript",
];

/// Value rendered for context fields that were not captured.
pub const NOT_RECORDED: &str = "Not recorded";

pub static SOAP_TEMPLATE: TemplateSpec = TemplateSpec {
    kind: TemplateKind::Soap,
    title: "SOAP Note",
    body: r#"Write a veterinary SOAP note from the appointment transcript below.

Patient: {patient_name} ({species}; breed: {breed}; age: {age})
Owner: {owner_name}
Veterinarian: {veterinarian}
Visit date: {visit_date}
Reason for visit: {reason}

Use exactly these section headings, each on its own line:
Subjective:
Objective:
Assessment:
Plan:

Under Objective, record vital signs and examination findings that were stated.
When dental findings are mentioned, include the modified Triadan tooth number
(for example "104 fractured, mild"). Do not add findings that are not in the
transcript; write "Not recorded" when a section has no information.

Transcript:
{transcript}"#,
    required_sections: &["Subjective", "Objective", "Assessment", "Plan"],
};

pub static CLIENT_SUMMARY_TEMPLATE: TemplateSpec = TemplateSpec {
    kind: TemplateKind::ClientSummary,
    title: "Client Summary",
    body: r#"Write a short, friendly visit summary for the owner of {patient_name}
({species}, {breed}). Use plain language without medical jargon.

Owner: {owner_name}
Veterinarian: {veterinarian}
Visit date: {visit_date}
Reason for visit: {reason}

Use exactly these section headings, each on its own line:
Visit Summary:
Home Care:
Follow-Up:

Transcript:
{transcript}"#,
    required_sections: &["Visit Summary", "Home Care", "Follow-Up"],
};

pub static EMAIL_TEMPLATE: TemplateSpec = TemplateSpec {
    kind: TemplateKind::Email,
    title: "Client Email",
    body: r#"Write a follow-up email from {veterinarian} to {owner_name} about
{patient_name}'s visit on {visit_date} (reason: {reason}).

Start with a line "Subject: ..." and then the email body. Summarize findings,
medications and home care instructions in plain language and invite the owner
to call the clinic with questions.

Transcript:
{transcript}"#,
    required_sections: &["Subject"],
};

/// Patient and appointment metadata injected into templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteContext {
    pub patient_name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub age: Option<String>,
    pub owner_name: Option<String>,
    pub veterinarian: Option<String>,
    pub visit_date: Option<String>,
    pub reason: Option<String>,
}

impl NoteContext {
    /// Build context from entered patient details and the draft appointment.
    pub fn from_details(details: &PatientDetails, appointment: &Appointment) -> Self {
        Self {
            patient_name: Some(details.name.clone()),
            species: Some(details.species.as_str().to_string()),
            breed: details.breed.clone(),
            age: details.age.clone(),
            owner_name: details.owner_name.clone(),
            veterinarian: appointment.veterinarian.clone(),
            visit_date: Some(visit_date(&appointment.recorded_at)),
            reason: appointment.reason.clone(),
        }
    }

    fn value(&self, placeholder: &str) -> Option<&str> {
        let value = match placeholder {
            "patient_name" => &self.patient_name,
            "species" => &self.species,
            "breed" => &self.breed,
            "age" => &self.age,
            "owner_name" => &self.owner_name,
            "veterinarian" => &self.veterinarian,
            "visit_date" => &self.visit_date,
            "reason" => &self.reason,
            _ => return None,
        };
        Some(
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(NOT_RECORDED),
        )
    }
}

/// Date part of an RFC 3339 timestamp.
fn visit_date(recorded_at: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(recorded_at)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| recorded_at.to_string())
}

impl TemplateSpec {
    /// Fill placeholders in a single pass.
    ///
    /// Substituted values are never rescanned, so a transcript containing
    /// `{patient_name}` is passed through literally.
    pub fn render(&self, transcript: &str, context: &NoteContext) -> String {
        let mut out = String::with_capacity(self.body.len() + transcript.len());
        let mut rest = self.body;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let name = &after[..close];
                    if name == "transcript" {
                        out.push_str(transcript.trim());
                    } else if let Some(value) = context.value(name) {
                        out.push_str(value);
                    } else {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Required sections absent from `text`.
    pub fn missing_sections(&self, text: &str) -> Vec<String> {
        let found = parse_sections(text, self.required_sections);
        self.required_sections
            .iter()
            .filter(|heading| !found.iter().any(|s| s.heading == **heading))
            .map(|heading| heading.to_string())
            .collect()
    }
}

/// A section of a generated note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteSection {
    /// Canonical heading from the template
    pub heading: String,
    pub body: String,
}

/// Validated output of note generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedNote {
    pub kind: TemplateKind,
    /// Full text as returned by the generator
    pub text: String,
    pub sections: Vec<NoteSection>,
}

impl GeneratedNote {
    /// Body of a section by heading (case-insensitive).
    pub fn section(&self, heading: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.heading.eq_ignore_ascii_case(heading))
            .map(|s| s.body.as_str())
    }
}

/// Split text into sections at heading lines.
///
/// A heading line is the heading itself, optionally decorated with markdown
/// (`#`, `*`, `-`, `_`) and followed by a colon. Text after the colon on the
/// same line starts the section body. Text before the first heading is
/// ignored.
pub fn parse_sections(text: &str, headings: &[&str]) -> Vec<NoteSection> {
    let mut sections: Vec<NoteSection> = Vec::new();

    for line in text.lines() {
        let matched = headings
            .iter()
            .find_map(|heading| match_heading(line, heading).map(|inline| (heading, inline)));

        match matched {
            Some((heading, inline)) => sections.push(NoteSection {
                heading: heading.to_string(),
                body: inline.to_string(),
            }),
            None => {
                if let Some(current) = sections.last_mut() {
                    if !current.body.is_empty() {
                        current.body.push('\n');
                    }
                    current.body.push_str(line);
                }
            }
        }
    }

    for section in &mut sections {
        section.body = section.body.trim().to_string();
    }
    sections
}

/// Match a heading line, returning any inline content after it.
fn match_heading<'a>(line: &'a str, heading: &str) -> Option<&'a str> {
    let stripped = line
        .trim_start_matches(|c: char| c == '#' || c == '*' || c == '-' || c == '_' || c.is_whitespace());
    if stripped.len() < heading.len() || !stripped.is_char_boundary(heading.len()) {
        return None;
    }

    let (head, rest) = stripped.split_at(heading.len());
    if canonical(head) != canonical(heading) {
        return None;
    }

    let rest = rest.trim_start_matches(|c: char| c == '*' || c == '_');
    if rest.trim().is_empty() {
        return Some("");
    }
    let rest = rest.trim_start();
    rest.strip_prefix(':')
        .map(|inline| inline.trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace()))
}

fn canonical(s: &str) -> String {
    s.to_lowercase().replace('-', " ")
}
