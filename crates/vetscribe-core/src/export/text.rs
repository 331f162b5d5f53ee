//! Plain-text appointment export.
//!
//! Layout, top to bottom:
//!
//! ```text
//! VETSCRIBE APPOINTMENT RECORD
//! <header fields>
//! PATIENT / TRANSCRIPT / SOAP NOTE / CLIENT SUMMARY / [CLIENT EMAIL]
//! DENTAL CHART / DENTAL RECOMMENDATIONS / PIMS
//! ```
//!
//! Each section title is underlined with `-`. Missing content is written as
//! "Not recorded" so every section is always present (except the optional
//! client email).

use crate::models::{Appointment, Patient, PimsStatus, NOT_RECORDED};

const TITLE: &str = "VETSCRIBE APPOINTMENT RECORD";

/// Render one appointment and its patient as plain text.
pub fn render_text(patient: &Patient, appointment: &Appointment) -> String {
    let mut out = String::new();
    out.push_str(TITLE);
    out.push('\n');
    out.push_str(&"=".repeat(TITLE.len()));
    out.push('\n');
    field(&mut out, "Appointment", Some(appointment.appointment_id.as_str()));
    field(&mut out, "Recorded", Some(appointment.recorded_at.as_str()));
    field(&mut out, "Status", Some(appointment.status.as_str()));
    field(&mut out, "Veterinarian", appointment.veterinarian.as_deref());
    field(&mut out, "Reason", appointment.reason.as_deref());

    let mut block = String::new();
    field(&mut block, "Name", Some(patient.name.as_str()));
    field(&mut block, "Species", Some(patient.species.as_str()));
    field(&mut block, "Breed", patient.breed.as_deref());
    field(&mut block, "Age", patient.age.as_deref());
    field(
        &mut block,
        "Weight",
        patient.weight_kg.map(|w| format!("{:.1} kg", w)).as_deref(),
    );
    field(&mut block, "Owner", patient.owner_name.as_deref());
    field(&mut block, "Contact", patient.owner_contact.as_deref());
    section(&mut out, "PATIENT", &block);

    section(&mut out, "TRANSCRIPT", or_not_recorded(Some(appointment.transcript.as_str())));
    section(&mut out, "SOAP NOTE", or_not_recorded(appointment.soap_note.as_deref()));
    section(
        &mut out,
        "CLIENT SUMMARY",
        or_not_recorded(appointment.client_summary.as_deref()),
    );
    if let Some(email) = appointment.client_email.as_deref() {
        section(&mut out, "CLIENT EMAIL", email);
    }

    let chart = match &appointment.dental_chart {
        Some(chart) if !chart.is_empty() => {
            let mut lines = format!(
                "Scheme: {} (vocabulary {})\n",
                chart.scheme, chart.vocabulary_version
            );
            for charted in chart.teeth.values() {
                let conditions: Vec<String> = charted
                    .conditions
                    .iter()
                    .map(|c| format!("{} ({})", c.condition, c.severity))
                    .collect();
                lines.push_str(&format!(
                    "{}: {} [overall {}]\n",
                    charted.tooth,
                    conditions.join(", "),
                    charted.severity
                ));
            }
            for finding in &chart.general_findings {
                lines.push_str(&format!(
                    "Whole mouth: {} ({})\n",
                    finding.condition, finding.severity
                ));
            }
            lines
        }
        Some(_) => "No dental findings recorded.".to_string(),
        None => NOT_RECORDED.to_string(),
    };
    section(&mut out, "DENTAL CHART", &chart);

    let recommendations = appointment
        .dental_analysis
        .as_ref()
        .map(|a| a.summary_text())
        .unwrap_or_else(|| NOT_RECORDED.to_string());
    section(&mut out, "DENTAL RECOMMENDATIONS", &recommendations);

    let pims = match &appointment.pims_receipt {
        Some(receipt) => match receipt.status {
            PimsStatus::Ack => format!(
                "Accepted by {} as {} at {}",
                receipt.system,
                receipt.reference.as_deref().unwrap_or("-"),
                receipt.pushed_at
            ),
            PimsStatus::Rejected => format!(
                "Rejected by {} at {}: {}",
                receipt.system, receipt.pushed_at, receipt.detail
            ),
        },
        None => "Not pushed".to_string(),
    };
    section(&mut out, "PIMS", &pims);

    out
}

fn field(out: &mut String, label: &str, value: Option<&str>) {
    out.push_str(&format!("{}: {}\n", label, value.unwrap_or(NOT_RECORDED)));
}

fn section(out: &mut String, title: &str, body: &str) {
    out.push('\n');
    out.push_str(title);
    out.push('\n');
    out.push_str(&"-".repeat(title.len()));
    out.push('\n');
    out.push_str(body.trim_end());
    out.push('\n');
}

fn or_not_recorded(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => NOT_RECORDED,
    }
}
