//! Full-store export bundle.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{Appointment, Patient};
use crate::vocab::VOCABULARY_VERSION;

/// Bundle format understood by this build.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Export errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported bundle format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Bundle checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Every patient and appointment, with an integrity checksum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportBundle {
    pub format_version: u32,
    /// Vocabulary version of the exporting build
    pub vocabulary_version: String,
    pub exported_at: String,
    pub patients: Vec<Patient>,
    pub appointments: Vec<Appointment>,
    /// Hex SHA-256 over the canonical JSON of patients and appointments
    pub checksum: String,
}

impl ExportBundle {
    /// Build a bundle and compute its checksum.
    pub fn new(patients: Vec<Patient>, appointments: Vec<Appointment>) -> ExportResult<Self> {
        let checksum = compute_checksum(&patients, &appointments)?;
        Ok(Self {
            format_version: BUNDLE_FORMAT_VERSION,
            vocabulary_version: VOCABULARY_VERSION.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            patients,
            appointments,
            checksum,
        })
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a bundle, checking format version and checksum.
    pub fn from_json(json: &str) -> ExportResult<Self> {
        let bundle: ExportBundle = serde_json::from_str(json)?;
        bundle.verify()?;
        Ok(bundle)
    }

    /// Check format version and recompute the checksum.
    pub fn verify(&self) -> ExportResult<()> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(ExportError::UnsupportedVersion {
                found: self.format_version,
                expected: BUNDLE_FORMAT_VERSION,
            });
        }
        let actual = compute_checksum(&self.patients, &self.appointments)?;
        if actual != self.checksum {
            return Err(ExportError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Export to CSV format, one row per appointment.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("appointment_id,recorded_at,status,patient_name,species,owner_name,veterinarian,reason,dental_findings,highest_severity,referral,pims_status\n");

        for appointment in &self.appointments {
            let patient = self
                .patients
                .iter()
                .find(|p| p.identity_key == appointment.patient_key);
            let findings = appointment
                .dental_chart
                .as_ref()
                .map(|c| c.finding_count())
                .unwrap_or(0);
            let analysis = appointment.dental_analysis.as_ref();

            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{}\n",
                escape_csv(&appointment.appointment_id),
                escape_csv(&appointment.recorded_at),
                appointment.status.as_str(),
                escape_csv(patient.map(|p| p.name.as_str()).unwrap_or("")),
                patient.map(|p| p.species.as_str()).unwrap_or(""),
                escape_csv(patient.and_then(|p| p.owner_name.as_deref()).unwrap_or("")),
                escape_csv(appointment.veterinarian.as_deref().unwrap_or("")),
                escape_csv(appointment.reason.as_deref().unwrap_or("")),
                findings,
                analysis
                    .and_then(|a| a.highest_severity)
                    .map(|s| s.as_str())
                    .unwrap_or(""),
                analysis.map(|a| a.referral_recommended).unwrap_or(false),
                appointment
                    .pims_receipt
                    .as_ref()
                    .map(|r| if r.is_ack() { "ack" } else { "rejected" })
                    .unwrap_or(""),
            ));
        }

        csv
    }
}

#[derive(Serialize)]
struct ChecksumBody<'a> {
    patients: &'a [Patient],
    appointments: &'a [Appointment],
}

fn compute_checksum(patients: &[Patient], appointments: &[Appointment]) -> ExportResult<String> {
    let body = serde_json::to_vec(&ChecksumBody {
        patients,
        appointments,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&body);
    Ok(hex::encode(hasher.finalize()))
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientDetails, Species};

    fn make_bundle() -> ExportBundle {
        let patient = Patient::from_details(
            &PatientDetails::new("Max", Species::Canine).with_owner("Doe, Jane"),
        );
        let mut appointment = Appointment::new(patient.identity_key.clone());
        appointment.reason = Some("Dental check".into());
        ExportBundle::new(vec![patient], vec![appointment]).unwrap()
    }

    #[test]
    fn test_json_round_trip() {
        let bundle = make_bundle();
        let json = bundle.to_json().unwrap();
        let parsed = ExportBundle::from_json(&json).unwrap();
        assert_eq!(parsed, bundle);
        assert_eq!(parsed.format_version, 1);
        assert_eq!(parsed.checksum.len(), 64);
    }

    #[test]
    fn test_tampered_bundle_rejected() {
        let mut bundle = make_bundle();
        bundle.appointments[0].transcript = "edited after export".into();
        let json = bundle.to_json().unwrap();
        assert!(matches!(
            ExportBundle::from_json(&json),
            Err(ExportError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bundle = make_bundle();
        bundle.format_version = 2;
        let json = bundle.to_json().unwrap();
        assert!(matches!(
            ExportBundle::from_json(&json),
            Err(ExportError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_csv() {
        let bundle = make_bundle();
        let csv = bundle.to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2); // Header + 1 appointment
        assert!(lines[0].starts_with("appointment_id,"));
        assert!(lines[1].contains("\"Doe, Jane\""));
        assert!(lines[1].contains("Dental check"));
        assert!(lines[1].contains(",draft,Max,canine,"));
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }
}
