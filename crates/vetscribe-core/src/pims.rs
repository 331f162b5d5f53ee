//! Practice-management-system adapter.
//!
//! Only a deterministic stand-in ships here; real PIMS integrations
//! implement [`PimsAdapter`] elsewhere.

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::models::{Appointment, Patient, PimsReceipt, PimsStatus, PimsSystem};

/// Pushes a finalized record to a practice management system.
pub trait PimsAdapter: Send + Sync {
    /// System this adapter talks to.
    fn system(&self) -> PimsSystem;

    /// Push one appointment. Refusals come back as a rejected receipt, not
    /// an error.
    fn push(&self, appointment: &Appointment, patient: &Patient) -> PimsReceipt;
}

/// Deterministic PIMS stand-in.
///
/// Accepts finalized appointments that carry a SOAP note and answers with a
/// reference derived from the system and appointment ID, so pushing the same
/// appointment twice yields the same reference.
#[derive(Debug, Clone)]
pub struct SimulatedPims {
    system: PimsSystem,
}

impl SimulatedPims {
    pub fn new(system: PimsSystem) -> Self {
        Self { system }
    }

    /// `SIM-` followed by the first 12 hex digits of SHA-256(system + id).
    pub fn reference_for(system: PimsSystem, appointment_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(system.display_name().as_bytes());
        hasher.update(appointment_id.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("SIM-{}", &digest[..12])
    }
}

impl PimsAdapter for SimulatedPims {
    fn system(&self) -> PimsSystem {
        self.system
    }

    fn push(&self, appointment: &Appointment, patient: &Patient) -> PimsReceipt {
        let pushed_at = chrono::Utc::now().to_rfc3339();
        let rejection = if !appointment.is_finalized() {
            Some("appointment is not finalized")
        } else if appointment
            .soap_note
            .as_deref()
            .map_or(true, |n| n.trim().is_empty())
        {
            Some("appointment has no SOAP note")
        } else if !patient.matches(&appointment.patient_key) {
            Some("patient does not match appointment")
        } else {
            None
        };

        match rejection {
            Some(detail) => {
                warn!(
                    appointment = %appointment.appointment_id,
                    system = %self.system,
                    detail,
                    "PIMS push rejected"
                );
                PimsReceipt {
                    status: PimsStatus::Rejected,
                    system: self.system,
                    reference: None,
                    detail: detail.to_string(),
                    pushed_at,
                }
            }
            None => {
                let reference = Self::reference_for(self.system, &appointment.appointment_id);
                info!(
                    appointment = %appointment.appointment_id,
                    system = %self.system,
                    reference = %reference,
                    "PIMS push accepted"
                );
                PimsReceipt {
                    status: PimsStatus::Ack,
                    system: self.system,
                    reference: Some(reference),
                    detail: format!("Record for {} accepted by {}", patient.name, self.system),
                    pushed_at,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientDetails, Species};

    fn records() -> (Patient, Appointment) {
        let patient = Patient::from_details(&PatientDetails::new("Luna", Species::Feline));
        let appointment = Appointment::new(patient.identity_key.clone());
        (patient, appointment)
    }

    #[test]
    fn test_rejects_draft() {
        let (patient, mut appointment) = records();
        appointment.soap_note = Some("Plan: recheck".into());
        let receipt = SimulatedPims::new(PimsSystem::EzyVet).push(&appointment, &patient);
        assert_eq!(receipt.status, PimsStatus::Rejected);
        assert!(receipt.reference.is_none());
        assert!(receipt.detail.contains("not finalized"));
    }

    #[test]
    fn test_rejects_missing_soap() {
        let (patient, mut appointment) = records();
        appointment.finalize();
        let receipt = SimulatedPims::new(PimsSystem::EzyVet).push(&appointment, &patient);
        assert_eq!(receipt.status, PimsStatus::Rejected);
        assert!(receipt.detail.contains("SOAP"));
    }

    #[test]
    fn test_ack_is_deterministic() {
        let (patient, mut appointment) = records();
        appointment.soap_note = Some("Subjective: ok".into());
        appointment.finalize();

        let pims = SimulatedPims::new(PimsSystem::Cornerstone);
        let first = pims.push(&appointment, &patient);
        let second = pims.push(&appointment, &patient);
        assert!(first.is_ack());
        assert_eq!(first.reference, second.reference);

        let reference = first.reference.unwrap();
        assert!(reference.starts_with("SIM-"));
        assert_eq!(reference.len(), 16);
        assert_eq!(
            reference,
            SimulatedPims::reference_for(PimsSystem::Cornerstone, &appointment.appointment_id)
        );
        assert_ne!(
            reference,
            SimulatedPims::reference_for(PimsSystem::EzyVet, &appointment.appointment_id)
        );
    }
}
