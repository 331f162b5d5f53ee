//! Thread-safe record store.
//!
//! Wraps [`Database`] behind one mutex so every writer is serialized; clones
//! share the same connection.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::db::{Database, RecordStats};
use crate::error::{Result, ScribeError};
use crate::export::{render_text, ExportBundle};
use crate::models::{Appointment, Patient, PatientDetails, PatientKey, PimsReceipt};

/// Default row cap for [`RecordStore::search_patients`].
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Mutex<Database>>,
}

impl RecordStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::open(path)?;
        Ok(Self::from_database(db))
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::from_database(db))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Return the patient for these details, adding it if new.
    pub fn ensure_patient(&self, details: &PatientDetails) -> Result<Patient> {
        let mut db = self.db.lock()?;
        Ok(db.ensure_patient(details)?)
    }

    /// Add a complete patient record; fails if its key belongs to another record.
    pub fn register_patient(&self, patient: &Patient) -> Result<()> {
        let mut db = self.db.lock()?;
        Ok(db.register_patient(patient)?)
    }

    /// Get a patient by local ID.
    pub fn get_patient(&self, local_id: &str) -> Result<Option<Patient>> {
        let db = self.db.lock()?;
        Ok(db.get_patient(local_id)?)
    }

    pub fn find_patient(&self, key: &PatientKey) -> Result<Option<Patient>> {
        let db = self.db.lock()?;
        Ok(db.find_patient(key)?)
    }

    pub fn list_patients(&self) -> Result<Vec<Patient>> {
        let db = self.db.lock()?;
        Ok(db.list_patients()?)
    }

    /// Search patients by name or owner, capped at `limit` rows
    /// ([`DEFAULT_SEARCH_LIMIT`] when `None`).
    pub fn search_patients(&self, query: &str, limit: Option<usize>) -> Result<Vec<Patient>> {
        let db = self.db.lock()?;
        Ok(db.search_patients(query, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))?)
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    /// Save a draft or amend a finalized appointment.
    pub fn save_appointment(&self, appointment: &Appointment) -> Result<()> {
        let mut db = self.db.lock()?;
        Ok(db.save_appointment(appointment)?)
    }

    /// Ensure the patient and save in-progress work in one transaction.
    pub fn save_draft(&self, details: &PatientDetails, appointment: &Appointment) -> Result<Patient> {
        let mut db = self.db.lock()?;
        Ok(db.save_draft(details, appointment)?)
    }

    /// Ensure the patient and commit the appointment as finalized, atomically.
    pub fn finalize_appointment(
        &self,
        details: &PatientDetails,
        appointment: &Appointment,
    ) -> Result<(Patient, Appointment)> {
        let mut db = self.db.lock()?;
        Ok(db.finalize_appointment(details, appointment)?)
    }

    pub fn get_appointment(&self, appointment_id: &str) -> Result<Option<Appointment>> {
        let db = self.db.lock()?;
        Ok(db.get_appointment(appointment_id)?)
    }

    /// All appointments, oldest first.
    pub fn list_appointments(&self) -> Result<Vec<Appointment>> {
        let db = self.db.lock()?;
        Ok(db.list_appointments()?)
    }

    /// Appointment history of one patient, newest first.
    pub fn list_appointments_for_patient(&self, key: &PatientKey) -> Result<Vec<Appointment>> {
        let db = self.db.lock()?;
        Ok(db.list_appointments_for_patient(key)?)
    }

    pub fn record_pims_receipt(&self, appointment_id: &str, receipt: &PimsReceipt) -> Result<()> {
        let db = self.db.lock()?;
        Ok(db.record_pims_receipt(appointment_id, receipt)?)
    }

    // =========================================================================
    // Export / Import
    // =========================================================================

    /// Plain-text record of one appointment.
    pub fn export_text(&self, appointment_id: &str) -> Result<String> {
        let db = self.db.lock()?;
        let appointment = db
            .get_appointment(appointment_id)?
            .ok_or_else(|| ScribeError::NotFound(format!("appointment {}", appointment_id)))?;
        let patient = db
            .find_patient(&appointment.patient_key)?
            .ok_or_else(|| ScribeError::NotFound(format!("patient {}", appointment.patient_key)))?;
        Ok(render_text(&patient, &appointment))
    }

    /// Snapshot of every patient and appointment.
    pub fn export_all(&self) -> Result<ExportBundle> {
        let db = self.db.lock()?;
        let patients = db.list_patients()?;
        let appointments = db.list_appointments()?;
        let bundle = ExportBundle::new(patients, appointments)?;
        info!(
            patients = bundle.patients.len(),
            appointments = bundle.appointments.len(),
            "Exported records"
        );
        Ok(bundle)
    }

    /// Load a verified bundle. Returns the number of (patients, appointments)
    /// written.
    pub fn import_bundle(&self, bundle: &ExportBundle) -> Result<(usize, usize)> {
        bundle.verify()?;
        let mut db = self.db.lock()?;
        let counts = db.import_records(&bundle.patients, &bundle.appointments)?;
        info!(patients = counts.0, appointments = counts.1, "Imported records");
        Ok(counts)
    }

    /// Delete every record.
    pub fn clear_all(&self) -> Result<()> {
        let mut db = self.db.lock()?;
        db.clear_all()?;
        info!("Cleared all records");
        Ok(())
    }

    pub fn stats(&self) -> Result<RecordStats> {
        let db = self.db.lock()?;
        Ok(db.stats()?)
    }
}
