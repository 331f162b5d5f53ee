//! Appointment database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::patients::{ensure_patient_in, select_by_key, upsert_patient};
use super::{status_to_string, string_to_source, string_to_status, Database, DbError, DbResult};
use crate::models::{Appointment, Patient, PatientDetails, PatientKey, PimsReceipt};

const APPOINTMENT_COLUMNS: &str = "appointment_id, patient_key, recorded_at, reason, veterinarian, \
     transcript, transcript_source, soap_note, client_summary, client_email, dental_chart, \
     dental_analysis, status, pims_receipt, created_at, updated_at";

impl Database {
    /// Insert or update an appointment.
    ///
    /// The patient must already exist. A finalized appointment keeps its
    /// transcript; saving a different one fails with
    /// [`DbError::TranscriptLocked`].
    pub fn save_appointment(&mut self, appointment: &Appointment) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        save_appointment_in(&tx, appointment)?;
        tx.commit()?;
        Ok(())
    }

    /// Ensure the patient and save the appointment as it stands.
    ///
    /// Used for in-progress work, so a draft can be resumed before the
    /// patient has ever been finalized.
    pub fn save_draft(
        &mut self,
        details: &PatientDetails,
        appointment: &Appointment,
    ) -> DbResult<Patient> {
        let tx = self.conn.transaction()?;
        let patient = ensure_patient_in(&tx, details)?;
        if !patient.matches(&appointment.patient_key) {
            return Err(DbError::Constraint(format!(
                "Appointment {} does not belong to patient {}",
                appointment.appointment_id, patient.identity_key
            )));
        }
        save_appointment_in(&tx, appointment)?;
        tx.commit()?;
        tracing::debug!(appointment = %appointment.appointment_id, "Saved draft");
        Ok(patient)
    }

    /// Ensure the patient and save the appointment as finalized, atomically.
    ///
    /// Nothing is written if either step fails.
    pub fn finalize_appointment(
        &mut self,
        details: &PatientDetails,
        appointment: &Appointment,
    ) -> DbResult<(Patient, Appointment)> {
        let tx = self.conn.transaction()?;
        let patient = ensure_patient_in(&tx, details)?;

        let mut finalized = appointment.clone();
        finalized.patient_key = patient.identity_key.clone();
        finalized.finalize();
        save_appointment_in(&tx, &finalized)?;

        tx.commit()?;
        tracing::info!(
            appointment = %finalized.appointment_id,
            patient = %patient.identity_key,
            "Finalized appointment"
        );
        Ok((patient, finalized))
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, appointment_id: &str) -> DbResult<Option<Appointment>> {
        select_appointment(&self.conn, appointment_id)
    }

    /// List all appointments, oldest first.
    pub fn list_appointments(&self) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM appointments ORDER BY recorded_at, appointment_id",
            APPOINTMENT_COLUMNS
        ))?;

        let rows = stmt.query_map([], AppointmentRow::from_row)?;
        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }

    /// List a patient's appointments, most recent first.
    pub fn list_appointments_for_patient(&self, key: &PatientKey) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM appointments
            WHERE patient_key = ?
            ORDER BY recorded_at DESC, appointment_id
            "#,
            APPOINTMENT_COLUMNS
        ))?;

        let rows = stmt.query_map([key.as_str()], AppointmentRow::from_row)?;
        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }

    /// Attach a PIMS receipt to an appointment.
    pub fn record_pims_receipt(
        &self,
        appointment_id: &str,
        receipt: &PimsReceipt,
    ) -> DbResult<()> {
        let receipt_json = serde_json::to_string(receipt)?;
        let rows_affected = self.conn.execute(
            "UPDATE appointments SET pims_receipt = ?2, updated_at = ?3 WHERE appointment_id = ?1",
            params![
                appointment_id,
                receipt_json,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("Appointment {}", appointment_id)));
        }
        Ok(())
    }

    /// Load patients and appointments in one transaction.
    ///
    /// Patients are matched by identity key and must carry the stored local
    /// ID; appointments are matched by ID. Returns the number of (patients,
    /// appointments) written.
    pub fn import_records(
        &mut self,
        patients: &[Patient],
        appointments: &[Appointment],
    ) -> DbResult<(usize, usize)> {
        let tx = self.conn.transaction()?;
        for patient in patients {
            match select_by_key(&tx, &patient.identity_key)? {
                Some(existing) if existing.local_id != patient.local_id => {
                    return Err(DbError::DuplicatePatientConflict(
                        patient.identity_key.to_string(),
                    ));
                }
                _ => upsert_patient(&tx, patient)?,
            }
        }
        for appointment in appointments {
            save_appointment_in(&tx, appointment)?;
        }
        tx.commit()?;
        Ok((patients.len(), appointments.len()))
    }
}

fn select_appointment(conn: &Connection, appointment_id: &str) -> DbResult<Option<Appointment>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM appointments WHERE appointment_id = ?",
            APPOINTMENT_COLUMNS
        ),
        [appointment_id],
        AppointmentRow::from_row,
    )
    .optional()?
    .map(Appointment::try_from)
    .transpose()
}

fn save_appointment_in(conn: &Connection, appointment: &Appointment) -> DbResult<()> {
    if appointment.appointment_id.trim().is_empty() {
        return Err(DbError::InvalidInput("appointment ID is required".into()));
    }
    if select_by_key(conn, &appointment.patient_key)?.is_none() {
        return Err(DbError::NotFound(format!(
            "Patient {}",
            appointment.patient_key
        )));
    }

    if let Some(existing) = select_appointment(conn, &appointment.appointment_id)? {
        if existing.is_finalized() {
            if existing.transcript != appointment.transcript {
                return Err(DbError::TranscriptLocked(
                    appointment.appointment_id.clone(),
                ));
            }
            if !appointment.is_finalized() {
                return Err(DbError::Constraint(format!(
                    "Appointment {} is finalized and cannot return to draft",
                    appointment.appointment_id
                )));
            }
        }
        if existing.patient_key != appointment.patient_key {
            return Err(DbError::Constraint(format!(
                "Appointment {} belongs to a different patient",
                appointment.appointment_id
            )));
        }
    }

    conn.execute(
        r#"
        INSERT INTO appointments (
            appointment_id, patient_key, recorded_at, reason, veterinarian,
            transcript, transcript_source, soap_note, client_summary, client_email,
            dental_chart, dental_analysis, status, pims_receipt, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        ON CONFLICT(appointment_id) DO UPDATE SET
            recorded_at = excluded.recorded_at,
            reason = excluded.reason,
            veterinarian = excluded.veterinarian,
            transcript = excluded.transcript,
            transcript_source = excluded.transcript_source,
            soap_note = excluded.soap_note,
            client_summary = excluded.client_summary,
            client_email = excluded.client_email,
            dental_chart = excluded.dental_chart,
            dental_analysis = excluded.dental_analysis,
            status = excluded.status,
            pims_receipt = excluded.pims_receipt,
            updated_at = excluded.updated_at
        "#,
        params![
            appointment.appointment_id,
            appointment.patient_key.as_str(),
            appointment.recorded_at,
            appointment.reason,
            appointment.veterinarian,
            appointment.transcript,
            appointment.transcript_source.map(|s| s.as_str()),
            appointment.soap_note,
            appointment.client_summary,
            appointment.client_email,
            to_json(&appointment.dental_chart)?,
            to_json(&appointment.dental_analysis)?,
            status_to_string(appointment.status),
            to_json(&appointment.pims_receipt)?,
            appointment.created_at,
            appointment.updated_at,
        ],
    )?;
    Ok(())
}

fn to_json<T: Serialize>(value: &Option<T>) -> DbResult<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string::<T>)
        .transpose()
        .map_err(Into::into)
}

fn from_json<T: DeserializeOwned>(value: Option<String>) -> DbResult<Option<T>> {
    value
        .as_deref()
        .map(serde_json::from_str::<T>)
        .transpose()
        .map_err(Into::into)
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    appointment_id: String,
    patient_key: String,
    recorded_at: String,
    reason: Option<String>,
    veterinarian: Option<String>,
    transcript: String,
    transcript_source: Option<String>,
    soap_note: Option<String>,
    client_summary: Option<String>,
    client_email: Option<String>,
    dental_chart: Option<String>,
    dental_analysis: Option<String>,
    status: String,
    pims_receipt: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AppointmentRow {
            appointment_id: row.get(0)?,
            patient_key: row.get(1)?,
            recorded_at: row.get(2)?,
            reason: row.get(3)?,
            veterinarian: row.get(4)?,
            transcript: row.get(5)?,
            transcript_source: row.get(6)?,
            soap_note: row.get(7)?,
            client_summary: row.get(8)?,
            client_email: row.get(9)?,
            dental_chart: row.get(10)?,
            dental_analysis: row.get(11)?,
            status: row.get(12)?,
            pims_receipt: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            appointment_id: row.appointment_id,
            patient_key: PatientKey::from_raw(row.patient_key),
            recorded_at: row.recorded_at,
            reason: row.reason,
            veterinarian: row.veterinarian,
            transcript: row.transcript,
            transcript_source: row
                .transcript_source
                .as_deref()
                .map(string_to_source)
                .transpose()?,
            soap_note: row.soap_note,
            client_summary: row.client_summary,
            client_email: row.client_email,
            dental_chart: from_json(row.dental_chart)?,
            dental_analysis: from_json(row.dental_analysis)?,
            status: string_to_status(&row.status)?,
            pims_receipt: from_json(row.pims_receipt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, Species, TranscriptSource};

    fn details() -> PatientDetails {
        PatientDetails::new("Luna", Species::Feline).with_owner("Sam Lee")
    }

    fn setup_db() -> (Database, Patient) {
        let mut db = Database::open_in_memory().unwrap();
        let patient = db.ensure_patient(&details()).unwrap();
        (db, patient)
    }

    fn draft(patient: &Patient, transcript: &str) -> Appointment {
        let mut appointment = Appointment::new(patient.identity_key.clone());
        appointment
            .set_transcript(transcript.into(), TranscriptSource::Recorded)
            .unwrap();
        appointment
    }

    #[test]
    fn test_save_and_get() {
        let (mut db, patient) = setup_db();
        let mut appointment = draft(&patient, "Owner reports drooling.");
        appointment.soap_note = Some("Subjective: drooling".into());
        db.save_appointment(&appointment).unwrap();

        let retrieved = db.get_appointment(&appointment.appointment_id).unwrap().unwrap();
        assert_eq!(retrieved, appointment);
    }

    #[test]
    fn test_draft_saved_repeatedly() {
        let (mut db, patient) = setup_db();
        let mut appointment = draft(&patient, "First pass.");
        db.save_appointment(&appointment).unwrap();

        appointment
            .set_transcript("Second pass.".into(), TranscriptSource::Manual)
            .unwrap();
        db.save_appointment(&appointment).unwrap();

        let all = db.list_appointments().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].transcript, "Second pass.");
    }

    #[test]
    fn test_save_requires_patient() {
        let mut db = Database::open_in_memory().unwrap();
        let appointment = Appointment::new(details().key());
        let result = db.save_appointment(&appointment);
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_save_draft_creates_patient() {
        let mut db = Database::open_in_memory().unwrap();
        let appointment = Appointment::new(details().key());
        let patient = db.save_draft(&details(), &appointment).unwrap();
        assert_eq!(patient.identity_key, details().key());
        db.save_draft(&details(), &appointment).unwrap();
        assert_eq!(db.stats().unwrap().patients, 1);
        assert_eq!(db.stats().unwrap().drafts, 1);

        let stranger = Appointment::new(PatientDetails::new("Milo", Species::Canine).key());
        assert!(matches!(
            db.save_draft(&details(), &stranger),
            Err(DbError::Constraint(_))
        ));
    }

    #[test]
    fn test_finalize_creates_patient_atomically() {
        let mut db = Database::open_in_memory().unwrap();
        let appointment = Appointment::new(details().key());

        let (patient, finalized) = db.finalize_appointment(&details(), &appointment).unwrap();
        assert_eq!(finalized.status, AppointmentStatus::Finalized);
        assert_eq!(finalized.patient_key, patient.identity_key);
        assert_eq!(db.list_patients().unwrap().len(), 1);
    }

    #[test]
    fn test_finalize_rolls_back_on_failure() {
        let (mut db, patient) = setup_db();
        let mut appointment = draft(&patient, "Original.");
        db.finalize_appointment(&details(), &appointment).unwrap();

        // Same ID, different transcript, new patient: nothing may be written.
        appointment.transcript = "Rewritten.".into();
        let other = PatientDetails::new("Milo", Species::Canine);
        let result = db.finalize_appointment(&other, &appointment);
        assert!(result.is_err());
        assert!(db.find_patient(&other.key()).unwrap().is_none());
    }

    #[test]
    fn test_finalized_transcript_locked() {
        let (mut db, patient) = setup_db();
        let appointment = draft(&patient, "Original.");
        let (_, mut finalized) = db.finalize_appointment(&details(), &appointment).unwrap();

        finalized.soap_note = Some("Amended note".into());
        db.save_appointment(&finalized).unwrap();

        finalized.transcript = "Tampered.".into();
        let result = db.save_appointment(&finalized);
        assert!(matches!(result, Err(DbError::TranscriptLocked(_))));

        let stored = db.get_appointment(&finalized.appointment_id).unwrap().unwrap();
        assert_eq!(stored.transcript, "Original.");
        assert_eq!(stored.soap_note, Some("Amended note".into()));
    }

    #[test]
    fn test_list_for_patient() {
        let (mut db, patient) = setup_db();
        let mut first = draft(&patient, "One.");
        first.recorded_at = "2024-01-01T09:00:00+00:00".into();
        let mut second = draft(&patient, "Two.");
        second.recorded_at = "2024-02-01T09:00:00+00:00".into();
        db.save_appointment(&first).unwrap();
        db.save_appointment(&second).unwrap();

        let listed = db.list_appointments_for_patient(&patient.identity_key).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].appointment_id, second.appointment_id);
    }

    #[test]
    fn test_record_receipt() {
        let (mut db, patient) = setup_db();
        let appointment = draft(&patient, "Exam.");
        db.save_appointment(&appointment).unwrap();

        let receipt = PimsReceipt {
            status: crate::models::PimsStatus::Ack,
            system: crate::models::PimsSystem::EzyVet,
            reference: Some("SIM-000000000000".into()),
            detail: "accepted".into(),
            pushed_at: "2024-03-01T10:00:00Z".into(),
        };
        db.record_pims_receipt(&appointment.appointment_id, &receipt)
            .unwrap();

        let stored = db.get_appointment(&appointment.appointment_id).unwrap().unwrap();
        assert_eq!(stored.pims_receipt, Some(receipt.clone()));
        assert!(matches!(
            db.record_pims_receipt("missing", &receipt),
            Err(DbError::NotFound(_))
        ));
        assert_eq!(db.stats().unwrap().pushed, 1);
    }
}
