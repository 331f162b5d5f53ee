//! Patient database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{species_to_string, string_to_species, Database, DbError, DbResult};
use crate::models::{Patient, PatientDetails, PatientKey};

const PATIENT_COLUMNS: &str = "local_id, identity_key, name, species, breed, age, weight_kg, \
     owner_name, owner_contact, notes, created_at, updated_at";

impl Database {
    /// Get a patient by local ID.
    pub fn get_patient(&self, local_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE local_id = ?", PATIENT_COLUMNS),
                [local_id],
                PatientRow::from_row,
            )
            .optional()?
            .map(Patient::try_from)
            .transpose()
    }

    /// Get a patient by identity key.
    pub fn find_patient(&self, key: &PatientKey) -> DbResult<Option<Patient>> {
        select_by_key(&self.conn, key)
    }

    /// Search patients by name or owner (substring, case-insensitive).
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let pattern = format!("%{}%", query.trim());
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM patients
            WHERE name LIKE ?1 OR owner_name LIKE ?1
            ORDER BY name, identity_key
            LIMIT ?2
            "#,
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![pattern, limit as i64], PatientRow::from_row)?;
        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// List all patients.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients ORDER BY name, identity_key",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([], PatientRow::from_row)?;
        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Return the patient for these details, creating it if needed.
    pub fn ensure_patient(&mut self, details: &PatientDetails) -> DbResult<Patient> {
        let tx = self.conn.transaction()?;
        let patient = ensure_patient_in(&tx, details)?;
        tx.commit()?;
        Ok(patient)
    }

    /// Register a fully-formed patient record.
    ///
    /// Re-registering the same record is a no-op. A different record under an
    /// existing identity key is a [`DbError::DuplicatePatientConflict`].
    pub fn register_patient(&mut self, patient: &Patient) -> DbResult<()> {
        if patient.identity_key.as_str().is_empty() || patient.name.trim().is_empty() {
            return Err(DbError::InvalidInput("patient name is required".into()));
        }
        let tx = self.conn.transaction()?;
        match select_by_key(&tx, &patient.identity_key)? {
            Some(existing) if existing.local_id == patient.local_id => {}
            Some(_) => {
                return Err(DbError::DuplicatePatientConflict(
                    patient.identity_key.to_string(),
                ))
            }
            None => insert_patient(&tx, patient)?,
        }
        tx.commit()?;
        Ok(())
    }
}

/// Find-or-create inside the caller's transaction.
pub(crate) fn ensure_patient_in(conn: &Connection, details: &PatientDetails) -> DbResult<Patient> {
    if details.name.trim().is_empty() {
        return Err(DbError::InvalidInput("patient name is required".into()));
    }
    let key = details.key();
    if let Some(mut existing) = select_by_key(conn, &key)? {
        if existing.merge_details(details) {
            update_patient(conn, &existing)?;
        }
        return Ok(existing);
    }

    let patient = Patient::from_details(details);
    // Another connection may have inserted the same key since the select.
    let inserted = write_patient(conn, &patient, "ON CONFLICT(identity_key) DO NOTHING")?;
    if inserted == 1 {
        tracing::info!(patient = %key, "Registered new patient");
        return Ok(patient);
    }
    select_by_key(conn, &key)?.ok_or_else(|| DbError::NotFound(format!("Patient {}", key)))
}

pub(crate) fn select_by_key(conn: &Connection, key: &PatientKey) -> DbResult<Option<Patient>> {
    conn.query_row(
        &format!("SELECT {} FROM patients WHERE identity_key = ?", PATIENT_COLUMNS),
        [key.as_str()],
        PatientRow::from_row,
    )
    .optional()?
    .map(Patient::try_from)
    .transpose()
}

pub(crate) fn insert_patient(conn: &Connection, patient: &Patient) -> DbResult<()> {
    write_patient(conn, patient, "")?;
    Ok(())
}

/// Insert, or overwrite the attributes of the record with the same key.
pub(crate) fn upsert_patient(conn: &Connection, patient: &Patient) -> DbResult<()> {
    write_patient(
        conn,
        patient,
        r#"ON CONFLICT(identity_key) DO UPDATE SET
            breed = excluded.breed,
            age = excluded.age,
            weight_kg = excluded.weight_kg,
            owner_contact = excluded.owner_contact,
            notes = excluded.notes,
            updated_at = excluded.updated_at"#,
    )?;
    Ok(())
}

fn update_patient(conn: &Connection, patient: &Patient) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE patients SET
            breed = ?2,
            age = ?3,
            weight_kg = ?4,
            owner_contact = ?5,
            notes = ?6,
            updated_at = ?7
        WHERE local_id = ?1
        "#,
        params![
            patient.local_id,
            patient.breed,
            patient.age,
            patient.weight_kg,
            patient.owner_contact,
            patient.notes,
            patient.updated_at,
        ],
    )?;
    Ok(rows_affected > 0)
}

/// INSERT with an optional conflict clause. Returns the number of rows written.
fn write_patient(conn: &Connection, patient: &Patient, on_conflict: &str) -> DbResult<usize> {
    let rows = conn.execute(
        &format!(
            r#"
            INSERT INTO patients (
                local_id, identity_key, name, species, breed, age, weight_kg,
                owner_name, owner_contact, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            {}
            "#,
            on_conflict
        ),
        params![
            patient.local_id,
            patient.identity_key.as_str(),
            patient.name,
            species_to_string(patient.species),
            patient.breed,
            patient.age,
            patient.weight_kg,
            patient.owner_name,
            patient.owner_contact,
            patient.notes,
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(rows)
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    local_id: String,
    identity_key: String,
    name: String,
    species: String,
    breed: Option<String>,
    age: Option<String>,
    weight_kg: Option<f64>,
    owner_name: Option<String>,
    owner_contact: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PatientRow {
            local_id: row.get(0)?,
            identity_key: row.get(1)?,
            name: row.get(2)?,
            species: row.get(3)?,
            breed: row.get(4)?,
            age: row.get(5)?,
            weight_kg: row.get(6)?,
            owner_name: row.get(7)?,
            owner_contact: row.get(8)?,
            notes: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            local_id: row.local_id,
            identity_key: PatientKey::from_raw(row.identity_key),
            name: row.name,
            species: string_to_species(&row.species)?,
            breed: row.breed,
            age: row.age,
            weight_kg: row.weight_kg,
            owner_name: row.owner_name,
            owner_contact: row.owner_contact,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
