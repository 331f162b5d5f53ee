//! Database layer for VetScribe.

mod appointments;
mod patients;
mod schema;

pub use schema::*;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::{AppointmentStatus, Species, TranscriptSource};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Patient {0} is already registered under a different record")]
    DuplicatePatientConflict(String),

    #[error("Transcript of finalized appointment {0} cannot be changed")]
    TranscriptLocked(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DbError::LockPoisoned(e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Row counts, for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStats {
    pub patients: usize,
    pub appointments: usize,
    pub drafts: usize,
    pub finalized: usize,
    pub pushed: usize,
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Row counts across both tables.
    pub fn stats(&self) -> DbResult<RecordStats> {
        let count = |sql: &str| -> DbResult<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(RecordStats {
            patients: count("SELECT COUNT(*) FROM patients")?,
            appointments: count("SELECT COUNT(*) FROM appointments")?,
            drafts: count("SELECT COUNT(*) FROM appointments WHERE status = 'draft'")?,
            finalized: count("SELECT COUNT(*) FROM appointments WHERE status = 'finalized'")?,
            pushed: count("SELECT COUNT(*) FROM appointments WHERE pims_receipt IS NOT NULL")?,
        })
    }

    /// Delete every appointment and patient.
    pub fn clear_all(&mut self) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM appointments", [])?;
        tx.execute("DELETE FROM patients", [])?;
        tx.commit()?;
        Ok(())
    }
}

fn species_to_string(species: Species) -> &'static str {
    species.as_str()
}

fn string_to_species(s: &str) -> Result<Species, DbError> {
    match s {
        "canine" => Ok(Species::Canine),
        "feline" => Ok(Species::Feline),
        "other" => Ok(Species::Other),
        _ => Err(DbError::Constraint(format!("Unknown species: {}", s))),
    }
}

fn status_to_string(status: AppointmentStatus) -> &'static str {
    status.as_str()
}

fn string_to_status(s: &str) -> Result<AppointmentStatus, DbError> {
    match s {
        "draft" => Ok(AppointmentStatus::Draft),
        "finalized" => Ok(AppointmentStatus::Finalized),
        _ => Err(DbError::Constraint(format!("Unknown appointment status: {}", s))),
    }
}

fn string_to_source(s: &str) -> Result<TranscriptSource, DbError> {
    match s {
        "recorded" => Ok(TranscriptSource::Recorded),
        "uploaded" => Ok(TranscriptSource::Uploaded),
        "manual" => Ok(TranscriptSource::Manual),
        _ => Err(DbError::Constraint(format!("Unknown transcript source: {}", s))),
    }
}
