//! SQLite schema definition.

/// Complete database schema for VetScribe.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients (one row per identity key)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    local_id TEXT PRIMARY KEY,
    identity_key TEXT NOT NULL UNIQUE,           -- name|species|owner, normalized
    name TEXT NOT NULL,
    species TEXT NOT NULL CHECK (species IN ('canine', 'feline', 'other')),
    breed TEXT,
    age TEXT,
    weight_kg REAL,
    owner_name TEXT,
    owner_contact TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

-- ============================================================================
-- Appointments (draft -> finalized)
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    appointment_id TEXT PRIMARY KEY,
    patient_key TEXT NOT NULL REFERENCES patients(identity_key),
    recorded_at TEXT NOT NULL,
    reason TEXT,
    veterinarian TEXT,
    transcript TEXT NOT NULL DEFAULT '',
    transcript_source TEXT,
    soap_note TEXT,
    client_summary TEXT,
    client_email TEXT,
    dental_chart TEXT,                           -- JSON DentalChart
    dental_analysis TEXT,                        -- JSON DentalAnalysis
    status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'finalized')),
    pims_receipt TEXT,                           -- JSON PimsReceipt
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_key, recorded_at);
CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status);

-- Finalized transcripts are immutable
CREATE TRIGGER IF NOT EXISTS appointments_transcript_locked BEFORE UPDATE OF transcript ON appointments
WHEN old.status = 'finalized' AND new.transcript IS NOT old.transcript
BEGIN
    SELECT RAISE(ABORT, 'transcript of finalized appointment is locked');
END;

-- Finalization is one-way
CREATE TRIGGER IF NOT EXISTS appointments_status_final BEFORE UPDATE OF status ON appointments
WHEN old.status = 'finalized' AND new.status <> 'finalized'
BEGIN
    SELECT RAISE(ABORT, 'finalized appointment cannot return to draft');
END;
"#;
