//! Patient models.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vocab::NumberingScheme;

/// Patient species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Canine,
    Feline,
    Other,
}

impl Species {
    /// Parse a spoken or typed species name.
    ///
    /// Common synonyms map to the canonical species; anything unrecognized
    /// is `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "canine" | "dog" | "k9" | "puppy" => Species::Canine,
            "feline" | "cat" | "kitten" => Species::Feline,
            _ => Species::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Canine => "canine",
            Species::Feline => "feline",
            Species::Other => "other",
        }
    }

    /// Numbering scheme for dental charting, if the species has its own.
    pub fn numbering_scheme(&self) -> Option<NumberingScheme> {
        match self {
            Species::Canine => Some(NumberingScheme::Canine),
            Species::Feline => Some(NumberingScheme::Feline),
            Species::Other => None,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clinic-unique patient identity.
///
/// Composition: `name|species|owner`, each part trimmed, inner whitespace
/// collapsed to a single space and lowercased. A missing owner is the empty
/// string, so "Max" the dog without an owner on file and "Max" the dog owned
/// by "Jane Doe" are different patients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientKey(String);

impl PatientKey {
    pub fn new(name: &str, species: Species, owner_name: Option<&str>) -> Self {
        Self(format!(
            "{}|{}|{}",
            normalize_part(name),
            species.as_str(),
            owner_name.map(normalize_part).unwrap_or_default()
        ))
    }

    /// Wrap an already-normalized key (e.g. read from storage).
    pub fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_part(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Patient attributes as entered for an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub name: String,
    pub species: Species,
    pub breed: Option<String>,
    /// Free text, e.g. "7 years"
    pub age: Option<String>,
    pub weight_kg: Option<f64>,
    pub owner_name: Option<String>,
    /// Phone or email
    pub owner_contact: Option<String>,
}

impl PatientDetails {
    pub fn new(name: impl Into<String>, species: Species) -> Self {
        Self {
            name: name.into(),
            species,
            breed: None,
            age: None,
            weight_kg: None,
            owner_name: None,
            owner_contact: None,
        }
    }

    pub fn with_owner(mut self, owner_name: impl Into<String>) -> Self {
        self.owner_name = Some(owner_name.into());
        self
    }

    pub fn with_breed(mut self, breed: impl Into<String>) -> Self {
        self.breed = Some(breed.into());
        self
    }

    pub fn with_age(mut self, age: impl Into<String>) -> Self {
        self.age = Some(age.into());
        self
    }

    pub fn with_weight_kg(mut self, weight_kg: f64) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }

    pub fn with_owner_contact(mut self, contact: impl Into<String>) -> Self {
        self.owner_contact = Some(contact.into());
        self
    }

    /// Identity key for deduplication.
    pub fn key(&self) -> PatientKey {
        PatientKey::new(&self.name, self.species, self.owner_name.as_deref())
    }
}

/// A patient record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Local UUID
    pub local_id: String,
    /// Deduplication key
    pub identity_key: PatientKey,
    pub name: String,
    pub species: Species,
    pub breed: Option<String>,
    pub age: Option<String>,
    pub weight_kg: Option<f64>,
    pub owner_name: Option<String>,
    pub owner_contact: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient from entered details.
    pub fn from_details(details: &PatientDetails) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            local_id: uuid::Uuid::new_v4().to_string(),
            identity_key: details.key(),
            name: details.name.trim().to_string(),
            species: details.species,
            breed: non_blank(&details.breed),
            age: non_blank(&details.age),
            weight_kg: details.weight_kg,
            owner_name: non_blank(&details.owner_name),
            owner_contact: non_blank(&details.owner_contact),
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Merge newly entered attributes into this record.
    ///
    /// Only provided, non-blank values overwrite. Returns true when anything
    /// changed.
    pub fn merge_details(&mut self, details: &PatientDetails) -> bool {
        let mut changed = false;
        changed |= merge_field(&mut self.breed, non_blank(&details.breed));
        changed |= merge_field(&mut self.age, non_blank(&details.age));
        changed |= merge_field(&mut self.owner_contact, non_blank(&details.owner_contact));
        if let Some(weight) = details.weight_kg {
            if self.weight_kg != Some(weight) {
                self.weight_kg = Some(weight);
                changed = true;
            }
        }
        if changed {
            self.updated_at = chrono::Utc::now().to_rfc3339();
        }
        changed
    }

    /// Entered-details view of this record, e.g. to resume a saved draft.
    pub fn details(&self) -> PatientDetails {
        PatientDetails {
            name: self.name.clone(),
            species: self.species,
            breed: self.breed.clone(),
            age: self.age.clone(),
            weight_kg: self.weight_kg,
            owner_name: self.owner_name.clone(),
            owner_contact: self.owner_contact.clone(),
        }
    }

    /// Check whether this record belongs to the given key.
    pub fn matches(&self, key: &PatientKey) -> bool {
        &self.identity_key == key
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn merge_field(current: &mut Option<String>, incoming: Option<String>) -> bool {
    match incoming {
        Some(value) if current.as_deref() != Some(value.as_str()) => {
            *current = Some(value);
            true
        }
        _ => false,
    }
}
