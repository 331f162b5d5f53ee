//! Practice-management-system push receipts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Practice management systems a clinic may push records to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PimsSystem {
    EzyVet,
    Cornerstone,
    Avimark,
    ImproMed,
    EVetPractice,
    Other,
}

impl PimsSystem {
    pub const ALL: [PimsSystem; 6] = [
        PimsSystem::EzyVet,
        PimsSystem::Cornerstone,
        PimsSystem::Avimark,
        PimsSystem::ImproMed,
        PimsSystem::EVetPractice,
        PimsSystem::Other,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            PimsSystem::EzyVet => "ezyVet",
            PimsSystem::Cornerstone => "Cornerstone",
            PimsSystem::Avimark => "AVImark",
            PimsSystem::ImproMed => "ImproMed",
            PimsSystem::EVetPractice => "eVetPractice",
            PimsSystem::Other => "Other",
        }
    }
}

impl fmt::Display for PimsSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for PimsSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PimsSystem::ALL
            .iter()
            .find(|system| system.display_name().to_lowercase() == wanted)
            .copied()
            .ok_or_else(|| format!("Unknown PIMS system: {}", s))
    }
}

/// Outcome of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PimsStatus {
    Ack,
    Rejected,
}

/// Acknowledgment shape returned by a PIMS push.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PimsReceipt {
    pub status: PimsStatus,
    pub system: PimsSystem,
    /// Remote record reference, present on ack
    pub reference: Option<String>,
    pub detail: String,
    pub pushed_at: String,
}

impl PimsReceipt {
    pub fn is_ack(&self) -> bool {
        self.status == PimsStatus::Ack
    }
}
