//! Dental conditions and their trigger keywords.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Finding severity, ordered from least to most severe.
///
/// Aggregation over several findings always takes the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Mild,
        Severity::Moderate,
        Severity::Severe,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mild" => Ok(Severity::Mild),
            "moderate" => Ok(Severity::Moderate),
            "severe" => Ok(Severity::Severe),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

/// Recognized dental conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DentalCondition {
    Fracture,
    PeriodontalDisease,
    Gingivitis,
    Calculus,
    ToothResorption,
    Abscess,
    Mobility,
    Missing,
    Wear,
    Discoloration,
    RetainedDeciduous,
    GingivalRecession,
    Malocclusion,
    /// Tooth mentioned without a recognizable condition
    Unspecified,
}

impl DentalCondition {
    /// Table entry for this condition.
    pub fn entry(&self) -> &'static ConditionEntry {
        CONDITION_TABLE
            .iter()
            .find(|e| e.condition == *self)
            .unwrap_or(&UNSPECIFIED_ENTRY)
    }

    pub fn label(&self) -> &'static str {
        self.entry().label
    }

    pub fn default_severity(&self) -> Severity {
        self.entry().default_severity
    }
}

impl fmt::Display for DentalCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the condition table.
#[derive(Debug)]
pub struct ConditionEntry {
    pub condition: DentalCondition,
    /// Human-readable label
    pub label: &'static str,
    /// Trigger phrases, lowercase, words separated by single spaces
    pub keywords: &'static [&'static str],
    /// Severity used when the text states none
    pub default_severity: Severity,
    /// Rule-based recommendation text
    pub recommendation: &'static str,
}

/// Entry used for tooth mentions with no recognized condition.
pub static UNSPECIFIED_ENTRY: ConditionEntry = ConditionEntry {
    condition: DentalCondition::Unspecified,
    label: "unspecified condition",
    keywords: &[],
    default_severity: Severity::Mild,
    recommendation: "Re-examine the tooth; it was mentioned without a recognizable condition.",
};

/// Recognized conditions in reporting order.
pub static CONDITION_TABLE: &[ConditionEntry] = &[
    ConditionEntry {
        condition: DentalCondition::Fracture,
        label: "fracture",
        keywords: &[
            "fracture", "fractured", "fractures", "broken", "chipped", "chip", "cracked",
            "crack", "slab fracture",
        ],
        default_severity: Severity::Moderate,
        recommendation: "Dental radiographs of the fractured tooth; assess for pulp exposure and plan endodontic treatment or extraction.",
    },
    ConditionEntry {
        condition: DentalCondition::PeriodontalDisease,
        label: "periodontal disease",
        keywords: &[
            "periodontal disease", "periodontitis", "periodontal", "bone loss", "attachment loss",
            "pocketing", "periodontal pocket",
        ],
        default_severity: Severity::Moderate,
        recommendation: "Professional periodontal cleaning under anesthesia with full-mouth radiographs.",
    },
    ConditionEntry {
        condition: DentalCondition::Gingivitis,
        label: "gingivitis",
        keywords: &[
            "gingivitis", "gingival inflammation", "inflamed gums", "inflamed gingiva", "red gums",
        ],
        default_severity: Severity::Mild,
        recommendation: "Dental prophylaxis and daily home care (tooth brushing, dental diet or chews).",
    },
    ConditionEntry {
        condition: DentalCondition::Calculus,
        label: "calculus",
        keywords: &["calculus", "tartar", "plaque"],
        default_severity: Severity::Mild,
        recommendation: "Scaling and polishing at the next dental cleaning.",
    },
    ConditionEntry {
        condition: DentalCondition::ToothResorption,
        label: "tooth resorption",
        keywords: &[
            "resorption", "resorptive lesion", "resorptive", "forl", "forls", "neck lesion",
        ],
        default_severity: Severity::Severe,
        recommendation: "Radiographic assessment; extraction or crown amputation of the affected tooth.",
    },
    ConditionEntry {
        condition: DentalCondition::Abscess,
        label: "abscess",
        keywords: &[
            "tooth root abscess", "root abscess", "abscess", "abscessed", "draining tract",
            "facial swelling",
        ],
        default_severity: Severity::Severe,
        recommendation: "Radiographs and extraction or root canal therapy; provide analgesia and consider antibiotics.",
    },
    ConditionEntry {
        condition: DentalCondition::Mobility,
        label: "mobility",
        keywords: &["mobility", "mobile", "loose"],
        default_severity: Severity::Moderate,
        recommendation: "Radiographs to assess attachment loss; extraction is likely if mobility persists.",
    },
    ConditionEntry {
        condition: DentalCondition::Missing,
        label: "missing tooth",
        keywords: &["missing", "absent tooth"],
        default_severity: Severity::Mild,
        recommendation: "Radiograph the site to rule out an unerupted tooth or retained root fragments.",
    },
    ConditionEntry {
        condition: DentalCondition::Wear,
        label: "wear",
        keywords: &["worn", "wear", "attrition", "abrasion"],
        default_severity: Severity::Mild,
        recommendation: "Monitor wear, review chew toys and check for pulp exposure.",
    },
    ConditionEntry {
        condition: DentalCondition::Discoloration,
        label: "discoloration",
        keywords: &[
            "discolored", "discoloured", "discoloration", "discolouration", "non-vital", "nonvital",
        ],
        default_severity: Severity::Moderate,
        recommendation: "Radiographs to assess tooth vitality; consider endodontic therapy.",
    },
    ConditionEntry {
        condition: DentalCondition::RetainedDeciduous,
        label: "retained deciduous tooth",
        keywords: &[
            "retained deciduous", "persistent deciduous", "retained baby tooth", "retained baby",
        ],
        default_severity: Severity::Moderate,
        recommendation: "Extract the retained deciduous tooth to prevent malocclusion and periodontal disease.",
    },
    ConditionEntry {
        condition: DentalCondition::GingivalRecession,
        label: "gingival recession",
        keywords: &["gingival recession", "receding gums", "recession"],
        default_severity: Severity::Moderate,
        recommendation: "Chart attachment loss and monitor; periodontal therapy if progressing.",
    },
    ConditionEntry {
        condition: DentalCondition::Malocclusion,
        label: "malocclusion",
        keywords: &["malocclusion", "overbite", "underbite", "crossbite", "base narrow"],
        default_severity: Severity::Mild,
        recommendation: "Occlusal evaluation; orthodontic or extraction referral if the bite causes trauma.",
    },
];

/// Phrases that state a severity.
pub static SEVERITY_CUES: &[(&str, Severity)] = &[
    ("mild", Severity::Mild),
    ("mildly", Severity::Mild),
    ("slight", Severity::Mild),
    ("slightly", Severity::Mild),
    ("minimal", Severity::Mild),
    ("minor", Severity::Mild),
    ("early", Severity::Mild),
    ("grade 1", Severity::Mild),
    ("stage 1", Severity::Mild),
    ("moderate", Severity::Moderate),
    ("moderately", Severity::Moderate),
    ("grade 2", Severity::Moderate),
    ("stage 2", Severity::Moderate),
    ("severe", Severity::Severe),
    ("severely", Severity::Severe),
    ("marked", Severity::Severe),
    ("advanced", Severity::Severe),
    ("extensive", Severity::Severe),
    ("significant", Severity::Severe),
    ("grade 3", Severity::Severe),
    ("stage 3", Severity::Severe),
    ("critical", Severity::Critical),
    ("grade 4", Severity::Critical),
    ("stage 4", Severity::Critical),
    ("pulp exposure", Severity::Critical),
    ("exposed pulp", Severity::Critical),
];

/// Words that negate a following condition or severity in the same clause.
pub static NEGATION_CUES: &[&str] = &["no", "not", "without", "denies", "negative", "nil"];

/// Words that end a negation scope, treated as clause breaks.
pub static CLAUSE_BREAKS: &[&str] = &["but", "however", "although", "though", "except", "whereas"];

/// Minimum keyword length for typo-tolerant matching.
pub const FUZZY_MIN_KEYWORD_LEN: usize = 7;

/// Maximum edit distance for typo-tolerant matching.
pub const FUZZY_MAX_DISTANCE: usize = 1;
