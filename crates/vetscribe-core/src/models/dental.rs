//! Dental findings, charts and recommendations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vocab::{DentalCondition, NumberingScheme, Severity, Tooth};

/// A single dental observation extracted from text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    /// Triadan tooth number, `None` for whole-mouth findings
    pub tooth: Option<u16>,
    pub condition: DentalCondition,
    pub severity: Severity,
    /// Whether the severity was stated in the text or taken from the table
    pub severity_stated: bool,
    /// Anchoring confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Clause the finding was read from
    pub evidence: String,
}

/// One condition placed on a charted tooth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartedCondition {
    pub condition: DentalCondition,
    pub severity: Severity,
    pub confidence: f64,
    pub evidence: String,
}

/// A tooth with at least one finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartedTooth {
    pub tooth: Tooth,
    /// All findings for this tooth, in extraction order
    pub conditions: Vec<ChartedCondition>,
    /// Maximum of the constituent severities
    pub severity: Severity,
}

/// Tooth-by-tooth dental chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DentalChart {
    pub scheme: NumberingScheme,
    /// Vocabulary version that produced the findings
    pub vocabulary_version: String,
    pub teeth: BTreeMap<u16, ChartedTooth>,
    /// Findings not anchored to a tooth
    pub general_findings: Vec<Finding>,
}

impl DentalChart {
    pub fn is_empty(&self) -> bool {
        self.teeth.is_empty() && self.general_findings.is_empty()
    }

    pub fn tooth(&self, number: u16) -> Option<&ChartedTooth> {
        self.teeth.get(&number)
    }

    /// Total number of findings, anchored or not.
    pub fn finding_count(&self) -> usize {
        self.teeth.values().map(|t| t.conditions.len()).sum::<usize>()
            + self.general_findings.len()
    }

    /// Highest severity anywhere in the chart.
    pub fn max_severity(&self) -> Option<Severity> {
        self.teeth
            .values()
            .map(|t| t.severity)
            .chain(self.general_findings.iter().map(|f| f.severity))
            .max()
    }

    /// Teeth whose aggregated severity is at or above `threshold`.
    pub fn teeth_at_or_above(&self, threshold: Severity) -> Vec<&ChartedTooth> {
        self.teeth
            .values()
            .filter(|t| t.severity >= threshold)
            .collect()
    }
}

/// Kind of recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Refer to a veterinary dentist
    Referral,
    /// Condition-specific treatment
    Treatment,
    /// Tooth needs another look
    Reexamine,
    /// Nothing abnormal recorded
    Routine,
}

/// A rule-based dental recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    /// Teeth the recommendation applies to (empty for whole mouth)
    pub teeth: Vec<u16>,
    pub condition: Option<DentalCondition>,
    pub text: String,
}

/// Finding counts per severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityCounts {
    pub mild: usize,
    pub moderate: usize,
    pub severe: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Mild => self.mild += 1,
            Severity::Moderate => self.moderate += 1,
            Severity::Severe => self.severe += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.mild + self.moderate + self.severe + self.critical
    }
}

/// Result of analyzing a dental chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DentalAnalysis {
    pub recommendations: Vec<Recommendation>,
    pub referral_recommended: bool,
    pub highest_severity: Option<Severity>,
    /// Number of charted teeth
    pub affected_teeth: usize,
    pub counts: SeverityCounts,
    /// Threshold the analysis was run with
    pub referral_threshold: Severity,
}

impl DentalAnalysis {
    /// Plain-text rendering for notes and exports.
    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        match self.highest_severity {
            Some(highest) => out.push_str(&format!(
                "{} affected teeth, highest severity {} (mild {}, moderate {}, severe {}, critical {}).\n",
                self.affected_teeth,
                highest,
                self.counts.mild,
                self.counts.moderate,
                self.counts.severe,
                self.counts.critical,
            )),
            None => out.push_str("No dental findings recorded.\n"),
        }
        if self.referral_recommended {
            out.push_str("Referral to a veterinary dentist is recommended.\n");
        }
        for rec in &self.recommendations {
            out.push_str("- ");
            out.push_str(&rec.text);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_counts() {
        let mut counts = SeverityCounts::default();
        counts.add(Severity::Mild);
        counts.add(Severity::Mild);
        counts.add(Severity::Critical);
        assert_eq!(counts.mild, 2);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_empty_chart() {
        let chart = DentalChart {
            scheme: NumberingScheme::Canine,
            vocabulary_version: crate::vocab::VOCABULARY_VERSION.to_string(),
            teeth: BTreeMap::new(),
            general_findings: vec![],
        };
        assert!(chart.is_empty());
        assert_eq!(chart.max_severity(), None);
        assert_eq!(chart.finding_count(), 0);
    }

    #[test]
    fn test_chart_json_keys() {
        let tooth = NumberingScheme::Canine.lookup(104).unwrap();
        let mut teeth = BTreeMap::new();
        teeth.insert(
            104,
            ChartedTooth {
                tooth,
                conditions: vec![ChartedCondition {
                    condition: DentalCondition::Fracture,
                    severity: Severity::Mild,
                    confidence: 0.9,
                    evidence: "fractured canine tooth 104".into(),
                }],
                severity: Severity::Mild,
            },
        );
        let chart = DentalChart {
            scheme: NumberingScheme::Canine,
            vocabulary_version: "test".into(),
            teeth,
            general_findings: vec![],
        };

        let json = serde_json::to_string(&chart).unwrap();
        assert!(json.contains("\"104\""));
        let back: DentalChart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chart);
    }
}
