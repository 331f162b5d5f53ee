//! Charting: findings onto a species numbering scheme.

use std::collections::BTreeMap;

use tracing::warn;

use super::{DentalError, DentalResult};
use crate::models::{ChartedCondition, ChartedTooth, DentalChart, Finding, Species};
use crate::vocab::{NumberingScheme, VOCABULARY_VERSION};

/// Numbering scheme for a species, falling back to `default` for species
/// without their own table.
pub fn scheme_for(species: Species, default: NumberingScheme) -> NumberingScheme {
    species.numbering_scheme().unwrap_or(default)
}

/// Place findings on a tooth chart.
///
/// Every anchored finding must name a tooth that exists in `scheme`. The
/// first one that does not aborts charting with
/// [`DentalError::InvalidToothReference`]. Per-tooth severity is the max of
/// its findings.
pub fn chart(findings: &[Finding], scheme: NumberingScheme) -> DentalResult<DentalChart> {
    let mut teeth: BTreeMap<u16, ChartedTooth> = BTreeMap::new();
    let mut general_findings = Vec::new();

    for finding in findings {
        let Some(number) = finding.tooth else {
            general_findings.push(finding.clone());
            continue;
        };
        let Some(tooth) = scheme.lookup(number) else {
            warn!(tooth = number, scheme = %scheme, "Tooth not in numbering scheme");
            return Err(DentalError::InvalidToothReference {
                tooth: number,
                scheme,
            });
        };

        let charted = teeth.entry(number).or_insert_with(|| ChartedTooth {
            tooth,
            conditions: Vec::new(),
            severity: finding.severity,
        });
        charted.severity = charted.severity.max(finding.severity);
        charted.conditions.push(ChartedCondition {
            condition: finding.condition,
            severity: finding.severity,
            confidence: finding.confidence,
            evidence: finding.evidence.clone(),
        });
    }

    Ok(DentalChart {
        scheme,
        vocabulary_version: VOCABULARY_VERSION.to_string(),
        teeth,
        general_findings,
    })
}
