//! Rule-based analysis of a dental chart.

use tracing::debug;

use crate::models::{
    DentalAnalysis, DentalChart, Recommendation, RecommendationKind, SeverityCounts,
};
use crate::vocab::{DentalCondition, Severity, CONDITION_TABLE, UNSPECIFIED_ENTRY};

const ROUTINE_CARE: &str =
    "No dental abnormalities recorded; continue routine home care and an annual oral examination.";

/// Analyze a chart and produce recommendations.
///
/// Recommendations come out in a fixed order: referrals (by tooth), then
/// one treatment per condition in table order, then re-examination of
/// unspecified teeth. An empty chart yields a single routine-care entry.
pub fn analyze(chart: &DentalChart, threshold: Severity) -> DentalAnalysis {
    let mut recommendations = Vec::new();

    for charted in chart.teeth_at_or_above(threshold) {
        let conditions: Vec<String> = charted
            .conditions
            .iter()
            .filter(|c| c.severity >= threshold)
            .map(|c| format!("{} ({})", c.condition, c.severity))
            .collect();
        recommendations.push(Recommendation {
            kind: RecommendationKind::Referral,
            teeth: vec![charted.tooth.number],
            condition: None,
            text: format!(
                "Refer to a veterinary dentist for tooth {}: {}.",
                charted.tooth,
                conditions.join(", ")
            ),
        });
    }

    let general_severe: Vec<String> = chart
        .general_findings
        .iter()
        .filter(|f| f.severity >= threshold)
        .map(|f| format!("{} ({})", f.condition, f.severity))
        .collect();
    if !general_severe.is_empty() {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Referral,
            teeth: vec![],
            condition: None,
            text: format!(
                "Refer to a veterinary dentist for whole-mouth findings: {}.",
                general_severe.join(", ")
            ),
        });
    }
    let referral_recommended = !recommendations.is_empty();

    for entry in CONDITION_TABLE {
        let teeth: Vec<u16> = chart
            .teeth
            .values()
            .filter(|t| t.conditions.iter().any(|c| c.condition == entry.condition))
            .map(|t| t.tooth.number)
            .collect();
        let general = chart
            .general_findings
            .iter()
            .any(|f| f.condition == entry.condition);
        if teeth.is_empty() && !general {
            continue;
        }
        recommendations.push(Recommendation {
            kind: RecommendationKind::Treatment,
            text: format!(
                "{} ({}): {}",
                capitalize(entry.label),
                location(&teeth, general),
                entry.recommendation
            ),
            teeth,
            condition: Some(entry.condition),
        });
    }

    let unspecified: Vec<u16> = chart
        .teeth
        .values()
        .filter(|t| {
            t.conditions
                .iter()
                .any(|c| c.condition == DentalCondition::Unspecified)
        })
        .map(|t| t.tooth.number)
        .collect();
    if !unspecified.is_empty() {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Reexamine,
            text: format!(
                "Teeth {}: {}",
                join_numbers(&unspecified),
                UNSPECIFIED_ENTRY.recommendation
            ),
            teeth: unspecified,
            condition: Some(DentalCondition::Unspecified),
        });
    }

    if chart.is_empty() {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Routine,
            teeth: vec![],
            condition: None,
            text: ROUTINE_CARE.to_string(),
        });
    }

    let mut counts = SeverityCounts::default();
    for charted in chart.teeth.values() {
        for condition in &charted.conditions {
            counts.add(condition.severity);
        }
    }
    for finding in &chart.general_findings {
        counts.add(finding.severity);
    }

    debug!(
        recommendations = recommendations.len(),
        referral = referral_recommended,
        "Analyzed dental chart"
    );

    DentalAnalysis {
        recommendations,
        referral_recommended,
        highest_severity: chart.max_severity(),
        affected_teeth: chart.teeth.len(),
        counts,
        referral_threshold: threshold,
    }
}

fn location(teeth: &[u16], general: bool) -> String {
    match (teeth.is_empty(), general) {
        (true, _) => "whole mouth".to_string(),
        (false, false) => join_numbers(teeth),
        (false, true) => format!("{}, whole mouth", join_numbers(teeth)),
    }
}

fn join_numbers(teeth: &[u16]) -> String {
    teeth
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dental::{chart, extract};
    use crate::vocab::NumberingScheme;

    fn analyze_text(text: &str, threshold: Severity) -> DentalAnalysis {
        let chart = chart(&extract(text), NumberingScheme::Canine).unwrap();
        analyze(&chart, threshold)
    }

    #[test]
    fn test_mild_fracture_no_referral() {
        let analysis = analyze_text("fractured canine tooth 104, mild", Severity::Severe);
        assert!(!analysis.referral_recommended);
        assert_eq!(analysis.highest_severity, Some(Severity::Mild));
        assert_eq!(analysis.recommendations.len(), 1);
        let rec = &analysis.recommendations[0];
        assert_eq!(rec.kind, RecommendationKind::Treatment);
        assert_eq!(rec.teeth, vec![104]);
        assert!(rec.text.starts_with("Fracture (104)"));
    }

    #[test]
    fn test_severe_finding_triggers_referral() {
        let analysis = analyze_text("Severe periodontitis at 409.", Severity::Severe);
        assert!(analysis.referral_recommended);
        assert_eq!(analysis.recommendations[0].kind, RecommendationKind::Referral);
        assert_eq!(analysis.recommendations[0].teeth, vec![409]);
        assert_eq!(analysis.counts.severe, 1);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let text = "fractured canine tooth 104, mild";
        assert!(analyze_text(text, Severity::Mild).referral_recommended);
        assert!(!analyze_text(text, Severity::Moderate).referral_recommended);
    }

    #[test]
    fn test_unspecified_teeth_reexamined() {
        let analysis = analyze_text("Look at 204 and 304 again.", Severity::Severe);
        let rec = analysis.recommendations.last().unwrap();
        assert_eq!(rec.kind, RecommendationKind::Reexamine);
        assert_eq!(rec.teeth, vec![204, 304]);
    }

    #[test]
    fn test_empty_chart_routine() {
        let analysis = analyze_text("Teeth look great.", Severity::Severe);
        assert_eq!(analysis.recommendations.len(), 1);
        assert_eq!(analysis.recommendations[0].kind, RecommendationKind::Routine);
        assert_eq!(analysis.highest_severity, None);
        assert_eq!(analysis.counts.total(), 0);
        assert!(analysis.summary_text().contains("No dental findings recorded"));
    }

    #[test]
    fn test_treatments_in_table_order() {
        let analysis = analyze_text(
            "Calculus on 108. Fractured 204. Generalized gingivitis.",
            Severity::Critical,
        );
        let kinds: Vec<Option<DentalCondition>> = analysis
            .recommendations
            .iter()
            .map(|r| r.condition)
            .collect();
        assert_eq!(
            kinds,
            vec![
                Some(DentalCondition::Fracture),
                Some(DentalCondition::Gingivitis),
                Some(DentalCondition::Calculus),
            ]
        );
        assert!(analysis.recommendations[1].text.contains("whole mouth"));
    }
}
