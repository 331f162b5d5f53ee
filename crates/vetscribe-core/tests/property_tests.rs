//! Property tests for charting and patient identity.

use proptest::prelude::*;

use vetscribe_core::dental::{analyze, chart, extract};
use vetscribe_core::{DentalCondition, Finding, NumberingScheme, PatientKey, Severity, Species};

const CANINE_TEETH: &[u16] = &[101, 104, 108, 110, 204, 208, 304, 309, 404, 409];

fn severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::ALL.to_vec())
}

fn condition() -> impl Strategy<Value = DentalCondition> {
    prop::sample::select(vec![
        DentalCondition::Fracture,
        DentalCondition::Calculus,
        DentalCondition::Gingivitis,
        DentalCondition::ToothResorption,
        DentalCondition::Mobility,
    ])
}

fn finding() -> impl Strategy<Value = Finding> {
    (
        prop::option::of(prop::sample::select(CANINE_TEETH.to_vec())),
        condition(),
        severity(),
    )
        .prop_map(|(tooth, condition, severity)| Finding {
            tooth,
            condition,
            severity,
            severity_stated: true,
            confidence: 0.9,
            evidence: String::new(),
        })
}

proptest! {
    #[test]
    fn tooth_severity_is_max_of_findings(findings in prop::collection::vec(finding(), 0..12)) {
        let charted = chart(&findings, NumberingScheme::Canine).unwrap();
        for (number, tooth) in &charted.teeth {
            let expected = findings
                .iter()
                .filter(|f| f.tooth == Some(*number))
                .map(|f| f.severity)
                .max();
            prop_assert_eq!(Some(tooth.severity), expected);
        }
        prop_assert_eq!(charted.finding_count(), findings.len());
    }

    #[test]
    fn referral_iff_threshold_reached(
        findings in prop::collection::vec(finding(), 0..12),
        threshold in severity(),
    ) {
        let charted = chart(&findings, NumberingScheme::Canine).unwrap();
        let analysis = analyze(&charted, threshold);
        let reached = findings.iter().any(|f| f.severity >= threshold);
        prop_assert_eq!(analysis.referral_recommended, reached);
    }

    #[test]
    fn extraction_is_deterministic(text in "[a-z0-9 ,.]{0,80}") {
        let first = extract(&text);
        let second = extract(&text);
        prop_assert_eq!(&first, &second);
        let a = chart(&first, NumberingScheme::Canine);
        let b = chart(&second, NumberingScheme::Canine);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn patient_key_ignores_case_and_spacing(
        name in "[A-Za-z]{1,10}( [A-Za-z]{1,10})?",
        owner in "[A-Za-z]{1,10} [A-Za-z]{1,10}",
    ) {
        let plain = PatientKey::new(&name, Species::Canine, Some(&owner));
        let noisy_name = format!("  {}  ", name.to_uppercase().replace(' ', "   "));
        let noisy_owner = format!("\t{} ", owner.to_lowercase().replace(' ', "  "));
        let noisy = PatientKey::new(&noisy_name, Species::Canine, Some(&noisy_owner));
        prop_assert_eq!(plain, noisy);
    }

    #[test]
    fn patient_key_separates_species(name in "[A-Za-z]{1,10}") {
        let dog = PatientKey::new(&name, Species::Canine, None);
        let cat = PatientKey::new(&name, Species::Feline, None);
        prop_assert_ne!(dog, cat);
    }
}
