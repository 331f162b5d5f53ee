//! Keyword-based finding extraction.
//!
//! Text is split into sentences and clauses, then scanned left to right for
//! tooth numbers and vocabulary phrases (longest phrase first). Conditions
//! are anchored to the nearest tooth and take the nearest stated severity.

use std::collections::HashSet;
use std::sync::OnceLock;

use strsim::levenshtein;
use tracing::debug;

use crate::models::Finding;
use crate::vocab::{
    parse_tooth_number, DentalCondition, Severity, CLAUSE_BREAKS, CONDITION_TABLE,
    FUZZY_MAX_DISTANCE, FUZZY_MIN_KEYWORD_LEN, NEGATION_CUES, SEVERITY_CUES,
};

const CLAUSE_CONFIDENCE: f64 = 0.9;
const SENTENCE_CONFIDENCE: f64 = 0.7;
const UNANCHORED_CONFIDENCE: f64 = 0.5;
/// Subtracted when the keyword only matched with a typo.
const FUZZY_PENALTY: f64 = 0.1;

#[derive(Debug, Clone)]
struct Token {
    text: String,
    sentence: usize,
    clause: usize,
}

fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut sentence = 0;
    let mut clause = 0;

    for (i, &c) in chars.iter().enumerate() {
        let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        let decimal_point = c == '.' && prev_digit && next_digit;
        let inner_hyphen = c == '-' && word.chars().last().is_some_and(|l| l.is_alphabetic());

        if c.is_alphanumeric() || c == '\'' || decimal_point || inner_hyphen {
            word.extend(c.to_lowercase());
            continue;
        }

        push_word(&mut word, &mut tokens, sentence, &mut clause);
        match c {
            '.' | ';' | '!' | '?' | '\n' => {
                sentence += 1;
                clause += 1;
            }
            ',' | ':' | '(' | ')' => clause += 1,
            _ => {}
        }
    }
    push_word(&mut word, &mut tokens, sentence, &mut clause);
    tokens
}

fn push_word(word: &mut String, tokens: &mut Vec<Token>, sentence: usize, clause: &mut usize) {
    let text = word.trim_matches(|c: char| c == '-' || c == '\'');
    if text.is_empty() {
        word.clear();
        return;
    }
    if CLAUSE_BREAKS.contains(&text) {
        *clause += 1;
    } else {
        tokens.push(Token {
            text: text.to_string(),
            sentence,
            clause: *clause,
        });
    }
    word.clear();
}

#[derive(Debug, Clone, Copy)]
enum Cue {
    Condition(DentalCondition),
    Severity(Severity),
    Negation,
}

#[derive(Debug)]
struct Phrase {
    words: Vec<&'static str>,
    cue: Cue,
}

/// All vocabulary phrases, longest first. Table order breaks ties.
fn phrases() -> &'static [Phrase] {
    static PHRASES: OnceLock<Vec<Phrase>> = OnceLock::new();
    PHRASES.get_or_init(|| {
        let mut phrases = Vec::new();
        for entry in CONDITION_TABLE {
            for keyword in entry.keywords {
                phrases.push(Phrase {
                    words: keyword.split(' ').collect(),
                    cue: Cue::Condition(entry.condition),
                });
            }
        }
        for (cue, severity) in SEVERITY_CUES {
            phrases.push(Phrase {
                words: cue.split(' ').collect(),
                cue: Cue::Severity(*severity),
            });
        }
        for cue in NEGATION_CUES {
            phrases.push(Phrase {
                words: vec![*cue],
                cue: Cue::Negation,
            });
        }
        phrases.sort_by(|a, b| b.words.len().cmp(&a.words.len()));
        phrases
    })
}

#[derive(Debug)]
struct PhraseMatch {
    cue: Cue,
    len: usize,
    fuzzy: bool,
}

fn match_phrase(tokens: &[Token], start: usize) -> Option<PhraseMatch> {
    let clause = tokens[start].clause;
    for phrase in phrases() {
        let matched = phrase.words.iter().enumerate().all(|(offset, word)| {
            tokens
                .get(start + offset)
                .is_some_and(|t| t.clause == clause && t.text == *word)
        });
        if matched {
            return Some(PhraseMatch {
                cue: phrase.cue,
                len: phrase.words.len(),
                fuzzy: false,
            });
        }
    }

    let token = tokens[start].text.as_str();
    if token.chars().count() + FUZZY_MAX_DISTANCE < FUZZY_MIN_KEYWORD_LEN
        || token.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }
    phrases()
        .iter()
        .filter(|p| matches!(p.cue, Cue::Condition(_)) && p.words.len() == 1)
        .find(|p| {
            p.words[0].chars().count() >= FUZZY_MIN_KEYWORD_LEN
                && levenshtein(token, p.words[0]) <= FUZZY_MAX_DISTANCE
        })
        .map(|p| PhraseMatch {
            cue: p.cue,
            len: 1,
            fuzzy: true,
        })
}

#[derive(Debug)]
struct ToothRef {
    index: usize,
    number: u16,
}

#[derive(Debug)]
struct ConditionHit {
    start: usize,
    end: usize,
    condition: DentalCondition,
    fuzzy: bool,
}

#[derive(Debug)]
struct SeverityHit {
    start: usize,
    end: usize,
    severity: Severity,
}

/// Everything found in one pass over the token stream.
struct Scan {
    tokens: Vec<Token>,
    teeth: Vec<ToothRef>,
    conditions: Vec<ConditionHit>,
    severities: Vec<SeverityHit>,
    negations: Vec<usize>,
}

impl Scan {
    fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        let mut scan = Scan {
            tokens: Vec::new(),
            teeth: Vec::new(),
            conditions: Vec::new(),
            severities: Vec::new(),
            negations: Vec::new(),
        };

        let mut i = 0;
        while i < tokens.len() {
            if let Some(number) = parse_tooth_number(&tokens[i].text) {
                scan.teeth.push(ToothRef { index: i, number });
                i += 1;
                continue;
            }
            match match_phrase(&tokens, i) {
                Some(m) => {
                    match m.cue {
                        Cue::Condition(condition) => scan.conditions.push(ConditionHit {
                            start: i,
                            end: i + m.len,
                            condition,
                            fuzzy: m.fuzzy,
                        }),
                        Cue::Severity(severity) => scan.severities.push(SeverityHit {
                            start: i,
                            end: i + m.len,
                            severity,
                        }),
                        Cue::Negation => scan.negations.push(i),
                    }
                    i += m.len;
                }
                None => i += 1,
            }
        }

        scan.tokens = tokens;
        scan
    }

    fn clause_of(&self, index: usize) -> usize {
        self.tokens[index].clause
    }

    fn sentence_of(&self, index: usize) -> usize {
        self.tokens[index].sentence
    }

    /// A negation cue earlier in the same clause.
    fn is_negated(&self, index: usize) -> bool {
        let clause = self.clause_of(index);
        self.negations
            .iter()
            .any(|&n| n < index && self.clause_of(n) == clause)
    }

    /// Nearest tooth reference among `candidates`, ties preferring the one
    /// after the span.
    fn nearest_tooth<'a>(
        &self,
        start: usize,
        end: usize,
        candidates: impl Iterator<Item = &'a ToothRef>,
    ) -> Option<&'a ToothRef> {
        candidates.min_by_key(|t| {
            if t.index < start {
                (start - t.index, 1)
            } else {
                (t.index + 1 - end, 0)
            }
        })
    }

    fn anchor(&self, hit: &ConditionHit) -> (Option<&ToothRef>, f64) {
        let clause = self.clause_of(hit.start);
        let sentence = self.sentence_of(hit.start);

        let in_clause = self
            .teeth
            .iter()
            .filter(|t| self.clause_of(t.index) == clause);
        if let Some(tooth) = self.nearest_tooth(hit.start, hit.end, in_clause) {
            return (Some(tooth), CLAUSE_CONFIDENCE);
        }

        let in_sentence = self
            .teeth
            .iter()
            .filter(|t| self.sentence_of(t.index) == sentence);
        match self.nearest_tooth(hit.start, hit.end, in_sentence) {
            Some(tooth) => (Some(tooth), SENTENCE_CONFIDENCE),
            None => (None, UNANCHORED_CONFIDENCE),
        }
    }

    /// Stated severity for a span: nearest cue in the same clause, else a
    /// cue in the following clause if that clause carries nothing else.
    fn stated_severity(&self, start: usize, end: usize) -> Option<Severity> {
        let clause = self.clause_of(start);
        let in_clause = self
            .severities
            .iter()
            .filter(|s| self.clause_of(s.start) == clause && !self.is_negated(s.start))
            .min_by_key(|s| {
                if s.start < start {
                    (start - s.end + 1, 0)
                } else {
                    (s.start + 1 - end, 1)
                }
            });
        if let Some(hit) = in_clause {
            return Some(hit.severity);
        }

        let next = clause + 1;
        let sentence = self.sentence_of(start);
        let next_tokens: Vec<usize> = (0..self.tokens.len())
            .filter(|&i| self.tokens[i].clause == next)
            .collect();
        let same_sentence = next_tokens
            .first()
            .is_some_and(|&i| self.sentence_of(i) == sentence);
        let occupied = self.teeth.iter().any(|t| self.clause_of(t.index) == next)
            || self.conditions.iter().any(|c| self.clause_of(c.start) == next);
        if !same_sentence || occupied {
            return None;
        }
        self.severities
            .iter()
            .filter(|s| self.clause_of(s.start) == next && !self.is_negated(s.start))
            .map(|s| s.severity)
            .max()
    }

    fn evidence(&self, index: usize) -> String {
        let clause = self.clause_of(index);
        self.tokens
            .iter()
            .filter(|t| t.clause == clause)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Extract dental findings from free text.
///
/// Returns findings in text order. Tooth numbers that no condition claims
/// become [`DentalCondition::Unspecified`] findings.
pub fn extract(text: &str) -> Vec<Finding> {
    let scan = Scan::new(text);
    let mut consumed: HashSet<usize> = HashSet::new();
    let mut positioned: Vec<(usize, Finding)> = Vec::new();

    for hit in &scan.conditions {
        if scan.is_negated(hit.start) {
            // A negated condition still claims the teeth in its clause.
            let clause = scan.clause_of(hit.start);
            consumed.extend(
                scan.teeth
                    .iter()
                    .filter(|t| scan.clause_of(t.index) == clause)
                    .map(|t| t.index),
            );
            continue;
        }

        let (tooth, mut confidence) = scan.anchor(hit);
        if let Some(tooth) = tooth {
            consumed.insert(tooth.index);
        }
        if hit.fuzzy {
            confidence -= FUZZY_PENALTY;
        }
        let stated = scan.stated_severity(hit.start, hit.end);
        positioned.push((
            hit.start,
            Finding {
                tooth: tooth.map(|t| t.number),
                condition: hit.condition,
                severity: stated.unwrap_or_else(|| hit.condition.default_severity()),
                severity_stated: stated.is_some(),
                confidence,
                evidence: scan.evidence(hit.start),
            },
        ));
    }

    for tooth in scan.teeth.iter().filter(|t| !consumed.contains(&t.index)) {
        let stated = scan.stated_severity(tooth.index, tooth.index + 1);
        positioned.push((
            tooth.index,
            Finding {
                tooth: Some(tooth.number),
                condition: DentalCondition::Unspecified,
                severity: stated.unwrap_or_else(|| DentalCondition::Unspecified.default_severity()),
                severity_stated: stated.is_some(),
                confidence: UNANCHORED_CONFIDENCE,
                evidence: scan.evidence(tooth.index),
            },
        ));
    }

    positioned.sort_by_key(|(position, _)| *position);
    let findings = dedupe(positioned.into_iter().map(|(_, f)| f).collect());
    debug!(
        tokens = scan.tokens.len(),
        findings = findings.len(),
        "Extracted dental findings"
    );
    findings
}

/// Merge findings from two sources (e.g. transcript and generated note).
///
/// Identical (tooth, condition) pairs collapse into one, keeping the higher
/// severity and confidence. Order follows `primary`, then new findings from
/// `secondary`.
pub fn merge_findings(primary: &[Finding], secondary: &[Finding]) -> Vec<Finding> {
    dedupe(primary.iter().chain(secondary.iter()).cloned().collect())
}

fn dedupe(findings: Vec<Finding>) -> Vec<Finding> {
    let specified: HashSet<u16> = findings
        .iter()
        .filter(|f| f.condition != DentalCondition::Unspecified)
        .filter_map(|f| f.tooth)
        .collect();

    let mut merged: Vec<Finding> = Vec::with_capacity(findings.len());
    for finding in findings {
        if finding.condition == DentalCondition::Unspecified
            && finding.tooth.is_some_and(|t| specified.contains(&t))
        {
            continue;
        }
        match merged
            .iter_mut()
            .find(|m| m.tooth == finding.tooth && m.condition == finding.condition)
        {
            Some(existing) => {
                if finding.severity > existing.severity {
                    existing.severity = finding.severity;
                    existing.severity_stated = finding.severity_stated;
                    existing.evidence = finding.evidence;
                }
                existing.confidence = existing.confidence.max(finding.confidence);
            }
            None => merged.push(finding),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(findings: &[Finding]) -> &Finding {
        assert_eq!(findings.len(), 1, "findings: {:?}", findings);
        &findings[0]
    }

    #[test]
    fn test_fractured_canine_mild() {
        let findings = extract("fractured canine tooth 104, mild");
        let finding = only(&findings);
        assert_eq!(finding.tooth, Some(104));
        assert_eq!(finding.condition, DentalCondition::Fracture);
        assert_eq!(finding.severity, Severity::Mild);
        assert!(finding.severity_stated);
        assert_eq!(finding.confidence, CLAUSE_CONFIDENCE);
    }

    #[test]
    fn test_default_severity_when_unstated() {
        let findings = extract("Tooth resorption noted on 307.");
        let finding = only(&findings);
        assert_eq!(finding.tooth, Some(307));
        assert_eq!(finding.condition, DentalCondition::ToothResorption);
        assert_eq!(finding.severity, Severity::Severe);
        assert!(!finding.severity_stated);
    }

    #[test]
    fn test_multi_word_keyword_preferred() {
        let findings = extract("Severe periodontal disease at 409");
        let finding = only(&findings);
        assert_eq!(finding.condition, DentalCondition::PeriodontalDisease);
        assert_eq!(finding.severity, Severity::Severe);
        assert_eq!(finding.tooth, Some(409));
    }

    #[test]
    fn test_negated_condition_ignored() {
        let findings = extract("No fractures on 104. Mild calculus on 108.");
        let finding = only(&findings);
        assert_eq!(finding.tooth, Some(108));
        assert_eq!(finding.condition, DentalCondition::Calculus);
    }

    #[test]
    fn test_negation_scope_ends_at_but() {
        let findings = extract("no calculus but moderate gingivitis");
        let finding = only(&findings);
        assert_eq!(finding.condition, DentalCondition::Gingivitis);
        assert_eq!(finding.severity, Severity::Moderate);
        assert_eq!(finding.tooth, None);
    }

    #[test]
    fn test_sentence_level_anchor() {
        let findings = extract("Checked 208 closely, marked mobility");
        let finding = only(&findings);
        assert_eq!(finding.tooth, Some(208));
        assert_eq!(finding.condition, DentalCondition::Mobility);
        assert_eq!(finding.severity, Severity::Severe);
        assert_eq!(finding.confidence, SENTENCE_CONFIDENCE);
    }

    #[test]
    fn test_general_finding_unanchored() {
        let findings = extract("Generalized tartar throughout the mouth.");
        let finding = only(&findings);
        assert_eq!(finding.tooth, None);
        assert_eq!(finding.condition, DentalCondition::Calculus);
        assert_eq!(finding.confidence, UNANCHORED_CONFIDENCE);
    }

    #[test]
    fn test_unclaimed_tooth_is_unspecified() {
        let findings = extract("Please look at #204 again.");
        let finding = only(&findings);
        assert_eq!(finding.tooth, Some(204));
        assert_eq!(finding.condition, DentalCondition::Unspecified);
        assert_eq!(finding.severity, Severity::Mild);
    }

    #[test]
    fn test_misspelled_keyword_matches() {
        let findings = extract("fracured 108");
        let finding = only(&findings);
        assert_eq!(finding.condition, DentalCondition::Fracture);
        assert!(finding.confidence < CLAUSE_CONFIDENCE);
    }

    #[test]
    fn test_short_keywords_are_exact() {
        assert!(extract("the loos thing").is_empty());
    }

    #[test]
    fn test_decimals_are_not_teeth() {
        assert!(extract("Temperature 101.5, weight 12.4 kg").is_empty());
    }

    #[test]
    fn test_text_order() {
        let findings = extract("Gingivitis at 409. Fractured 104, severe.");
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].tooth, Some(409));
        assert_eq!(findings[1].tooth, Some(104));
        assert_eq!(findings[1].severity, Severity::Severe);
    }

    #[test]
    fn test_pulp_exposure_is_critical() {
        let findings = extract("slab fracture 208 with pulp exposure");
        let finding = only(&findings);
        assert_eq!(finding.condition, DentalCondition::Fracture);
        assert_eq!(finding.severity, Severity::Critical);
    }

    #[test]
    fn test_merge_keeps_higher_severity() {
        let transcript = extract("Fractured 104, mild.");
        let note = extract("Tooth 104: fracture, severe.");
        let merged = merge_findings(&transcript, &note);
        let finding = only(&merged);
        assert_eq!(finding.severity, Severity::Severe);
        assert_eq!(finding.tooth, Some(104));
    }

    #[test]
    fn test_merge_drops_redundant_unspecified() {
        let transcript = extract("Recheck 104.");
        let note = extract("Calculus on 104.");
        let merged = merge_findings(&transcript, &note);
        let finding = only(&merged);
        assert_eq!(finding.condition, DentalCondition::Calculus);
    }

    #[test]
    fn test_empty_text() {
        assert!(extract("").is_empty());
        assert!(extract("   \n ").is_empty());
    }
}
