//! Modified Triadan tooth numbering.
//!
//! Each tooth is a three-digit number `QPP`: quadrant `Q` (1 = right
//! maxillary, 2 = left maxillary, 3 = left mandibular, 4 = right mandibular)
//! and position `PP` counted from the midline. Positions are preserved across
//! species, so a cat's upper fourth premolar is 108 just like a dog's even
//! though the cat has no 105.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numbering scheme used to anchor findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingScheme {
    /// 42 permanent teeth
    Canine,
    /// 30 permanent teeth
    Feline,
}

/// Valid positions per jaw: (maxillary, mandibular).
const CANINE_POSITIONS: (&[u16], &[u16]) = (
    &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
    &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
);

const FELINE_POSITIONS: (&[u16], &[u16]) = (
    &[1, 2, 3, 4, 6, 7, 8, 9],
    &[1, 2, 3, 4, 7, 8, 9],
);

impl NumberingScheme {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberingScheme::Canine => "canine",
            NumberingScheme::Feline => "feline",
        }
    }

    fn positions(&self, quadrant: Quadrant) -> &'static [u16] {
        let (maxillary, mandibular) = match self {
            NumberingScheme::Canine => CANINE_POSITIONS,
            NumberingScheme::Feline => FELINE_POSITIONS,
        };
        if quadrant.is_maxillary() {
            maxillary
        } else {
            mandibular
        }
    }

    /// Look up a tooth number in this scheme.
    pub fn lookup(&self, number: u16) -> Option<Tooth> {
        let quadrant = Quadrant::from_digit(number / 100)?;
        let position = number % 100;
        if !self.positions(quadrant).contains(&position) {
            return None;
        }
        Some(Tooth {
            number,
            quadrant,
            position,
            kind: ToothKind::from_position(position),
        })
    }

    /// Check whether a tooth number exists in this scheme.
    pub fn is_valid(&self, number: u16) -> bool {
        self.lookup(number).is_some()
    }

    /// All teeth of the scheme in ascending order.
    pub fn teeth(&self) -> Vec<Tooth> {
        Quadrant::ALL
            .iter()
            .flat_map(|quadrant| {
                self.positions(*quadrant).iter().map(move |position| Tooth {
                    number: quadrant.digit() * 100 + position,
                    quadrant: *quadrant,
                    position: *position,
                    kind: ToothKind::from_position(*position),
                })
            })
            .collect()
    }
}

impl fmt::Display for NumberingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dental quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    RightMaxillary,
    LeftMaxillary,
    LeftMandibular,
    RightMandibular,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::RightMaxillary,
        Quadrant::LeftMaxillary,
        Quadrant::LeftMandibular,
        Quadrant::RightMandibular,
    ];

    fn from_digit(digit: u16) -> Option<Self> {
        match digit {
            1 => Some(Quadrant::RightMaxillary),
            2 => Some(Quadrant::LeftMaxillary),
            3 => Some(Quadrant::LeftMandibular),
            4 => Some(Quadrant::RightMandibular),
            _ => None,
        }
    }

    fn digit(&self) -> u16 {
        match self {
            Quadrant::RightMaxillary => 1,
            Quadrant::LeftMaxillary => 2,
            Quadrant::LeftMandibular => 3,
            Quadrant::RightMandibular => 4,
        }
    }

    pub fn is_maxillary(&self) -> bool {
        matches!(self, Quadrant::RightMaxillary | Quadrant::LeftMaxillary)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::RightMaxillary => "right maxillary",
            Quadrant::LeftMaxillary => "left maxillary",
            Quadrant::LeftMandibular => "left mandibular",
            Quadrant::RightMandibular => "right mandibular",
        }
    }
}

/// Tooth type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToothKind {
    Incisor,
    Canine,
    Premolar,
    Molar,
}

impl ToothKind {
    fn from_position(position: u16) -> Self {
        match position {
            1..=3 => ToothKind::Incisor,
            4 => ToothKind::Canine,
            5..=8 => ToothKind::Premolar,
            _ => ToothKind::Molar,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToothKind::Incisor => "incisor",
            ToothKind::Canine => "canine",
            ToothKind::Premolar => "premolar",
            ToothKind::Molar => "molar",
        }
    }
}

/// A tooth position within a numbering scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tooth {
    /// Triadan number (e.g. 104)
    pub number: u16,
    pub quadrant: Quadrant,
    /// Position from the midline (01-11)
    pub position: u16,
    pub kind: ToothKind,
}

impl Tooth {
    /// Anatomical name, e.g. "right maxillary fourth premolar".
    pub fn name(&self) -> String {
        let ordinal = match self.kind {
            ToothKind::Canine => None,
            ToothKind::Incisor => Some(self.position),
            ToothKind::Premolar => Some(self.position - 4),
            ToothKind::Molar => Some(self.position - 8),
        };
        match ordinal {
            Some(n) => format!(
                "{} {} {}",
                self.quadrant.label(),
                ordinal_word(n),
                self.kind.label()
            ),
            None => format!("{} {}", self.quadrant.label(), self.kind.label()),
        }
    }
}

impl fmt::Display for Tooth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number, self.name())
    }
}

fn ordinal_word(n: u16) -> &'static str {
    match n {
        1 => "first",
        2 => "second",
        3 => "third",
        _ => "fourth",
    }
}

/// Parse a token that looks like a Triadan number in any scheme.
///
/// Accepts exactly three ASCII digits with quadrant 1-4 and position 01-11.
/// Species validity is checked later, at charting time.
pub fn parse_tooth_number(token: &str) -> Option<u16> {
    if token.len() != 3 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: u16 = token.parse().ok()?;
    let quadrant = number / 100;
    let position = number % 100;
    if (1..=4).contains(&quadrant) && (1..=11).contains(&position) {
        Some(number)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tooth_counts() {
        assert_eq!(NumberingScheme::Canine.teeth().len(), 42);
        assert_eq!(NumberingScheme::Feline.teeth().len(), 30);
    }

    #[test]
    fn test_feline_gaps() {
        let feline = NumberingScheme::Feline;
        assert!(feline.is_valid(104));
        assert!(feline.is_valid(108));
        assert!(!feline.is_valid(105));
        assert!(!feline.is_valid(110));
        assert!(!feline.is_valid(306));
        assert!(feline.is_valid(309));
        assert!(!feline.is_valid(310));
    }

    #[test]
    fn test_canine_lookup() {
        let tooth = NumberingScheme::Canine.lookup(104).unwrap();
        assert_eq!(tooth.kind, ToothKind::Canine);
        assert_eq!(tooth.quadrant, Quadrant::RightMaxillary);
        assert_eq!(tooth.name(), "right maxillary canine");

        let carnassial = NumberingScheme::Canine.lookup(208).unwrap();
        assert_eq!(carnassial.name(), "left maxillary fourth premolar");

        let molar = NumberingScheme::Canine.lookup(311).unwrap();
        assert_eq!(molar.name(), "left mandibular third molar");

        assert!(NumberingScheme::Canine.lookup(111).is_none());
    }

    #[test]
    fn test_parse_tooth_number() {
        assert_eq!(parse_tooth_number("104"), Some(104));
        assert_eq!(parse_tooth_number("411"), Some(411));
        assert_eq!(parse_tooth_number("500"), None);
        assert_eq!(parse_tooth_number("100"), None);
        assert_eq!(parse_tooth_number("112"), None);
        assert_eq!(parse_tooth_number("1040"), None);
        assert_eq!(parse_tooth_number("10a"), None);
    }

    #[test]
    fn test_teeth_sorted() {
        let numbers: Vec<u16> = NumberingScheme::Canine
            .teeth()
            .iter()
            .map(|t| t.number)
            .collect();
        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        assert_eq!(numbers, sorted);
    }
}
