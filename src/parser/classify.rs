//! Eclipse subtype classification from free-text descriptions
//!
//! Heuristic only: the label comes from markers in the text, not from any
//! geometry. NASA catalog rows carry a type column (`T`, `A`, `H`, `P`, `N`,
//! optionally suffixed like `Tm`, `As`, `Nx`); USNO descriptions spell the
//! type out ("Annular Solar Eclipse").

use serde::{Deserialize, Serialize};

use crate::models::EclipseKind;
use crate::parser::catalog::is_data_row;

/// Eclipse subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EclipseSubtype {
    Total,
    Annular,
    Hybrid,
    Partial,
    Penumbral,
}

impl EclipseSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Total => "Total",
            Self::Annular => "Annular",
            Self::Hybrid => "Hybrid",
            Self::Partial => "Partial",
            Self::Penumbral => "Penumbral",
        }
    }

    /// Catalog type letter
    fn from_code(code: char, kind: EclipseKind) -> Option<Self> {
        match (kind, code) {
            (_, 'T') => Some(Self::Total),
            (_, 'P') => Some(Self::Partial),
            (EclipseKind::Solar, 'A') => Some(Self::Annular),
            (EclipseKind::Solar, 'H') => Some(Self::Hybrid),
            (EclipseKind::Lunar, 'N') => Some(Self::Penumbral),
            _ => None,
        }
    }

    /// Codes in detection order for a category
    fn codes(kind: EclipseKind) -> &'static [char] {
        match kind {
            EclipseKind::Solar => &['H', 'A', 'T', 'P'],
            EclipseKind::Lunar => &['T', 'P', 'N'],
        }
    }

    /// Keywords in detection order for a category
    fn keywords(kind: EclipseKind) -> &'static [(&'static str, Self)] {
        match kind {
            EclipseKind::Solar => &[
                ("hybrid", Self::Hybrid),
                ("annular", Self::Annular),
                ("total", Self::Total),
                ("partial", Self::Partial),
            ],
            EclipseKind::Lunar => &[
                ("penumbral", Self::Penumbral),
                ("total", Self::Total),
                ("partial", Self::Partial),
            ],
        }
    }
}

// Suffix letters the catalogs append to the type code (central line
// position, saros phase, magnitude qualifiers).
const CODE_SUFFIXES: &str = "mns+-23bex";

fn code_token(token: &str, kind: EclipseKind) -> Option<EclipseSubtype> {
    let mut chars = token.chars();
    let first = chars.next()?;
    let rest = chars.as_str();

    if rest.len() > 2 || !rest.chars().all(|c| CODE_SUFFIXES.contains(c)) {
        return None;
    }

    EclipseSubtype::from_code(first, kind)
}

/// Find the subtype marker in a description
pub fn detect_subtype(description: &str, kind: EclipseKind) -> Option<EclipseSubtype> {
    for &code in EclipseSubtype::codes(kind) {
        if description.contains(&format!("   {code}   ")) {
            return EclipseSubtype::from_code(code, kind);
        }
    }

    // Bare type letters only mean something in a numbered catalog row
    if is_data_row(description) {
        if let Some(subtype) = description
            .split_whitespace()
            .find_map(|token| code_token(token, kind))
        {
            return Some(subtype);
        }
    }

    let lower = description.to_lowercase();
    EclipseSubtype::keywords(kind)
        .iter()
        .find(|(word, _)| lower.contains(word))
        .map(|(_, subtype)| *subtype)
}

/// Human-readable label, e.g. "Total Solar Eclipse"
///
/// Never empty: falls back to "Solar Eclipse" / "Lunar Eclipse".
pub fn classify(description: &str, kind: EclipseKind) -> String {
    match detect_subtype(description, kind) {
        Some(subtype) => format!("{} {} Eclipse", subtype.as_str(), kind.title()),
        None => format!("{} Eclipse", kind.title()),
    }
}
