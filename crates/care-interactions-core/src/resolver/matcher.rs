//! Fuzzy matching of recorded allergens against drug names.
//!
//! Care records are free text, so "amoxycilin" must still match
//! amoxicillin. Scores combine Jaro-Winkler and normalized Levenshtein.

use strsim::{jaro_winkler, normalized_levenshtein};

use super::normalizer::NormalizedDrug;

/// Minimum fuzzy score to treat an allergen as naming the drug.
pub const MIN_NAME_MATCH: f64 = 0.90;

/// How an allergen matched a drug.
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatch {
    /// The drug name or ingredient that matched
    pub matched: String,
    /// 1.0 for exact, otherwise the fuzzy score
    pub score: f64,
}

/// Compute fuzzy string similarity using combined metrics.
pub fn fuzzy_match(a: &str, b: &str) -> f64 {
    let jw = jaro_winkler(a, b);
    let lev = normalized_levenshtein(a, b);

    // Jaro-Winkler weighted higher for prefix agreement
    jw * 0.6 + lev * 0.4
}

/// Match a canonical allergen against a drug's name and ingredients.
pub fn match_allergen(allergen: &str, drug: &NormalizedDrug) -> Option<NameMatch> {
    let candidates = std::iter::once(&drug.name).chain(drug.ingredients.iter());

    let mut best: Option<NameMatch> = None;
    for candidate in candidates {
        if candidate == allergen {
            return Some(NameMatch {
                matched: candidate.clone(),
                score: 1.0,
            });
        }

        let score = fuzzy_match(allergen, candidate);
        if score >= MIN_NAME_MATCH && best.as_ref().map(|b| score > b.score).unwrap_or(true) {
            best = Some(NameMatch {
                matched: candidate.clone(),
                score,
            });
        }
    }
    best
}
