//! Severity and confidence scales shared by every finding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Clinical severity of a finding.
///
/// Variant order is the ranking: `Low < Medium < High < Critical`. All
/// conflict resolution goes through `Ord`, never through the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Parse from a source's string form (case-insensitive).
    ///
    /// Accepts the BNF-style labels some sources emit in addition to the
    /// canonical names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" | "mild" => Some(Severity::Low),
            "medium" | "moderate" => Some(Severity::Medium),
            "high" | "major" | "severe" => Some(Severity::High),
            "critical" | "contraindicated" | "life-threatening" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Map a continuous similarity / probability score onto a severity.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Severity::Critical
        } else if score >= 0.8 {
            Severity::High
        } else if score >= 0.7 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Worst severity in an iterator, `None` when empty.
    pub fn worst<I: IntoIterator<Item = Severity>>(iter: I) -> Option<Severity> {
        iter.into_iter().max()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence attached to a cross-reactivity finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Confidence::High
        } else if score >= 0.75 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_ordering_is_not_lexical() {
        // "HIGH" < "LOW" lexically, but not clinically
        assert!("HIGH" < "LOW");
        assert!(Severity::High > Severity::Low);
        assert!(Severity::Critical > Severity::Medium);
    }

    #[test]
    fn test_worst() {
        let worst = Severity::worst([Severity::Low, Severity::Critical, Severity::Medium]);
        assert_eq!(worst, Some(Severity::Critical));
        assert_eq!(Severity::worst(Vec::new()), None);
    }

    #[test]
    fn test_score_breakpoints() {
        assert_eq!(Severity::from_score(0.95), Severity::Critical);
        assert_eq!(Severity::from_score(0.9), Severity::Critical);
        assert_eq!(Severity::from_score(0.85), Severity::High);
        assert_eq!(Severity::from_score(0.75), Severity::Medium);
        assert_eq!(Severity::from_score(0.5), Severity::Low);

        assert_eq!(Confidence::from_score(0.92), Confidence::High);
        assert_eq!(Confidence::from_score(0.8), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.6), Confidence::Low);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse("moderate"), Some(Severity::Medium));
        assert_eq!(Severity::parse("Contraindicated"), Some(Severity::Critical));
        assert_eq!(Severity::parse("unknown"), None);
    }

    #[test]
    fn test_serde_form() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        let back: Severity = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(back, Severity::Medium);
    }
}
