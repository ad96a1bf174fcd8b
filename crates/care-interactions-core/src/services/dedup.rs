//! Merging of findings reported by more than one source.
//!
//! Findings are grouped by a composite key. On collision the entry with the
//! higher [`Severity`] (by the enum's ordering) is kept and the other entry's
//! sources, evidence and recommendations are folded into it.

use std::collections::HashMap;

use crate::models::{composite_key, CrossReactivity, DoseAlert, DrugInteraction, FoodInteraction, Severity};

/// A finding that can be merged with duplicates of itself.
pub trait Deduplicate {
    fn dedup_key(&self) -> String;

    fn severity(&self) -> Severity;

    /// Fold a lower-or-equal severity duplicate into `self`.
    fn absorb(&mut self, other: Self);
}

/// Merge duplicates, keeping first-seen order of keys.
pub fn deduplicate_items<T: Deduplicate>(items: Vec<T>) -> Vec<T> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::with_capacity(items.len());

    for item in items {
        let key = item.dedup_key();
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut out[i];
                if item.severity() > existing.severity() {
                    let lower = std::mem::replace(existing, item);
                    existing.absorb(lower);
                } else {
                    existing.absorb(item);
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(item);
            }
        }
    }
    out
}

/// Stable sort, most severe first.
pub fn sort_by_severity<T: Deduplicate>(items: &mut [T]) {
    items.sort_by(|a, b| b.severity().cmp(&a.severity()));
}

fn union_into(target: &mut Vec<String>, other: Vec<String>) {
    for value in other {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

fn union_sorted(target: &mut Vec<String>, other: Vec<String>) {
    union_into(target, other);
    target.sort();
}

impl Deduplicate for DrugInteraction {
    fn dedup_key(&self) -> String {
        composite_key([
            self.drug_key().as_str(),
            self.kind.as_str(),
            self.qualifier.as_deref().unwrap_or_default(),
        ])
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn absorb(&mut self, other: Self) {
        union_sorted(&mut self.sources, other.sources);
        union_into(&mut self.evidence, other.evidence);
        union_into(&mut self.recommendations, other.recommendations);
    }
}

impl Deduplicate for FoodInteraction {
    fn dedup_key(&self) -> String {
        composite_key([self.drug_id.as_str(), self.food.to_lowercase().as_str()])
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn absorb(&mut self, other: Self) {
        union_sorted(&mut self.sources, other.sources);
    }
}

impl Deduplicate for DoseAlert {
    fn dedup_key(&self) -> String {
        composite_key([self.drug_id.as_str(), self.alert.to_lowercase().as_str()])
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn absorb(&mut self, other: Self) {
        union_sorted(&mut self.sources, other.sources);
        if self.max_daily_dose.is_none() {
            self.max_daily_dose = other.max_daily_dose;
        }
    }
}

impl Deduplicate for CrossReactivity {
    fn dedup_key(&self) -> String {
        composite_key([format!("{:?}", self.kind).as_str(), self.source.as_str()])
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn absorb(&mut self, other: Self) {
        union_into(&mut self.evidence, other.evidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InteractionType;
    use proptest::prelude::*;

    fn finding(a: &str, b: &str, severity: Severity, source: &str) -> DrugInteraction {
        DrugInteraction::new(InteractionType::DrugDrug, severity, format!("{} desc", source), vec![a.into(), b.into()])
            .with_source(source)
            .with_evidence(format!("{} evidence", source))
    }

    #[test]
    fn test_higher_severity_wins() {
        let merged = deduplicate_items(vec![
            finding("d1", "d2", Severity::Medium, "NICE"),
            finding("d2", "d1", Severity::High, "BNF"),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].severity, Severity::High);
        assert_eq!(merged[0].description, "BNF desc");
        assert_eq!(merged[0].sources, vec!["BNF".to_string(), "NICE".to_string()]);
        assert_eq!(merged[0].evidence.len(), 2);
    }

    #[test]
    fn test_ordering_not_lexical() {
        // "LOW" > "HIGH" lexically; the enum ordering must decide
        let merged = deduplicate_items(vec![
            finding("d1", "d2", Severity::High, "BNF"),
            finding("d1", "d2", Severity::Low, "NICE"),
        ]);
        assert_eq!(merged[0].severity, Severity::High);
    }

    #[test]
    fn test_distinct_types_not_merged() {
        let mut contra = finding("d1", "d2", Severity::Low, "BNF");
        contra.kind = InteractionType::Contraindication;
        let merged = deduplicate_items(vec![finding("d1", "d2", Severity::Low, "BNF"), contra]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_qualifier_separates_allergies() {
        let a = DrugInteraction::new(InteractionType::Allergy, Severity::High, "x", vec!["d1".into()])
            .with_qualifier("a1");
        let b = DrugInteraction::new(InteractionType::Allergy, Severity::High, "y", vec!["d1".into()])
            .with_qualifier("a2");
        assert_eq!(deduplicate_items(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_sort_by_severity() {
        let mut items = vec![
            finding("d1", "d2", Severity::Low, "A"),
            finding("d1", "d3", Severity::Critical, "B"),
            finding("d1", "d4", Severity::Medium, "C"),
        ];
        sort_by_severity(&mut items);
        let order: Vec<Severity> = items.iter().map(|i| i.severity).collect();
        assert_eq!(order, vec![Severity::Critical, Severity::Medium, Severity::Low]);
    }

    fn severity_strategy() -> impl Strategy<Value = Severity> {
        prop::sample::select(Severity::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_dedup_key_order_independent(a in "[a-z0-9]{1,8}", b in "[a-z0-9]{1,8}") {
            let ab = finding(&a, &b, Severity::Low, "BNF");
            let ba = finding(&b, &a, Severity::Low, "BNF");
            prop_assert_eq!(ab.dedup_key(), ba.dedup_key());
        }

        #[test]
        fn prop_merge_order_independent(
            entries in prop::collection::vec(
                (0usize..3, severity_strategy(), prop::sample::select(vec!["BNF", "NICE", "DRUGBANK"])),
                1..12,
            )
        ) {
            let items: Vec<DrugInteraction> = entries
                .iter()
                .map(|(pair, severity, source)| finding("d0", &format!("d{}", pair + 1), *severity, source))
                .collect();
            let mut reversed = items.clone();
            reversed.reverse();

            let summarize = |merged: Vec<DrugInteraction>| {
                let mut out: Vec<(String, Severity, Vec<String>)> = merged
                    .into_iter()
                    .map(|i| (i.dedup_key(), i.severity, i.sources))
                    .collect();
                out.sort_by(|a, b| a.0.cmp(&b.0));
                out
            };

            prop_assert_eq!(summarize(deduplicate_items(items)), summarize(deduplicate_items(reversed)));
        }

        #[test]
        fn prop_merged_severity_is_max(severities in prop::collection::vec(severity_strategy(), 1..10)) {
            let items: Vec<DrugInteraction> = severities
                .iter()
                .map(|s| finding("d1", "d2", *s, "BNF"))
                .collect();
            let merged = deduplicate_items(items);
            prop_assert_eq!(merged.len(), 1);
            prop_assert_eq!(Some(merged[0].severity), Severity::worst(severities.iter().copied()));
        }
    }
}
