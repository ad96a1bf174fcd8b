//! Substructure fingerprints and Tanimoto similarity.

use std::collections::{BTreeSet, HashMap};

use super::{SourceResult, StructureSource};

/// Set of substructure keys describing a molecule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint(pub BTreeSet<String>);

impl Fingerprint {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys present in both fingerprints.
    pub fn shared<'a>(&'a self, other: &'a Fingerprint) -> impl Iterator<Item = &'a String> + 'a {
        self.0.intersection(&other.0)
    }
}

/// Tanimoto (Jaccard) coefficient: |A ∩ B| / |A ∪ B|. Two empty
/// fingerprints score 0.0.
pub fn tanimoto(a: &Fingerprint, b: &Fingerprint) -> f64 {
    let shared = a.0.intersection(&b.0).count();
    let union = a.0.union(&b.0).count();
    if union == 0 {
        return 0.0;
    }
    shared as f64 / union as f64
}

/// Built-in fingerprint table keyed by canonical substance name.
pub struct ReferenceStructures {
    name: String,
    fingerprints: HashMap<String, Fingerprint>,
}

impl Default for ReferenceStructures {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceStructures {
    pub fn new() -> Self {
        Self {
            name: "STRUCTURE_DB".into(),
            fingerprints: Self::default_fingerprints(),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fingerprints: HashMap::new(),
        }
    }

    pub fn insert(&mut self, substance: &str, fingerprint: Fingerprint) {
        self.fingerprints.insert(substance.to_lowercase(), fingerprint);
    }

    fn default_fingerprints() -> HashMap<String, Fingerprint> {
        const PENAM: &[&str] = &[
            "beta-lactam",
            "thiazolidine",
            "penam-core",
            "carboxylate",
            "amide-sidechain",
        ];
        const CEPHEM: &[&str] = &[
            "beta-lactam",
            "dihydrothiazine",
            "cephem-core",
            "carboxylate",
            "amide-sidechain",
        ];

        let with = |base: &[&str], extra: &[&str]| {
            Fingerprint::new(base.iter().chain(extra.iter()).copied())
        };

        let mut map = HashMap::new();

        map.insert("penicillin".into(), with(PENAM, &[]));
        map.insert("benzylpenicillin".into(), with(PENAM, &["benzyl"]));
        map.insert("phenoxymethylpenicillin".into(), with(PENAM, &["phenoxymethyl"]));
        map.insert("amoxicillin".into(), with(PENAM, &["para-hydroxyphenyl"]));
        map.insert("ampicillin".into(), with(PENAM, &["phenylglycine"]));
        map.insert("flucloxacillin".into(), with(PENAM, &["isoxazolyl", "halophenyl"]));
        map.insert("cefalexin".into(), with(CEPHEM, &["phenylglycine"]));
        map.insert("cefuroxime".into(), with(CEPHEM, &["furyl-oxime", "carbamate"]));
        map.insert("ceftriaxone".into(), with(CEPHEM, &["aminothiazole", "triazine"]));
        map.insert(
            "meropenem".into(),
            Fingerprint::new(["beta-lactam", "carbapenem-core", "carboxylate", "pyrrolidine"]),
        );

        map.insert(
            "sulfamethoxazole".into(),
            Fingerprint::new(["sulfonamide", "arylamine", "isoxazole"]),
        );
        map.insert(
            "sulfonamide".into(),
            Fingerprint::new(["sulfonamide", "arylamine"]),
        );
        map.insert(
            "aspirin".into(),
            Fingerprint::new(["benzoic-acid", "acetyl-ester", "salicylate"]),
        );
        map.insert(
            "ibuprofen".into(),
            Fingerprint::new(["propionic-acid", "isobutylphenyl"]),
        );
        map.insert(
            "warfarin".into(),
            Fingerprint::new(["coumarin", "hydroxy", "phenylbutanone"]),
        );

        map
    }
}

impl StructureSource for ReferenceStructures {
    fn name(&self) -> &str {
        &self.name
    }

    fn fingerprint(&self, substance: &str) -> SourceResult<Option<Fingerprint>> {
        Ok(self.fingerprints.get(substance).cloned())
    }
}
