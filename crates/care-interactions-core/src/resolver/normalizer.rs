//! Drug and allergen name normalizer.
//!
//! Handles:
//! - Brand expansion (Marevan→warfarin, Nurofen→ibuprofen)
//! - Allergen canonicalization (penicillins→penicillin, NSAIDs→nsaid)
//! - Route canonicalization (orally→PO, subcutaneously→SC)

use std::collections::HashMap;

use crate::models::DrugInfo;

/// A drug reduced to canonical lowercase names for lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDrug {
    pub id: String,
    /// Canonical generic name
    pub name: String,
    /// Canonical names of active ingredients (includes `name` when none given)
    pub ingredients: Vec<String>,
    /// Lowercased drug class
    pub class: Option<String>,
    /// Canonical route
    pub route: Option<String>,
    /// BNF code, digits only
    pub bnf_code: Option<String>,
}

impl NormalizedDrug {
    /// Whether this drug is, or contains, the given canonical name.
    pub fn contains(&self, canonical: &str) -> bool {
        self.name == canonical || self.ingredients.iter().any(|i| i == canonical)
    }
}

/// Normalizer for drug and allergen names.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Alias map: brand / variant spelling → canonical generic name
    aliases: HashMap<String, String>,
    /// Allergen map: recorded allergen wording → canonical allergen
    allergens: HashMap<String, String>,
    /// Route canonicalization: written → standard abbreviation
    route_map: HashMap<String, String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a new normalizer with default mappings.
    pub fn new() -> Self {
        Self {
            aliases: Self::default_aliases(),
            allergens: Self::default_allergens(),
            route_map: Self::default_routes(),
        }
    }

    /// Normalize a drug for lookup.
    pub fn normalize_drug(&self, drug: &DrugInfo) -> NormalizedDrug {
        let name = self.expand_alias(&drug.name);

        let mut ingredients: Vec<String> = drug
            .active_ingredients
            .iter()
            .map(|i| self.expand_alias(i))
            .collect();
        if ingredients.is_empty() {
            ingredients.push(name.clone());
        }

        NormalizedDrug {
            id: drug.id.clone(),
            name,
            ingredients,
            class: drug.class.as_ref().map(|c| self.canonical_allergen(c)),
            route: drug.route.as_ref().map(|r| self.canonicalize_route(r)),
            bnf_code: drug
                .bnf_code
                .as_ref()
                .map(|c| c.chars().filter(char::is_ascii_digit).collect::<String>())
                .filter(|c| !c.is_empty()),
        }
    }

    /// Expand a drug alias to its canonical name.
    ///
    /// Strength and form words after the name are dropped
    /// ("Warfarin 5mg tablets" → "warfarin").
    pub fn expand_alias(&self, name: &str) -> String {
        let lower = name.trim().to_lowercase();
        if let Some(canonical) = self.aliases.get(&lower) {
            return canonical.clone();
        }

        let head = strip_strength(&lower);
        self.aliases.get(&head).cloned().unwrap_or(head)
    }

    /// Canonicalize a recorded allergen (or drug class) string.
    pub fn canonical_allergen(&self, allergen: &str) -> String {
        let lower = allergen.trim().to_lowercase();
        if let Some(canonical) = self.allergens.get(&lower) {
            return canonical.clone();
        }

        let singular = lower
            .strip_suffix('s')
            .filter(|s| s.len() > 3)
            .map(str::to_string)
            .unwrap_or_else(|| lower.clone());
        if let Some(canonical) = self.allergens.get(&singular) {
            return canonical.clone();
        }

        // A drug name recorded as an allergen ("Amoxil") is its generic name
        self.aliases.get(&lower).cloned().unwrap_or(singular)
    }

    /// Canonicalize a route of administration.
    pub fn canonicalize_route(&self, route: &str) -> String {
        let lower = route.to_lowercase();
        self.route_map
            .get(&lower)
            .cloned()
            .unwrap_or_else(|| route.to_uppercase())
    }

    /// Add a custom alias mapping.
    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(alias.to_lowercase(), canonical.to_lowercase());
    }

    /// Add a custom allergen mapping.
    pub fn add_allergen(&mut self, recorded: &str, canonical: &str) {
        self.allergens
            .insert(recorded.to_lowercase(), canonical.to_lowercase());
    }

    /// Add a custom route mapping.
    pub fn add_route(&mut self, written: &str, canonical: &str) {
        self.route_map
            .insert(written.to_lowercase(), canonical.to_uppercase());
    }

    /// Default brand → generic mappings (UK market names).
    fn default_aliases() -> HashMap<String, String> {
        let mut map = HashMap::new();

        // Anticoagulants / antiplatelets
        map.insert("marevan".into(), "warfarin".into());
        map.insert("coumadin".into(), "warfarin".into());
        map.insert("warfarin sodium".into(), "warfarin".into());
        map.insert("disprin".into(), "aspirin".into());
        map.insert("nu-seals".into(), "aspirin".into());
        map.insert("acetylsalicylic acid".into(), "aspirin".into());
        map.insert("plavix".into(), "clopidogrel".into());
        map.insert("xarelto".into(), "rivaroxaban".into());
        map.insert("eliquis".into(), "apixaban".into());

        // Analgesics / NSAIDs
        map.insert("nurofen".into(), "ibuprofen".into());
        map.insert("brufen".into(), "ibuprofen".into());
        map.insert("voltarol".into(), "diclofenac".into());
        map.insert("naprosyn".into(), "naproxen".into());
        map.insert("calpol".into(), "paracetamol".into());
        map.insert("panadol".into(), "paracetamol".into());
        map.insert("acetaminophen".into(), "paracetamol".into());
        map.insert("zapain".into(), "co-codamol".into());
        map.insert("tramal".into(), "tramadol".into());
        map.insert("zydol".into(), "tramadol".into());
        map.insert("oramorph".into(), "morphine".into());

        // Antibiotics
        map.insert("amoxil".into(), "amoxicillin".into());
        map.insert("amoxycillin".into(), "amoxicillin".into());
        map.insert("augmentin".into(), "co-amoxiclav".into());
        map.insert("penicillin v".into(), "phenoxymethylpenicillin".into());
        map.insert("pen v".into(), "phenoxymethylpenicillin".into());
        map.insert("floxapen".into(), "flucloxacillin".into());
        map.insert("keflex".into(), "cefalexin".into());
        map.insert("cephalexin".into(), "cefalexin".into());
        map.insert("klaricid".into(), "clarithromycin".into());
        map.insert("erythrocin".into(), "erythromycin".into());
        map.insert("ciproxin".into(), "ciprofloxacin".into());
        map.insert("macrobid".into(), "nitrofurantoin".into());
        map.insert("septrin".into(), "co-trimoxazole".into());

        // Cardiovascular
        map.insert("zocor".into(), "simvastatin".into());
        map.insert("lipitor".into(), "atorvastatin".into());
        map.insert("lanoxin".into(), "digoxin".into());
        map.insert("cordarone".into(), "amiodarone".into());
        map.insert("zestril".into(), "lisinopril".into());
        map.insert("tritace".into(), "ramipril".into());
        map.insert("aldactone".into(), "spironolactone".into());
        map.insert("lasix".into(), "furosemide".into());
        map.insert("frusemide".into(), "furosemide".into());

        // CNS
        map.insert("priadel".into(), "lithium".into());
        map.insert("camcolit".into(), "lithium".into());
        map.insert("lithium carbonate".into(), "lithium".into());
        map.insert("prozac".into(), "fluoxetine".into());
        map.insert("lustral".into(), "sertraline".into());
        map.insert("cipramil".into(), "citalopram".into());
        map.insert("tegretol".into(), "carbamazepine".into());
        map.insert("epilim".into(), "sodium valproate".into());
        map.insert("valproate".into(), "sodium valproate".into());
        map.insert("ritalin".into(), "methylphenidate".into());
        map.insert("concerta".into(), "methylphenidate".into());
        map.insert("melatonin".into(), "melatonin".into());
        map.insert("circadin".into(), "melatonin".into());
        map.insert("diazemuls".into(), "diazepam".into());

        // Endocrine
        map.insert("glucophage".into(), "metformin".into());
        map.insert("eltroxin".into(), "levothyroxine".into());
        map.insert("thyroxine".into(), "levothyroxine".into());

        map
    }

    /// Default allergen wording → canonical allergen.
    fn default_allergens() -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("penicillin".into(), "penicillin".into());
        map.insert("penicillins".into(), "penicillin".into());
        map.insert("beta-lactam".into(), "beta-lactam".into());
        map.insert("beta lactam".into(), "beta-lactam".into());
        map.insert("beta-lactams".into(), "beta-lactam".into());
        map.insert("cephalosporin".into(), "cephalosporin".into());
        map.insert("cephalosporins".into(), "cephalosporin".into());
        map.insert("sulfa".into(), "sulfonamide".into());
        map.insert("sulpha".into(), "sulfonamide".into());
        map.insert("sulphonamide".into(), "sulfonamide".into());
        map.insert("sulfonamides".into(), "sulfonamide".into());
        map.insert("nsaid".into(), "nsaid".into());
        map.insert("nsaids".into(), "nsaid".into());
        map.insert("non-steroidal anti-inflammatory".into(), "nsaid".into());
        map.insert("salicylate".into(), "salicylate".into());
        map.insert("salicylates".into(), "salicylate".into());
        map.insert("opiate".into(), "opioid".into());
        map.insert("opiates".into(), "opioid".into());
        map.insert("opioids".into(), "opioid".into());
        map.insert("macrolides".into(), "macrolide".into());
        map.insert("quinolones".into(), "fluoroquinolone".into());
        map.insert("fluoroquinolones".into(), "fluoroquinolone".into());
        map.insert("egg".into(), "egg".into());
        map.insert("eggs".into(), "egg".into());
        map.insert("peanut".into(), "peanut".into());
        map.insert("peanuts".into(), "peanut".into());
        map.insert("arachis oil".into(), "peanut".into());
        map.insert("latex".into(), "latex".into());

        map
    }

    /// Default route mappings.
    fn default_routes() -> HashMap<String, String> {
        let mut map = HashMap::new();

        // Oral
        map.insert("oral".into(), "PO".into());
        map.insert("orally".into(), "PO".into());
        map.insert("by mouth".into(), "PO".into());
        map.insert("po".into(), "PO".into());

        // Parenteral
        map.insert("intravenous".into(), "IV".into());
        map.insert("intravenously".into(), "IV".into());
        map.insert("iv".into(), "IV".into());
        map.insert("intramuscular".into(), "IM".into());
        map.insert("intramuscularly".into(), "IM".into());
        map.insert("im".into(), "IM".into());
        map.insert("subcutaneous".into(), "SC".into());
        map.insert("subcutaneously".into(), "SC".into());
        map.insert("subcut".into(), "SC".into());
        map.insert("sc".into(), "SC".into());

        // Other
        map.insert("topical".into(), "TOP".into());
        map.insert("topically".into(), "TOP".into());
        map.insert("inhaled".into(), "INH".into());
        map.insert("inhalation".into(), "INH".into());
        map.insert("rectal".into(), "PR".into());
        map.insert("rectally".into(), "PR".into());
        map.insert("buccal".into(), "BUCCAL".into());
        map.insert("sublingual".into(), "SL".into());
        map.insert("transdermal".into(), "TD".into());
        map.insert("patch".into(), "TD".into());

        map
    }
}

/// Drop strength / form tokens: "warfarin 5mg tablets" → "warfarin".
fn strip_strength(name: &str) -> String {
    let words: Vec<&str> = name
        .split_whitespace()
        .take_while(|w| !w.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
        .filter(|w| !FORM_WORDS.contains(w))
        .collect();

    if words.is_empty() {
        name.to_string()
    } else {
        words.join(" ")
    }
}

const FORM_WORDS: &[&str] = &[
    "tablet", "tablets", "capsule", "capsules", "oral", "solution", "suspension",
    "liquid", "syrup", "injection", "cream", "e/c", "m/r", "ec", "mr", "dispersible",
];
