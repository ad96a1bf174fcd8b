//! JSON check requests as received from route handlers and the CLI.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::{InteractionError, InteractionResult};
use crate::models::{AllergyInfo, DrugInfo};

/// Body of a `check_interactions` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckRequest {
    pub new_drug: DrugInfo,
    #[serde(default)]
    pub current_medications: Vec<DrugInfo>,
    #[serde(default)]
    pub allergies: Vec<AllergyInfo>,
}

impl CheckRequest {
    /// Parse and shape-check a request body.
    pub fn from_json(raw: &str) -> InteractionResult<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            InteractionError::validation("INVALID_JSON", "Request body is not valid JSON", json!({ "error": e.to_string() }))
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> InteractionResult<Self> {
        if value.get("new_drug").map(Value::is_object) != Some(true) {
            return Err(InteractionError::validation(
                "INVALID_DRUG",
                "new_drug must be an object with id and name",
                json!({ "field": "new_drug" }),
            ));
        }

        match value.get("allergies") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let has_allergen = item
                        .get("allergen")
                        .and_then(Value::as_str)
                        .map(|s| !s.trim().is_empty())
                        .unwrap_or(false);
                    if !has_allergen {
                        return Err(InteractionError::validation(
                            "INVALID_ALLERGY",
                            "Each allergy must be an object with an allergen",
                            json!({ "index": index }),
                        ));
                    }
                }
            }
            Some(_) => {
                return Err(InteractionError::validation(
                    "INVALID_ALLERGIES",
                    "allergies must be an array",
                    json!({ "field": "allergies" }),
                ));
            }
        }

        serde_json::from_value(value).map_err(|e| {
            InteractionError::validation("INVALID_REQUEST", "Request does not match the expected shape", json!({ "error": e.to_string() }))
        })
    }
}
