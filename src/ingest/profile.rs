use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::models::Workflow;

/// Workflow-family specific dataset metadata
///
/// A profile matches workflows by name prefix and contributes a JSON merge
/// patch that is applied to the generic dataset properties.
pub struct DatasetProfile {
    pub name: &'static str,
    pub prefix: &'static str,
    patch: fn(&Workflow) -> Option<Value>,
}

impl DatasetProfile {
    pub fn matches(&self, workflow: &Workflow) -> bool {
        workflow.name().starts_with(self.prefix)
    }

    pub fn patch(&self, workflow: &Workflow) -> Option<Value> {
        (self.patch)(workflow)
    }
}

static PROFILES: &[DatasetProfile] = &[DatasetProfile {
    name: "ModGP",
    prefix: "modgp-",
    patch: modgp_patch,
}];

pub fn builtin_profiles() -> &'static [DatasetProfile] {
    PROFILES
}

fn modgp_patch(workflow: &Workflow) -> Option<Value> {
    let species = match workflow.parameter_value("species")? {
        Value::String(species) => species,
        other => other.to_string(),
    };
    Some(json!({
        "name": format!("Species distribution models for {}", species),
        "description": format!("Species distribution model calculated with ModGP for {}", species),
        "keywords": ["GBIF", "Occurrence", "Biodiversity", "Observation", "ModGP", "SDM"],
        "license": "https://spdx.org/licenses/CC-BY-SA-2.0",
    }))
}

/// Applies every matching profile to the dataset properties
pub fn apply_profiles(workflow: &Workflow, mut properties: Value) -> Value {
    for profile in builtin_profiles().iter().filter(|p| p.matches(workflow)) {
        match profile.patch(workflow) {
            Some(patch) => {
                info!("This is a {} workflow. Applying profile values", profile.name);
                json_merge_patch(&mut properties, &patch);
            }
            None => warn!(
                "Workflow {} looks like {} but lacks the parameters its profile needs",
                workflow.name(),
                profile.name
            ),
        }
    }
    properties
}

/// RFC 7386 JSON merge patch
///
/// Objects merge recursively, `null` removes a key, anything else replaces.
pub fn json_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                json_merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
