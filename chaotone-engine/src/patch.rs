//! JSON patches: the initial parameter set a session starts from.
//!
//! ```json
//! { "master_gain": 0.8,
//!   "formulas": { "fm": { "enabled": true, "params": { "fc": 220.0 } } },
//!   "effects":  { "reverb": { "enabled": true, "params": { "decay": 2.5 } } } }
//! ```
//!
//! Every field is optional. Names are kept as strings here; resolving them
//! (and skipping the unknown ones) happens when a session is built from the patch.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patch {
    pub master_gain: f32,
    pub formulas: BTreeMap<String, Slot>,
    pub effects: BTreeMap<String, Slot>,
}

impl Default for Patch {
    fn default() -> Self {
        Self { master_gain: 0.8, formulas: BTreeMap::new(), effects: BTreeMap::new() }
    }
}

/// One formula or effect stage: on/off plus parameter overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Slot {
    pub enabled: bool,
    pub params: BTreeMap<String, f32>,
}

impl Slot {
    pub fn on() -> Self {
        Self { enabled: true, params: BTreeMap::new() }
    }

    pub fn with(mut self, key: &str, value: f32) -> Self {
        self.params.insert(key.to_owned(), value);
        self
    }
}

impl Patch {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let patch = Self::from_json(&text)?;
        log::info!(
            "loaded patch {} ({} formulas, {} effects)",
            path.as_ref().display(),
            patch.formulas.len(),
            patch.effects.len()
        );
        Ok(patch)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Builder helper: turn a formula on with parameter overrides.
    pub fn with_formula(mut self, id: &str, slot: Slot) -> Self {
        self.formulas.insert(id.to_owned(), slot);
        self
    }

    pub fn with_effect(mut self, id: &str, slot: Slot) -> Self {
        self.effects.insert(id.to_owned(), slot);
        self
    }
}
