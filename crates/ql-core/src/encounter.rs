use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::QuestError;

const BUNDLED_ENCOUNTERS_JSON: &str = include_str!("../data/encounters.json");

/// Canonical combat stats for a known enemy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub name: String,
    pub tier: u32,
    #[serde(default)]
    pub class: Option<String>,
}

/// Read-only lookup from lowercase enemy name to its encounter entry.
pub trait EncounterTable: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Encounter>;
}

#[derive(Debug, Default)]
pub struct EmptyEncounterTable;

impl EncounterTable for EmptyEncounterTable {
    fn lookup(&self, _name: &str) -> Option<Encounter> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticEncounterTable {
    entries: BTreeMap<String, Encounter>,
}

impl StaticEncounterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The small table shipped with the crate.
    pub fn bundled() -> Self {
        Self::from_json(BUNDLED_ENCOUNTERS_JSON).unwrap_or_default()
    }

    pub fn from_json(source: &str) -> Result<Self, QuestError> {
        let raw: BTreeMap<String, Encounter> = serde_json::from_str(source)
            .map_err(|error| QuestError::new("ENCOUNTER_TABLE_INVALID", error.to_string()))?;
        let mut table = Self::new();
        for (key, encounter) in raw {
            table.insert(&key, encounter);
        }
        Ok(table)
    }

    pub fn insert(&mut self, name: &str, encounter: Encounter) {
        self.entries.insert(name.trim().to_lowercase(), encounter);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EncounterTable for StaticEncounterTable {
    fn lookup(&self, name: &str) -> Option<Encounter> {
        self.entries.get(name).cloned()
    }
}
