use im::OrdMap;
use serde::{Deserialize, Serialize};

use crate::value::QlValue;

/// Quest state variables for one step.
///
/// Backed by a persistent map: `with` returns a new context sharing structure
/// with the old one, which stays untouched. Clones are cheap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestContext {
    vars: OrdMap<String, QlValue>,
}

impl QuestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&QlValue> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    #[must_use]
    pub fn with(&self, name: impl Into<String>, value: impl Into<QlValue>) -> Self {
        Self {
            vars: self.vars.update(name.into(), value.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QlValue)> {
        self.vars.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for QuestContext
where
    K: Into<String>,
    V: Into<QlValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
