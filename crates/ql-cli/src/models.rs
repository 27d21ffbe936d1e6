use std::sync::Arc;

use ql_api::SessionSnapshot;
use ql_core::EncounterTable;
use serde::{Deserialize, Serialize};

pub(crate) const PLAYER_STATE_SCHEMA: &str = "player-state.v1";

#[derive(Clone)]
pub(crate) struct LoadedQuest {
    pub(crate) path: String,
    pub(crate) quest_xml: String,
    pub(crate) encounters_path: Option<String>,
    pub(crate) encounters: Arc<dyn EncounterTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayerState {
    pub(crate) schema_version: String,
    pub(crate) quest_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) encounters_path: Option<String>,
    pub(crate) snapshot: SessionSnapshot,
}
