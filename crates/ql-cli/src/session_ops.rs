use std::path::Path;

use ql_api::{CreateSessionOptions, QuestSession, ResumeSessionOptions};
use ql_core::QuestError;

use crate::{save_player_state, LoadedQuest, PlayerState, PLAYER_STATE_SCHEMA};

pub(crate) fn create_session(quest: &LoadedQuest) -> Result<QuestSession, QuestError> {
    QuestSession::new(CreateSessionOptions {
        quest_xml: quest.quest_xml.clone(),
        encounters: Some(quest.encounters.clone()),
        initial_context: None,
    })
}

pub(crate) fn resume_session(
    quest: &LoadedQuest,
    state: &PlayerState,
) -> Result<QuestSession, QuestError> {
    QuestSession::resume(ResumeSessionOptions {
        quest_xml: quest.quest_xml.clone(),
        encounters: Some(quest.encounters.clone()),
        snapshot: state.snapshot.clone(),
    })
}

pub(crate) fn save_session_state(
    path: &Path,
    session: &QuestSession,
    quest: &LoadedQuest,
) -> Result<(), QuestError> {
    let state = PlayerState {
        schema_version: PLAYER_STATE_SCHEMA.to_string(),
        quest_path: quest.path.clone(),
        encounters_path: quest.encounters_path.clone(),
        snapshot: session.snapshot(),
    };
    save_player_state(path, &state)
}
