use std::path::Path;

use ql_api::QuestSession;
use ql_core::{EventParameters, QuestError};

use crate::{
    create_session, emit_step, load_player_state, load_quest, resume_session,
    save_session_state, AgentCommand, StateFiles,
};

pub(super) fn run_agent(command: AgentCommand) -> Result<i32, QuestError> {
    match command {
        AgentCommand::Start {
            quest,
            encounters,
            state_out,
        } => run_start(&quest, encounters.as_deref(), &state_out),
        AgentCommand::Choose { state, choice } => {
            run_state_transition(&state, |session| session.choose(choice).map(|_| None))
        }
        AgentCommand::Event { state, event } => {
            run_state_transition(&state, |session| session.resolve_combat(&event).map(Some))
        }
    }
}

fn run_start(
    quest_path: &Path,
    encounters_path: Option<&Path>,
    state_out: &Path,
) -> Result<i32, QuestError> {
    let quest = load_quest(quest_path, encounters_path)?;
    let session = create_session(&quest)?;
    let step = session.current_step()?;

    save_session_state(state_out, &session, &quest)?;
    emit_step(&step, None, &state_out.to_string_lossy());
    Ok(0)
}

fn run_state_transition(
    files: &StateFiles,
    transition: impl FnOnce(&mut QuestSession) -> Result<Option<EventParameters>, QuestError>,
) -> Result<i32, QuestError> {
    let state = load_player_state(&files.state_in)?;
    let quest = load_quest(
        Path::new(&state.quest_path),
        state.encounters_path.as_deref().map(Path::new),
    )?;
    let mut session = resume_session(&quest, &state)?;

    let parameters = transition(&mut session)?;
    let step = session.current_step()?;

    save_session_state(&files.state_out, &session, &quest)?;
    emit_step(&step, parameters.as_ref(), &files.state_out.to_string_lossy());
    Ok(0)
}
