use std::ffi::OsString;

use clap::Parser;
use ql_core::QuestError;

mod agent;
mod cli_args;
mod error_map;
mod models;
mod session_ops;
mod source_loader;
mod state_store;
mod step_output;

pub(crate) use cli_args::{AgentCommand, Cli, Mode, StateFiles};
pub(crate) use error_map::{emit_error, io_error, state_json_error};
pub(crate) use models::{LoadedQuest, PlayerState, PLAYER_STATE_SCHEMA};
pub(crate) use session_ops::{create_session, resume_session, save_session_state};
pub(crate) use source_loader::load_quest;
#[cfg(test)]
pub(crate) use source_loader::resolve_source_file;
pub(crate) use state_store::{load_player_state, save_player_state};
pub(crate) use step_output::emit_step;
#[cfg(test)]
pub(crate) use step_output::render_step_lines;

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, QuestError> {
    match cli.command {
        Mode::Agent(command) => agent::run_agent(command),
    }
}
