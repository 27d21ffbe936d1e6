use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Plays a quest one step per invocation, carrying progress between runs in a
/// JSON state file.
#[derive(Debug, Parser)]
#[command(name = "questlang", version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Line-oriented commands meant to be driven by another program.
    #[command(subcommand)]
    Agent(AgentCommand),
}

#[derive(Debug, Subcommand)]
pub(crate) enum AgentCommand {
    /// Open a quest and stop at its first card.
    Start {
        /// Quest XML file.
        #[arg(long)]
        quest: PathBuf,
        /// Encounter table JSON used instead of the bundled one.
        #[arg(long)]
        encounters: Option<PathBuf>,
        #[arg(long)]
        state_out: PathBuf,
    },
    /// Take one of the numbered choices on the current roleplay card.
    Choose {
        #[command(flatten)]
        state: StateFiles,
        #[arg(long)]
        choice: usize,
    },
    /// Resolve the current combat card with an outcome such as `win` or `lose`.
    Event {
        #[command(flatten)]
        state: StateFiles,
        #[arg(long)]
        event: String,
    },
}

/// Where a resumed command reads progress from and where it writes the result.
/// The two may name the same file.
#[derive(Debug, Args)]
pub(crate) struct StateFiles {
    #[arg(long)]
    pub(crate) state_in: PathBuf,
    #[arg(long)]
    pub(crate) state_out: PathBuf,
}
