use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ql_core::QuestError;

use crate::{io_error, state_json_error, PlayerState, PLAYER_STATE_SCHEMA};

/// Writes the state next to `path` first and renames it into place, so the
/// previous state survives a failed write.
pub(crate) fn save_player_state(path: &Path, state: &PlayerState) -> Result<(), QuestError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error("CLI_STATE_WRITE", parent))?;
    }

    let payload = serde_json::to_vec_pretty(state).map_err(state_json_error(path))?;
    let staged = staging_path(path);
    fs::write(&staged, payload).map_err(io_error("CLI_STATE_WRITE", &staged))?;
    fs::rename(&staged, path).map_err(io_error("CLI_STATE_WRITE", path))
}

pub(crate) fn load_player_state(path: &Path) -> Result<PlayerState, QuestError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(QuestError::new(
                "CLI_STATE_NOT_FOUND",
                format!("State file does not exist: {}", path.display()),
            ))
        }
        Err(error) => return Err(io_error("CLI_STATE_READ", path)(error)),
    };

    let state: PlayerState = serde_json::from_str(&raw).map_err(state_json_error(path))?;
    if state.schema_version == PLAYER_STATE_SCHEMA {
        return Ok(state);
    }
    Err(QuestError::new(
        "CLI_STATE_SCHEMA",
        format!(
            "{} uses player state schema \"{}\", expected \"{}\".",
            path.display(),
            state.schema_version,
            PLAYER_STATE_SCHEMA
        ),
    ))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staged = OsString::from(path.as_os_str());
    staged.push(".partial");
    PathBuf::from(staged)
}
