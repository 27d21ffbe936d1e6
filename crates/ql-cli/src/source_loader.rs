use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use ql_core::{EncounterTable, QuestError, StaticEncounterTable};

use crate::{io_error, LoadedQuest};

/// Reads a quest file and, when given, a custom encounter table. Paths are
/// canonicalised so a state file keeps working from another directory.
pub(crate) fn load_quest(
    quest_path: &Path,
    encounters_path: Option<&Path>,
) -> Result<LoadedQuest, QuestError> {
    let path = resolve_source_file(quest_path, "CLI_QUEST_NOT_FOUND")?;
    let quest_xml = fs::read_to_string(&path).map_err(io_error("CLI_QUEST_READ", &path))?;

    let (encounters_path, encounters): (Option<String>, Arc<dyn EncounterTable>) =
        match encounters_path {
            Some(raw) => {
                let resolved = resolve_source_file(raw, "CLI_ENCOUNTERS_NOT_FOUND")?;
                let json = fs::read_to_string(&resolved)
                    .map_err(io_error("CLI_ENCOUNTERS_READ", &resolved))?;
                let table = StaticEncounterTable::from_json(&json)?;
                debug!("loaded {} encounters from {}", table.len(), resolved.display());
                (
                    Some(resolved.to_string_lossy().to_string()),
                    Arc::new(table),
                )
            }
            None => (None, Arc::new(StaticEncounterTable::bundled())),
        };

    Ok(LoadedQuest {
        path: path.to_string_lossy().to_string(),
        quest_xml,
        encounters_path,
        encounters,
    })
}

pub(crate) fn resolve_source_file(path: &Path, missing_code: &str) -> Result<PathBuf, QuestError> {
    if !path.exists() {
        return Err(QuestError::new(
            missing_code,
            format!("File does not exist: {}", path.display()),
        ));
    }
    if !path.is_file() {
        return Err(QuestError::new(
            "CLI_SOURCE_NOT_FILE",
            format!("Path is not a file: {}", path.display()),
        ));
    }
    fs::canonicalize(path).map_err(io_error("CLI_SOURCE_PATH", path))
}
