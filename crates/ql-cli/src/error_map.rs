use std::path::Path;

use log::debug;
use ql_core::QuestError;

/// Lines printed for a failed command. Document errors also report where the
/// offending node starts.
pub(crate) fn render_error_lines(error: &QuestError) -> Vec<String> {
    let mut lines = vec![
        "RESULT:ERROR".to_string(),
        format!("ERROR_CODE:{}", error.code),
        format!(
            "ERROR_MSG_JSON:{}",
            serde_json::to_string(&error.message).expect("string json")
        ),
    ];
    if let Some(span) = &error.span {
        lines.push(format!("ERROR_AT:{}:{}", span.start.line, span.start.column));
    }
    lines
}

pub(crate) fn emit_error(error: QuestError) -> i32 {
    debug!("command failed: {}", error);
    for line in render_error_lines(&error) {
        println!("{}", line);
    }
    1
}

/// Tags an I/O failure on `path` with `code`.
pub(crate) fn io_error<'a>(
    code: &'static str,
    path: &'a Path,
) -> impl FnOnce(std::io::Error) -> QuestError + 'a {
    move |error| QuestError::new(code, format!("{}: {}", path.display(), error))
}

pub(crate) fn state_json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> QuestError + '_ {
    move |error| QuestError::new("CLI_STATE_INVALID", format!("{}: {}", path.display(), error))
}
