use log::warn;
use ql_core::{DocumentNode, QuestContext};

use crate::expr::{evaluate_expr, parse_expression};

/// A node without a condition is always enabled. A condition that cannot be
/// parsed or evaluated hides the node and logs a warning.
pub fn is_enabled(node: &DocumentNode, context: &QuestContext) -> bool {
    let Some(condition) = node.condition() else {
        return true;
    };

    match parse_expression(condition).and_then(|expr| evaluate_expr(&expr, context)) {
        Ok(value) => value.is_truthy(),
        Err(failure) => {
            warn!(
                "hiding <{}> with unevaluable condition \"{}\": {}",
                node.tag.element_name(),
                condition,
                failure
            );
            false
        }
    }
}
