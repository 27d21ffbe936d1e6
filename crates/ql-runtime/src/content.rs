use std::sync::OnceLock;

use log::debug;
use ql_core::{NodeId, QuestContext, QuestDocument, Tag};
use regex::Regex;

use crate::expr::{evaluate_op, parse_op_body, Evaluation};
use crate::visibility::is_enabled;

fn op_span_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("op span regex must compile"))
}

fn icon_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\[([a-zA-Z_0-9]+)\]").expect("icon regex must compile"))
}

/// Renders every `{{...}}` span in `text`: assignments run and vanish, display
/// expressions are replaced by their value, and anything that fails to parse
/// or evaluate is left as literal text.
pub fn evaluate_content_ops(text: &str, context: &QuestContext) -> String {
    let mut scope = context.clone();
    let mut output = String::new();
    let mut last_index = 0usize;

    for captures in op_span_regex().captures_iter(text) {
        let (Some(full), Some(body)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        output.push_str(&text[last_index..full.start()]);
        last_index = full.end();

        let Ok(op) = parse_op_body(&decode_entities(body.as_str())) else {
            output.push_str(full.as_str());
            continue;
        };
        let evaluation = evaluate_op(&op, &scope);
        match &evaluation {
            Evaluation::Evaluated { value, .. } => {
                scope = evaluation.apply(&scope);
                if !op.is_assignment() {
                    output.push_str(&value.to_text());
                }
            }
            Evaluation::Unevaluable(_) => output.push_str(full.as_str()),
        }
    }

    output.push_str(&text[last_index..]);
    output
}

/// Replaces `[name]` tokens with inline icon images.
pub fn generate_icon_elements(content: &str) -> String {
    icon_regex()
        .replace_all(content, r#"<img class="inline_icon" src="images/${1}_small.svg">"#)
        .into_owned()
}

/// Folds the node's state block into a new context. `context` is left as is.
///
/// The state block is the run of leading `Text` children made only of
/// `{{...}}` spans. Disabled state paragraphs are skipped; unevaluable
/// assignments are skipped too.
pub fn update_context(
    document: &QuestDocument,
    node: NodeId,
    context: &QuestContext,
) -> QuestContext {
    let mut next = context.clone();
    let state_block = &document.children(node)[..state_block_len(document, node)];
    for child in state_block {
        let child_node = document.node(*child);
        if !is_enabled(child_node, &next) {
            continue;
        }
        for captures in op_span_regex().captures_iter(&child_node.text) {
            let Some(body) = captures.get(1) else {
                continue;
            };
            let Ok(op) = parse_op_body(body.as_str()) else {
                debug!("state block span \"{}\" does not parse", body.as_str());
                continue;
            };
            if !op.is_assignment() {
                continue;
            }
            match evaluate_op(&op, &next) {
                evaluation @ Evaluation::Evaluated { .. } => next = evaluation.apply(&next),
                Evaluation::Unevaluable(failure) => {
                    debug!("skipping state assignment \"{}\": {}", body.as_str(), failure);
                }
            }
        }
    }
    next
}

/// Number of leading children that make up the node's state block.
pub(crate) fn state_block_len(document: &QuestDocument, node: NodeId) -> usize {
    document
        .children(node)
        .iter()
        .take_while(|child| is_state_block(document, **child))
        .count()
}

/// A `Text` node whose content is nothing but `{{...}}` spans.
fn is_state_block(document: &QuestDocument, node: NodeId) -> bool {
    let node = document.node(node);
    if node.tag != Tag::Text {
        return false;
    }
    let text = node.text.trim();
    !text.is_empty()
        && op_span_regex().is_match(text)
        && op_span_regex().replace_all(text, "").trim().is_empty()
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
