use ql_core::{NodeId, QuestContext, QuestDocument, Tag};

use crate::visibility::is_enabled;

/// Visits direct children in document order, enabled or not, and returns the
/// first `Some` the visitor produces.
pub fn iterate_children<T>(
    document: &QuestDocument,
    node: NodeId,
    mut visitor: impl FnMut(Tag, NodeId) -> Option<T>,
) -> Option<T> {
    document
        .children(node)
        .iter()
        .find_map(|child| visitor(document.tag(*child), *child))
}

/// Like `iterate_children`, for visitors that can reject the document.
pub fn try_iterate_children<T, E>(
    document: &QuestDocument,
    node: NodeId,
    mut visitor: impl FnMut(Tag, NodeId) -> Result<Option<T>, E>,
) -> Result<Option<T>, E> {
    for child in document.children(node) {
        if let Some(found) = visitor(document.tag(*child), *child)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// First enabled sibling after `node`, or `None` when the branch runs out.
pub fn find_next_node(
    document: &QuestDocument,
    node: NodeId,
    context: &QuestContext,
) -> Option<NodeId> {
    let parent = document.parent(node)?;
    document
        .children(parent)
        .iter()
        .skip_while(|sibling| **sibling != node)
        .skip(1)
        .copied()
        .find(|sibling| is_enabled(document.node(*sibling), context))
}

/// Where play continues once `node`'s branch runs out: the next enabled sibling
/// of `node`, else of the card enclosing its `choice`/`event`, and so on up to
/// the quest root.
pub fn find_fallthrough_node(
    document: &QuestDocument,
    node: NodeId,
    context: &QuestContext,
) -> Option<NodeId> {
    let mut current = node;
    loop {
        if let Some(next) = find_next_node(document, current, context) {
            return Some(next);
        }
        let mut parent = document.parent(current)?;
        while matches!(document.tag(parent), Tag::Choice | Tag::Event) {
            parent = document.parent(parent)?;
        }
        current = parent;
    }
}

pub fn find_root_node(document: &QuestDocument, node: NodeId) -> NodeId {
    let mut current = node;
    while let Some(parent) = document.parent(current) {
        current = parent;
    }
    current
}

/// First node carrying `id` below (and including) `from`, in document order.
pub fn find_by_id(document: &QuestDocument, from: NodeId, id: &str) -> Option<NodeId> {
    document
        .descendants(from)
        .into_iter()
        .find(|candidate| document.node(*candidate).id() == Some(id))
}
