use std::collections::BTreeMap;

use ql_core::{DocumentNode, NodeId, QuestDocument, QuestError, SourceLocation, SourceSpan, Tag};
use roxmltree::{Document, Node, NodeType};

pub fn parse_quest_document(source: &str) -> Result<QuestDocument, QuestError> {
    let document = Document::parse(source)
        .map_err(|error| QuestError::new("XML_PARSE_ERROR", error.to_string()))?;

    let Some(root) = document.root().children().find(|node| node.is_element()) else {
        return Err(QuestError::new(
            "XML_PARSE_ERROR",
            "XML document must contain a root element.",
        ));
    };

    if Tag::from_element_name(root.tag_name().name()) != Some(Tag::Quest) {
        return Err(QuestError::with_span(
            "XML_ROOT_NOT_QUEST",
            format!(
                "Root element must be <quest>, found <{}>.",
                root.tag_name().name()
            ),
            node_span(&document, root),
        ));
    }

    let mut quest = QuestDocument::new(
        DocumentNode {
            attributes: parse_attributes(root),
            ..DocumentNode::new(Tag::Quest)
        }
        .with_span(node_span(&document, root)),
    );
    let quest_root = quest.root();
    parse_children(&document, root, &mut quest, quest_root)?;
    validate_unique_ids(&quest)?;
    Ok(quest)
}

fn parse_children(
    document: &Document<'_>,
    node: Node<'_, '_>,
    quest: &mut QuestDocument,
    parent: NodeId,
) -> Result<(), QuestError> {
    for child in node.children() {
        match child.node_type() {
            NodeType::Element => {
                let name = child.tag_name().name();
                let Some(tag) = Tag::from_element_name(name) else {
                    return Err(QuestError::with_span(
                        "XML_UNKNOWN_TAG",
                        format!(
                            "<{}> is not allowed inside <{}>.",
                            name,
                            quest.tag(parent).element_name()
                        ),
                        node_span(document, child),
                    ));
                };
                if tag == Tag::Quest {
                    return Err(QuestError::with_span(
                        "XML_NESTED_QUEST",
                        "<quest> can only appear as the root element.",
                        node_span(document, child),
                    ));
                }

                let mut parsed = DocumentNode {
                    attributes: parse_attributes(child),
                    ..DocumentNode::new(tag)
                }
                .with_span(node_span(document, child));
                match tag {
                    Tag::Text | Tag::Instruction => {
                        parsed.text = descendant_text(child);
                        parsed.markup = inner_markup(child);
                    }
                    Tag::EnemyLine | Tag::Trigger => {
                        parsed.text = descendant_text(child);
                        parsed.markup = escape_text(&parsed.text);
                    }
                    _ => {}
                }

                let id = quest.append(parent, parsed);
                if !tag.is_leaf_markup() && !matches!(tag, Tag::EnemyLine | Tag::Trigger) {
                    parse_children(document, child, quest, id)?;
                }
            }
            NodeType::Text => {
                let value = child.text().unwrap_or_default().trim();
                if value.is_empty() {
                    continue;
                }
                quest.append(
                    parent,
                    DocumentNode {
                        text: value.to_string(),
                        markup: escape_text(value),
                        ..DocumentNode::new(Tag::Text)
                    }
                    .with_span(node_span(document, child)),
                );
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_attributes(node: Node<'_, '_>) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    for attribute in node.attributes() {
        let name = match attribute.name() {
            "if" => "condition",
            other => other,
        };
        attributes.insert(name.to_string(), attribute.value().to_string());
    }
    attributes
}

fn descendant_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|entry| entry.is_text())
        .filter_map(|entry| entry.text())
        .collect::<String>()
}

fn inner_markup(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    for child in node.children() {
        write_markup(child, &mut out);
    }
    out.trim().to_string()
}

fn write_markup(node: Node<'_, '_>, out: &mut String) {
    match node.node_type() {
        NodeType::Element => {
            out.push('<');
            out.push_str(node.tag_name().name());
            for attribute in node.attributes() {
                out.push_str(&format!(
                    " {}=\"{}\"",
                    attribute.name(),
                    escape_attr(attribute.value())
                ));
            }
            out.push('>');
            for child in node.children() {
                write_markup(child, out);
            }
            out.push_str("</");
            out.push_str(node.tag_name().name());
            out.push('>');
        }
        NodeType::Text => out.push_str(&escape_text(node.text().unwrap_or_default())),
        _ => {}
    }
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn validate_unique_ids(quest: &QuestDocument) -> Result<(), QuestError> {
    let mut seen: BTreeMap<&str, NodeId> = BTreeMap::new();
    for id in quest.descendants(quest.root()) {
        let node = quest.node(id);
        let Some(value) = node.id() else {
            continue;
        };
        if seen.insert(value, id).is_some() {
            let error = QuestError::new(
                "DOCUMENT_DUPLICATE_ID",
                format!("id=\"{}\" is used by more than one node.", value),
            );
            return Err(error.at(node.span.as_ref()));
        }
    }
    Ok(())
}

fn node_span(document: &Document<'_>, node: Node<'_, '_>) -> SourceSpan {
    let start_pos = document.text_pos_at(node.range().start);
    let end_pos = document.text_pos_at(node.range().end);
    SourceSpan {
        start: SourceLocation {
            line: start_pos.row as usize,
            column: start_pos.col as usize,
        },
        end: SourceLocation {
            line: end_pos.row as usize,
            column: end_pos.col as usize,
        },
    }
}
