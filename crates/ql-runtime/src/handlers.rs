use std::sync::OnceLock;

use log::debug;
use ql_core::{
    Choice, CombatStep, ContentItem, ContentKind, DocumentNode, Enemy, EncounterTable,
    EventParameters, NodeId, QuestContext, QuestDocument, QuestError, RoleplayStep, StepResult,
    Tag, TriggerKind, TriggerStep,
};
use regex::Regex;

use crate::content::{
    evaluate_content_ops, generate_icon_elements, state_block_len, update_context,
};
use crate::expr::{evaluate_op, parse_op, Evaluation};
use crate::navigator::{find_by_id, find_next_node, find_root_node, try_iterate_children};
use crate::visibility::is_enabled;

fn goto_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^goto\s+(\S+)$").expect("goto regex must compile"))
}

/// Turns (node, context) pairs into step results and resolves player input
/// back into the next node. Holds no state of its own.
#[derive(Clone, Copy)]
pub struct QuestInterpreter<'a> {
    document: &'a QuestDocument,
    encounters: &'a dyn EncounterTable,
}

impl<'a> QuestInterpreter<'a> {
    pub fn new(document: &'a QuestDocument, encounters: &'a dyn EncounterTable) -> Self {
        Self {
            document,
            encounters,
        }
    }

    pub fn document(&self) -> &'a QuestDocument {
        self.document
    }

    /// Dispatches on the node's tag. Only cards produce steps.
    pub fn load_step(&self, node: NodeId, context: &QuestContext) -> Result<StepResult, QuestError> {
        match self.document.tag(node) {
            Tag::Combat => self.load_combat_node(node, context).map(StepResult::Combat),
            Tag::Roleplay => self.load_roleplay_node(node, context).map(StepResult::Roleplay),
            Tag::Trigger => self.load_trigger_node(node).map(StepResult::Trigger),
            other => Err(self.document_error(
                node,
                "STEP_UNEXPECTED_NODE",
                format!("Unknown or unexpected node: <{}>.", other.element_name()),
            )),
        }
    }

    /// First enabled `event` child whose `on` matches.
    pub fn get_event(
        &self,
        parent: NodeId,
        event_name: &str,
        context: &QuestContext,
    ) -> Result<NodeId, QuestError> {
        self.document
            .children(parent)
            .iter()
            .copied()
            .find(|child| {
                let node = self.document.node(*child);
                node.tag == Tag::Event && node.on() == Some(event_name) && is_enabled(node, context)
            })
            .ok_or_else(|| {
                self.document_error(
                    parent,
                    "EVENT_NOT_FOUND",
                    format!("Could not find child with on=\"{}\".", event_name),
                )
            })
    }

    pub fn get_event_parameters(
        &self,
        parent: NodeId,
        event_name: &str,
        context: &QuestContext,
    ) -> Result<EventParameters, QuestError> {
        let event = self.get_event(parent, event_name, context)?;
        let node = self.document.node(event);

        let heal = match present_attr(node, "heal") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                self.document_error(
                    event,
                    "EVENT_HEAL_INVALID",
                    format!("heal=\"{}\" is not an integer.", raw),
                )
            })?),
            None => None,
        };

        Ok(EventParameters {
            xp: present_attr(node, "xp").map(|raw| raw == "true"),
            loot: present_attr(node, "loot").map(|raw| raw == "true"),
            heal,
        })
    }

    /// `choice_index` counts enabled choices only. `Ok(None)` means the quest is over.
    pub fn handle_choice(
        &self,
        parent: NodeId,
        choice_index: usize,
        context: &QuestContext,
    ) -> Result<Option<NodeId>, QuestError> {
        let mut enabled_index = 0usize;
        for child in self.document.children(parent) {
            let node = self.document.node(*child);
            if node.tag != Tag::Choice || !is_enabled(node, context) {
                continue;
            }
            if enabled_index == choice_index {
                debug!("choice {} resolved to node {:?}", choice_index, child);
                return self.resolve_container(*child, context).map(Some);
            }
            enabled_index += 1;
        }

        if self.has_enabled_end_trigger(parent, context) {
            debug!("choice {} on node {:?} ends the quest", choice_index, parent);
            return Ok(None);
        }
        Ok(find_next_node(self.document, parent, context))
    }

    pub fn handle_event(
        &self,
        parent: NodeId,
        event_name: &str,
        context: &QuestContext,
    ) -> Result<Option<NodeId>, QuestError> {
        let event = self.get_event(parent, event_name, context)?;
        debug!("event \"{}\" resolved to node {:?}", event_name, event);
        self.resolve_container(event, context).map(Some)
    }

    /// Combat is narratively stateless: its own state block only feeds enemy
    /// and event visibility, and the incoming context is returned.
    pub fn load_combat_node(
        &self,
        node: NodeId,
        context: &QuestContext,
    ) -> Result<CombatStep, QuestError> {
        let combat_context = update_context(self.document, node, context);
        let state_block = state_block_len(self.document, node);
        let mut enemies = Vec::new();
        let mut win_events = 0usize;
        let mut lose_events = 0usize;

        for (position, child) in self.document.children(node).iter().enumerate() {
            let child_node = self.document.node(*child);
            if !is_enabled(child_node, &combat_context) {
                continue;
            }

            match child_node.tag {
                Tag::EnemyLine => enemies.push(self.resolve_enemy(&child_node.text, &combat_context)),
                Tag::Event => match child_node.on() {
                    Some("win") => win_events += 1,
                    Some("lose") => lose_events += 1,
                    _ => {}
                },
                Tag::Text if position < state_block => {}
                other => {
                    return Err(self.document_error(
                        *child,
                        "COMBAT_CHILD_INVALID",
                        format!("Invalid child element of <combat>: <{}>.", other.element_name()),
                    ))
                }
            }
        }

        if win_events == 0 {
            return Err(self.document_error(
                node,
                "COMBAT_MISSING_WIN_EVENT",
                "<combat> must have at least one conditionally true child with on=\"win\".",
            ));
        }
        if lose_events == 0 {
            return Err(self.document_error(
                node,
                "COMBAT_MISSING_LOSE_EVENT",
                "<combat> must have at least one conditionally true child with on=\"lose\".",
            ));
        }
        if enemies.is_empty() {
            return Err(self.document_error(
                node,
                "COMBAT_NO_ENEMIES",
                "<combat> has no enabled <e> children.",
            ));
        }

        debug!("combat node {:?} with {} enemies", node, enemies.len());
        Ok(CombatStep {
            icon: self.document.node(node).attr("icon").map(str::to_string),
            enemies,
            context: context.clone(),
        })
    }

    pub fn load_roleplay_node(
        &self,
        node: NodeId,
        context: &QuestContext,
    ) -> Result<RoleplayStep, QuestError> {
        let roleplay_context = update_context(self.document, node, context);
        let mut choices = Vec::new();
        let mut content = Vec::new();

        for child in self.document.children(node) {
            let child_node = self.document.node(*child);
            if !is_enabled(child_node, &roleplay_context) {
                continue;
            }

            let (kind, markup) = match child_node.tag {
                Tag::Choice => {
                    let text = child_node
                        .attr("text")
                        .filter(|text| !text.trim().is_empty())
                        .ok_or_else(|| {
                            self.document_error(
                                *child,
                                "CHOICE_TEXT_MISSING",
                                "<choice> inside <roleplay> must have \"text\" attribute.",
                            )
                        })?;
                    let idx = choices.len();
                    choices.push(Choice {
                        text: render(text, &roleplay_context),
                        idx,
                    });
                    continue;
                }
                Tag::Event => {
                    return Err(self.document_error(
                        *child,
                        "ROLEPLAY_EVENT_CHILD",
                        "<roleplay> cannot contain <event>.",
                    ))
                }
                Tag::Trigger if self.is_end_trigger(*child) => continue,
                Tag::Trigger => {
                    return Err(self.document_error(
                        *child,
                        "ROLEPLAY_CHILD_INVALID",
                        "Only an \"end\" <trigger> may appear directly inside <roleplay>.",
                    ))
                }
                Tag::Instruction => (ContentKind::Instruction, &child_node.markup),
                Tag::Text => (ContentKind::Text, &child_node.markup),
                other => {
                    return Err(self.document_error(
                        *child,
                        "ROLEPLAY_CHILD_INVALID",
                        format!("Invalid child element of <roleplay>: <{}>.", other.element_name()),
                    ))
                }
            };

            let text = render(markup, &roleplay_context);
            if !text.is_empty() {
                content.push(ContentItem { kind, text });
            }
        }

        if choices.is_empty() {
            let ends_here = self.has_enabled_end_trigger(node, &roleplay_context);
            let label = match find_next_node(self.document, node, context) {
                _ if ends_here => "End",
                Some(next) if self.is_end_trigger(next) => "End",
                _ => "Next",
            };
            choices.push(Choice {
                text: label.to_string(),
                idx: 0,
            });
        }

        let roleplay = self.document.node(node);
        debug!(
            "roleplay node {:?} with {} content items and {} choices",
            node,
            content.len(),
            choices.len()
        );
        Ok(RoleplayStep {
            title: roleplay.attr("title").map(str::to_string),
            icon: roleplay.attr("icon").map(str::to_string),
            content,
            choices,
            context: roleplay_context,
        })
    }

    /// For `end` the target is the trigger itself.
    pub fn load_trigger_node(&self, node: NodeId) -> Result<TriggerStep, QuestError> {
        let text = self.document.node(node).text.trim();
        if text == "end" {
            return Ok(TriggerStep {
                target: node,
                kind: TriggerKind::End,
            });
        }

        if let Some(captures) = goto_regex().captures(text) {
            let id = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let root = find_root_node(self.document, node);
            let target = find_by_id(self.document, root, id).ok_or_else(|| {
                self.document_error(
                    node,
                    "TRIGGER_GOTO_TARGET_MISSING",
                    format!("goto target \"{}\" does not exist.", id),
                )
            })?;
            return Ok(TriggerStep {
                target,
                kind: TriggerKind::Goto,
            });
        }

        Err(self.document_error(
            node,
            "TRIGGER_INVALID",
            format!("invalid trigger \"{}\".", text),
        ))
    }

    /// Follows a matched choice or event into the card it leads to.
    fn resolve_container(&self, node: NodeId, context: &QuestContext) -> Result<NodeId, QuestError> {
        if let [only] = self.document.children(node) {
            if self.document.tag(*only) == Tag::Trigger {
                return self.load_trigger_node(*only).map(|trigger| trigger.target);
            }
        }

        let card = try_iterate_children(self.document, node, |tag, child| match tag {
            Tag::Event | Tag::Choice => Err(self.document_error(
                child,
                "CONTAINER_NESTED_BRANCH",
                format!(
                    "<{}> cannot have <event> or <choice> child.",
                    self.document.tag(node).element_name()
                ),
            )),
            tag if tag.is_card() && is_enabled(self.document.node(child), context) => {
                Ok(Some(child))
            }
            _ => Ok(None),
        })?;

        card.ok_or_else(|| {
            self.document_error(
                node,
                "CONTAINER_NO_CARD",
                "Node must have at least one of <combat> or <roleplay> or <trigger>.",
            )
        })
    }

    fn is_end_trigger(&self, node: NodeId) -> bool {
        let node = self.document.node(node);
        node.tag == Tag::Trigger && node.text.trim() == "end"
    }

    /// True when `parent` holds an enabled `end` trigger, so moving past it ends the quest.
    pub fn has_enabled_end_trigger(&self, parent: NodeId, context: &QuestContext) -> bool {
        self.document.children(parent).iter().any(|child| {
            self.is_end_trigger(*child) && is_enabled(self.document.node(*child), context)
        })
    }

    fn resolve_enemy(&self, line: &str, context: &QuestContext) -> Enemy {
        let mut name = line.trim().to_string();
        if let Some(op) = parse_op(&name) {
            if let Evaluation::Evaluated { value, .. } = evaluate_op(&op, context) {
                name = value.to_text();
            }
        }

        match self.encounters.lookup(&name.to_lowercase()) {
            Some(encounter) => Enemy {
                name: encounter.name,
                tier: encounter.tier,
                class: encounter.class,
            },
            None => Enemy {
                name,
                tier: 1,
                class: None,
            },
        }
    }

    fn document_error(
        &self,
        node: NodeId,
        code: &str,
        message: impl Into<String>,
    ) -> QuestError {
        QuestError::new(code, message).at(self.document.node(node).span.as_ref())
    }
}

/// Empty attributes count as absent.
fn present_attr<'n>(node: &'n DocumentNode, name: &str) -> Option<&'n str> {
    node.attr(name).map(str::trim).filter(|raw| !raw.is_empty())
}

fn render(text: &str, context: &QuestContext) -> String {
    generate_icon_elements(&evaluate_content_ops(text, context))
        .trim()
        .to_string()
}
