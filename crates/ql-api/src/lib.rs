use std::sync::Arc;

use log::debug;
use ql_core::{
    CombatStep, EncounterTable, EventParameters, NodeId, QuestContext, QuestDocument,
    QuestError, RoleplayStep, StaticEncounterTable, StepResult, Tag, TriggerKind,
};
use ql_parser::parse_quest_document;
use ql_runtime::{find_fallthrough_node, is_enabled, iterate_children, QuestInterpreter};
use serde::{Deserialize, Serialize};

const MAX_TRIGGER_HOPS: usize = 10_000;

#[derive(Clone)]
pub struct CreateSessionOptions {
    pub quest_xml: String,
    pub encounters: Option<Arc<dyn EncounterTable>>,
    pub initial_context: Option<QuestContext>,
}

#[derive(Clone)]
pub struct ResumeSessionOptions {
    pub quest_xml: String,
    pub encounters: Option<Arc<dyn EncounterTable>>,
    pub snapshot: SessionSnapshot,
}

/// Position of a session between two player inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub node: Option<NodeId>,
    pub context: QuestContext,
    pub ended: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    Roleplay(RoleplayStep),
    Combat(CombatStep),
    End,
}

/// Drives one playthrough of a quest. The current node is always a roleplay
/// or combat card; goto triggers are followed as soon as they are reached.
pub struct QuestSession {
    document: QuestDocument,
    encounters: Arc<dyn EncounterTable>,
    node: Option<NodeId>,
    context: QuestContext,
}

impl QuestSession {
    pub fn new(options: CreateSessionOptions) -> Result<Self, QuestError> {
        let document = parse_quest_document(&options.quest_xml)?;
        let context = options.initial_context.unwrap_or_default();

        let start = iterate_children(&document, document.root(), |tag, child| {
            (tag.is_card() && is_enabled(document.node(child), &context)).then_some(child)
        })
        .ok_or_else(|| {
            QuestError::new(
                "SESSION_EMPTY_QUEST",
                "<quest> has no enabled <roleplay>, <combat> or <trigger> child.",
            )
        })?;

        let mut session = Self {
            document,
            encounters: options.encounters.unwrap_or_else(default_encounters),
            node: None,
            context,
        };
        session.node = session.follow_triggers(Some(start))?;
        debug!("session started at {:?}", session.node);
        Ok(session)
    }

    pub fn resume(options: ResumeSessionOptions) -> Result<Self, QuestError> {
        let document = parse_quest_document(&options.quest_xml)?;
        let SessionSnapshot {
            node,
            context,
            ended,
        } = options.snapshot;

        let node = match (node, ended) {
            (_, true) => None,
            (Some(node), false) => {
                let card = document.get(node).map(|entry| entry.tag);
                if !matches!(card, Some(Tag::Roleplay | Tag::Combat)) {
                    return Err(QuestError::new(
                        "SESSION_NODE_UNKNOWN",
                        format!("Snapshot node {} is not a card of this quest.", node.0),
                    ));
                }
                Some(node)
            }
            (None, false) => {
                return Err(QuestError::new(
                    "SESSION_SNAPSHOT_INVALID",
                    "Snapshot has no node but is not marked as ended.",
                ))
            }
        };

        Ok(Self {
            document,
            encounters: options.encounters.unwrap_or_else(default_encounters),
            node,
            context,
        })
    }

    pub fn document(&self) -> &QuestDocument {
        &self.document
    }

    pub fn title(&self) -> Option<&str> {
        self.document.metadata().get("title").map(String::as_str)
    }

    pub fn context(&self) -> &QuestContext {
        &self.context
    }

    pub fn current_node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_ended(&self) -> bool {
        self.node.is_none()
    }

    pub fn current_step(&self) -> Result<SessionStep, QuestError> {
        let Some(node) = self.node else {
            return Ok(SessionStep::End);
        };
        match self.interpreter().load_step(node, &self.context)? {
            StepResult::Roleplay(step) => Ok(SessionStep::Roleplay(step)),
            StepResult::Combat(step) => Ok(SessionStep::Combat(step)),
            StepResult::Trigger(_) => Err(QuestError::new(
                "SESSION_UNSETTLED",
                "Session is parked on a trigger.",
            )),
        }
    }

    /// Picks the `idx`-th choice of the current roleplay card. A branch that runs
    /// out continues after the card it was nested in; only an `end` trigger
    /// or the end of the quest root finishes the session.
    pub fn choose(&mut self, idx: usize) -> Result<(), QuestError> {
        let node = self.expect_card(Tag::Roleplay, "SESSION_NOT_AWAITING_CHOICE")?;
        let interpreter = self.interpreter();
        let step = interpreter.load_roleplay_node(node, &self.context)?;
        if idx >= step.choices.len() {
            return Err(QuestError::new(
                "SESSION_CHOICE_OUT_OF_RANGE",
                format!(
                    "Choice index {} is out of range, {} choices available.",
                    idx,
                    step.choices.len()
                ),
            ));
        }

        let next = match interpreter.handle_choice(node, idx, &step.context)? {
            Some(next) => Some(next),
            None if interpreter.has_enabled_end_trigger(node, &step.context) => None,
            None => find_fallthrough_node(&self.document, node, &step.context),
        };
        let next = self.follow_triggers(next)?;
        debug!("choice {} moved session from {:?} to {:?}", idx, node, next);
        self.context = step.context;
        self.node = next;
        Ok(())
    }

    /// Resolves the current combat card with `event` (`win` or `lose`).
    pub fn resolve_combat(&mut self, event: &str) -> Result<EventParameters, QuestError> {
        let node = self.expect_card(Tag::Combat, "SESSION_NOT_IN_COMBAT")?;
        let interpreter = self.interpreter();
        interpreter.load_combat_node(node, &self.context)?;

        let parameters = interpreter.get_event_parameters(node, event, &self.context)?;
        let next = interpreter.handle_event(node, event, &self.context)?;
        let next = self.follow_triggers(next)?;
        debug!("event \"{}\" moved session from {:?} to {:?}", event, node, next);
        self.node = next;
        Ok(parameters)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            node: self.node,
            context: self.context.clone(),
            ended: self.node.is_none(),
        }
    }

    fn interpreter(&self) -> QuestInterpreter<'_> {
        QuestInterpreter::new(&self.document, self.encounters.as_ref())
    }

    fn expect_card(&self, tag: Tag, code: &str) -> Result<NodeId, QuestError> {
        let Some(node) = self.node else {
            return Err(QuestError::new("SESSION_ENDED", "Quest has already ended."));
        };
        if self.document.tag(node) != tag {
            return Err(QuestError::new(
                code,
                format!(
                    "Current card is <{}>, expected <{}>.",
                    self.document.tag(node).element_name(),
                    tag.element_name()
                ),
            ));
        }
        Ok(node)
    }

    fn follow_triggers(&self, start: Option<NodeId>) -> Result<Option<NodeId>, QuestError> {
        let mut current = start;
        for _ in 0..MAX_TRIGGER_HOPS {
            let Some(node) = current else {
                return Ok(None);
            };
            if self.document.tag(node) != Tag::Trigger {
                return Ok(Some(node));
            }
            let trigger = self.interpreter().load_trigger_node(node)?;
            current = match trigger.kind {
                TriggerKind::End => None,
                TriggerKind::Goto => Some(trigger.target),
            };
        }
        Err(QuestError::new(
            "SESSION_GOTO_LOOP",
            format!("goto chain exceeded {} hops.", MAX_TRIGGER_HOPS),
        ))
    }
}

fn default_encounters() -> Arc<dyn EncounterTable> {
    Arc::new(StaticEncounterTable::bundled())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_core::QlValue;

    const QUEST: &str = r#"
<quest title="Crypt Run" author="tests">
  <roleplay title="Entrance" id="entrance">
    <p>{{torches = 2}}</p>
    <p>You carry {{torches}} torches.</p>
    <choice text="Enter"><trigger>goto hall</trigger></choice>
    <choice text="Go home"><trigger>end</trigger></choice>
  </roleplay>
  <roleplay id="hall">
    <p>{{torches = torches - 1}}</p>
    <p>A torch gutters. {{torches}} left.</p>
  </roleplay>
  <combat id="guards">
    <e>Skeleton Swordsman</e>
    <e>{{torches}} Giant Rat</e>
    <event on="win" xp="true" heal="2"><trigger>goto treasure</trigger></event>
    <event on="lose"><trigger>end</trigger></event>
  </combat>
  <roleplay id="treasure"><p>Gold!</p></roleplay>
  <trigger>end</trigger>
</quest>"#;

    fn start() -> QuestSession {
        QuestSession::new(CreateSessionOptions {
            quest_xml: QUEST.to_string(),
            encounters: None,
            initial_context: None,
        })
        .expect("session should start")
    }

    fn roleplay(session: &QuestSession) -> RoleplayStep {
        match session.current_step().expect("step should load") {
            SessionStep::Roleplay(step) => step,
            other => panic!("expected roleplay, got {:?}", other),
        }
    }

    #[test]
    fn new_session_starts_at_first_card() {
        let session = start();
        assert_eq!(session.title(), Some("Crypt Run"));
        let step = roleplay(&session);
        assert_eq!(step.title.as_deref(), Some("Entrance"));
        assert_eq!(step.content[0].text, "You carry 2 torches.");
        assert_eq!(step.choices.len(), 2);
        assert!(!session.is_ended());
    }

    #[test]
    fn choose_follows_goto_and_carries_context() {
        let mut session = start();
        session.choose(0).expect("choose should succeed");
        assert_eq!(session.context().get("torches"), Some(&QlValue::Number(2.0)));

        let hall = roleplay(&session);
        assert_eq!(hall.content[0].text, "A torch gutters. 1 left.");
        assert_eq!(hall.choices[0].text, "Next");

        session.choose(0).expect("next should succeed");
        assert_eq!(session.context().get("torches"), Some(&QlValue::Number(1.0)));
        let SessionStep::Combat(combat) = session.current_step().expect("combat should load")
        else {
            panic!("expected combat");
        };
        assert_eq!(combat.enemies.len(), 2);
        assert_eq!(combat.enemies[0].class.as_deref(), Some("Undead"));
        assert_eq!(combat.enemies[1].name, "{{torches}} Giant Rat");
    }

    #[test]
    fn end_trigger_in_choice_ends_session() {
        let mut session = start();
        session.choose(1).expect("choose should succeed");
        assert!(session.is_ended());
        assert_eq!(session.current_step().expect("end step"), SessionStep::End);

        let error = session.choose(0).expect_err("ended session has no choices");
        assert_eq!(error.code, "SESSION_ENDED");
    }

    #[test]
    fn combat_outcomes_return_parameters_and_move_on() {
        let mut session = start();
        session.choose(0).expect("enter");
        session.choose(0).expect("next");

        let error = session.choose(0).expect_err("combat has no choices");
        assert_eq!(error.code, "SESSION_NOT_AWAITING_CHOICE");

        let params = session.resolve_combat("win").expect("win should resolve");
        assert_eq!(
            params,
            EventParameters {
                xp: Some(true),
                loot: None,
                heal: Some(2),
            }
        );
        let treasure = roleplay(&session);
        assert_eq!(treasure.choices[0].text, "End");

        session.choose(0).expect("end should resolve");
        assert!(session.is_ended());
    }

    #[test]
    fn losing_combat_ends_session() {
        let mut session = start();
        session.choose(0).expect("enter");
        session.choose(0).expect("next");
        let params = session.resolve_combat("lose").expect("lose should resolve");
        assert_eq!(params, EventParameters::default());
        assert!(session.is_ended());
    }

    #[test]
    fn exhausted_branch_falls_through_to_next_outer_card() {
        let quest = r#"<quest>
  <roleplay>
    <choice text="Sneak"><roleplay><p>A guard spots you.</p></roleplay></choice>
    <choice text="Charge"><roleplay><p>You charge.</p></roleplay></choice>
  </roleplay>
  <roleplay id="fight"><p>Fight!</p></roleplay>
  <roleplay><p>Aftermath</p><trigger>end</trigger></roleplay>
</quest>"#;
        let mut session = QuestSession::new(CreateSessionOptions {
            quest_xml: quest.to_string(),
            encounters: None,
            initial_context: None,
        })
        .expect("session should start");

        session.choose(0).expect("sneak");
        assert_eq!(roleplay(&session).content[0].text, "A guard spots you.");
        assert_eq!(roleplay(&session).choices[0].text, "Next");

        session.choose(0).expect("fall through");
        assert!(!session.is_ended());
        let fight = session.document().children(session.document().root())[1];
        assert_eq!(session.current_node(), Some(fight));

        session.choose(0).expect("next");
        assert_eq!(roleplay(&session).choices[0].text, "End");
        session.choose(0).expect("end");
        assert!(session.is_ended());
    }

    #[test]
    fn out_of_range_choice_is_rejected() {
        let mut session = start();
        let error = session.choose(2).expect_err("index 2 should fail");
        assert_eq!(error.code, "SESSION_CHOICE_OUT_OF_RANGE");
        let document = session.document();
        let entrance = document.children(document.root()).first().copied();
        assert_eq!(session.current_node(), entrance);

        let error = session
            .resolve_combat("win")
            .expect_err("roleplay is not combat");
        assert_eq!(error.code, "SESSION_NOT_IN_COMBAT");
    }

    #[test]
    fn initial_context_gates_the_start_card() {
        let quest = r#"<quest>
  <roleplay if="veteran"><p>Welcome back.</p></roleplay>
  <roleplay><p>Welcome.</p></roleplay>
</quest>"#;
        let fresh = QuestSession::new(CreateSessionOptions {
            quest_xml: quest.to_string(),
            encounters: None,
            initial_context: Some(QuestContext::new().with("veteran", false)),
        })
        .expect("session should start");
        assert_eq!(roleplay(&fresh).content[0].text, "Welcome.");

        let veteran = QuestSession::new(CreateSessionOptions {
            quest_xml: quest.to_string(),
            encounters: None,
            initial_context: Some(QuestContext::new().with("veteran", true)),
        })
        .expect("session should start");
        assert_eq!(roleplay(&veteran).content[0].text, "Welcome back.");
    }

    #[test]
    fn quest_without_cards_is_rejected() {
        let error = QuestSession::new(CreateSessionOptions {
            quest_xml: r#"<quest title="Empty"><roleplay if="false"/></quest>"#.to_string(),
            encounters: None,
            initial_context: None,
        })
        .err()
        .expect("empty quest should fail");
        assert_eq!(error.code, "SESSION_EMPTY_QUEST");
    }

    #[test]
    fn goto_cycles_are_detected() {
        let error = QuestSession::new(CreateSessionOptions {
            quest_xml: r#"<quest><trigger id="a">goto b</trigger><trigger id="b">goto a</trigger></quest>"#
                .to_string(),
            encounters: None,
            initial_context: None,
        })
        .err()
        .expect("cycle should fail");
        assert_eq!(error.code, "SESSION_GOTO_LOOP");
    }

    #[test]
    fn snapshot_survives_json_and_resume() {
        let mut session = start();
        session.choose(0).expect("enter");
        let snapshot = session.snapshot();
        assert!(!snapshot.ended);

        let json = serde_json::to_string(&snapshot).expect("snapshot should serialize");
        let decoded: SessionSnapshot =
            serde_json::from_str(&json).expect("snapshot should deserialize");
        assert_eq!(decoded, snapshot);

        let mut resumed = QuestSession::resume(ResumeSessionOptions {
            quest_xml: QUEST.to_string(),
            encounters: None,
            snapshot: decoded,
        })
        .expect("resume should succeed");
        assert_eq!(roleplay(&resumed), roleplay(&session));

        resumed.choose(0).expect("next");
        session.choose(0).expect("next");
        assert_eq!(resumed.snapshot(), session.snapshot());
    }

    #[test]
    fn resume_rejects_foreign_nodes() {
        let snapshot = SessionSnapshot {
            node: Some(NodeId(999)),
            context: QuestContext::new(),
            ended: false,
        };
        let error = QuestSession::resume(ResumeSessionOptions {
            quest_xml: QUEST.to_string(),
            encounters: None,
            snapshot,
        })
        .err()
        .expect("unknown node should fail");
        assert_eq!(error.code, "SESSION_NODE_UNKNOWN");

        let ended = QuestSession::resume(ResumeSessionOptions {
            quest_xml: QUEST.to_string(),
            encounters: None,
            snapshot: SessionSnapshot {
                node: None,
                context: QuestContext::new(),
                ended: true,
            },
        })
        .expect("ended snapshot should resume");
        assert!(ended.is_ended());
    }
}
