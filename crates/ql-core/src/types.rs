use serde::{Deserialize, Serialize};

use crate::context::QuestContext;
use crate::document::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    pub fn synthetic() -> Self {
        Self {
            start: SourceLocation { line: 1, column: 1 },
            end: SourceLocation { line: 1, column: 1 },
        }
    }
}

/// Closed set of node kinds a quest document is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tag {
    Quest,
    Roleplay,
    Combat,
    Trigger,
    Choice,
    Event,
    EnemyLine,
    Instruction,
    Text,
}

impl Tag {
    pub fn from_element_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "quest" => Some(Self::Quest),
            "roleplay" => Some(Self::Roleplay),
            "combat" => Some(Self::Combat),
            "trigger" => Some(Self::Trigger),
            "choice" => Some(Self::Choice),
            "event" => Some(Self::Event),
            "e" => Some(Self::EnemyLine),
            "instruction" => Some(Self::Instruction),
            "p" | "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn element_name(self) -> &'static str {
        match self {
            Self::Quest => "quest",
            Self::Roleplay => "roleplay",
            Self::Combat => "combat",
            Self::Trigger => "trigger",
            Self::Choice => "choice",
            Self::Event => "event",
            Self::EnemyLine => "e",
            Self::Instruction => "instruction",
            Self::Text => "p",
        }
    }

    /// Tags whose body is markup rather than child nodes.
    pub fn is_leaf_markup(self) -> bool {
        matches!(self, Self::Instruction | Self::Text)
    }

    /// Tags a choice or event body may lead into.
    pub fn is_card(self) -> bool {
        matches!(self, Self::Combat | Self::Roleplay | Self::Trigger)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub name: String,
    pub tier: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub idx: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    Text,
    Instruction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub kind: ContentKind,
    pub text: String,
}

/// Post-combat effects read off a matched `event` node. Absent attributes stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heal: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    End,
    Goto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStep {
    pub icon: Option<String>,
    pub enemies: Vec<Enemy>,
    pub context: QuestContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleplayStep {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub content: Vec<ContentItem>,
    pub choices: Vec<Choice>,
    pub context: QuestContext,
}

/// `target` is the goto destination, or the trigger node itself for `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerStep {
    pub target: NodeId,
    pub kind: TriggerKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepResult {
    Combat(CombatStep),
    Roleplay(RoleplayStep),
    Trigger(TriggerStep),
}
