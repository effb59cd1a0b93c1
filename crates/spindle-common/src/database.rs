use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type ActorId = u32;
pub type ConversationId = u32;
pub type EntryId = u32;

/// Id of every conversation's unconditioned start entry.
pub const START_ENTRY_ID: EntryId = 0;

/// Top-level output of compilation, consumed by the dialogue runtime's
/// importer. Serialized as a `.dialogue.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueDatabase {
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<Actor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversations: Vec<Conversation>,
    pub metadata: DatabaseMetadata,
}

/// Compilation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub compiler_version: String,
    pub default_locale: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locales: Vec<String>,
    pub player_actor_id: ActorId,
    pub default_actor_id: ActorId,
}

/// A speaking participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    #[serde(default)]
    pub is_player: bool,
}

/// Inferred type of a script variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    Boolean,
    Number,
    Text,
}

/// A variable in the shared store, created once by the registration pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    pub kind: VariableKind,
    pub initial_value: serde_json::Value,
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, kind: VariableKind, initial_value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            kind,
            initial_value,
        }
    }

    /// A text variable with an empty default, used for names only ever `set`.
    pub fn empty_text(name: impl Into<String>) -> Self {
        Self::new(name, VariableKind::Text, serde_json::Value::String(String::new()))
    }
}

/// One node graph, compiled from one script node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub actor_id: ActorId,
    pub conversant_id: ActorId,
    /// Entries in creation order; `entries[0]` is the start entry.
    pub entries: Vec<DialogueEntry>,
}

impl Conversation {
    pub fn entry(&self, id: EntryId) -> Option<&DialogueEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn start_entry(&self) -> Option<&DialogueEntry> {
        self.entry(START_ENTRY_ID)
    }

    /// All outgoing links of all entries, in entry order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.entries.iter().flat_map(|e| e.outgoing_links.iter())
    }
}

/// What the runtime does with an entry whose conditions evaluate false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FalseConditionAction {
    /// The entry is excluded from traversal.
    #[default]
    Block,
    /// The entry is skipped and traversal continues with its children.
    Passthrough,
}

/// Link priority at a branch point. The runtime tries every `Normal` link
/// before any `BelowNormal` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConditionPriority {
    #[default]
    Normal,
    BelowNormal,
}

/// One step of narrative content or a control marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueEntry {
    pub id: EntryId,
    pub conversation_id: ConversationId,
    pub title: String,
    pub actor_id: ActorId,
    pub conversant_id: ActorId,
    /// Localized text keyed by locale.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dialogue_text: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Lua boolean expression; empty when unconditioned.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub conditions: String,
    #[serde(default)]
    pub false_condition_action: FalseConditionAction,
    /// Lua statements run when the entry is reached.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_script: String,
    /// Transition directive (sequencer commands).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sequence: String,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outgoing_links: Vec<Link>,
}

impl DialogueEntry {
    pub fn new(id: EntryId, conversation_id: ConversationId, title: impl Into<String>) -> Self {
        Self {
            id,
            conversation_id,
            title: title.into(),
            actor_id: 0,
            conversant_id: 0,
            dialogue_text: BTreeMap::new(),
            tags: Vec::new(),
            conditions: String::new(),
            false_condition_action: FalseConditionAction::default(),
            user_script: String::new(),
            sequence: String::new(),
            is_root: false,
            is_group: false,
            outgoing_links: Vec::new(),
        }
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }
}

/// A directed edge between two entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub origin_conversation_id: ConversationId,
    pub origin_entry_id: EntryId,
    pub destination_conversation_id: ConversationId,
    pub destination_entry_id: EntryId,
    #[serde(default)]
    pub priority: ConditionPriority,
    /// True only for edges that leave the origin conversation.
    #[serde(default)]
    pub is_connector: bool,
}

impl DialogueDatabase {
    /// An empty database with the player and default actors already created.
    pub fn new(
        default_locale: impl Into<String>,
        locales: Vec<String>,
        player_name: &str,
        default_actor_name: &str,
    ) -> Self {
        let player = Actor {
            id: 1,
            name: player_name.to_string(),
            is_player: true,
        };
        let npc = Actor {
            id: 2,
            name: default_actor_name.to_string(),
            is_player: false,
        };
        Self {
            version: "0.1.0".to_string(),
            source_files: Vec::new(),
            actors: vec![player, npc],
            variables: Vec::new(),
            conversations: Vec::new(),
            metadata: DatabaseMetadata {
                compiler_version: env!("CARGO_PKG_VERSION").to_string(),
                default_locale: default_locale.into(),
                locales,
                player_actor_id: 1,
                default_actor_id: 2,
            },
        }
    }

    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn conversation_by_title(&self, title: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.title == title)
    }
}
