pub mod database;
pub mod errors;
pub mod manifest;
pub mod registry;
pub mod span;

pub use database::{
    Actor, ActorId, ConditionPriority, Conversation, ConversationId, DialogueDatabase,
    DialogueEntry, EntryId, FalseConditionAction, Link, VariableDefinition, VariableKind,
    START_ENTRY_ID,
};
pub use errors::{Diagnostic, DiagnosticBag, Severity};
pub use registry::{ActorRegistry, VariableStore};
pub use span::Span;
