//! Shared actor and variable registries.
//!
//! The registration pass writes through these traits; lowering only reads.

use crate::database::{Actor, ActorId, DialogueDatabase, VariableDefinition};

/// Actor lookup and "create if absent" registration.
pub trait ActorRegistry {
    fn get_or_create_actor(&mut self, name: &str, is_player: bool) -> ActorId;
    fn actor_id(&self, name: &str) -> Option<ActorId>;
    fn default_actor(&self) -> ActorId;
    fn player_actor(&self) -> ActorId;
}

/// Variable store where the first definition of a name wins.
pub trait VariableStore {
    fn variable(&self, name: &str) -> Option<&VariableDefinition>;

    /// Adds `definition` unless its name is already present.
    /// Returns whether the store changed.
    fn define_variable(&mut self, definition: VariableDefinition) -> bool;

    fn contains_variable(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }
}

impl ActorRegistry for DialogueDatabase {
    fn get_or_create_actor(&mut self, name: &str, is_player: bool) -> ActorId {
        if let Some(id) = self.actor_id(name) {
            return id;
        }
        let id = self.actors.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        self.actors.push(Actor {
            id,
            name: name.to_string(),
            is_player,
        });
        id
    }

    fn actor_id(&self, name: &str) -> Option<ActorId> {
        self.actors.iter().find(|a| a.name == name).map(|a| a.id)
    }

    fn default_actor(&self) -> ActorId {
        self.metadata.default_actor_id
    }

    fn player_actor(&self) -> ActorId {
        self.metadata.player_actor_id
    }
}

impl VariableStore for DialogueDatabase {
    fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|v| v.name == name)
    }

    fn define_variable(&mut self, definition: VariableDefinition) -> bool {
        if self.contains_variable(&definition.name) {
            return false;
        }
        self.variables.push(definition);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::VariableKind;

    fn db() -> DialogueDatabase {
        DialogueDatabase::new("en", Vec::new(), "Player", "NPC")
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut db = db();
        let mae = db.get_or_create_actor("Mae", false);
        assert_eq!(mae, 3);
        assert_eq!(db.get_or_create_actor("Mae", false), mae);
        assert_eq!(db.actors.len(), 3);
        assert_eq!(db.actor_id("Player"), Some(db.player_actor()));
    }

    #[test]
    fn first_definition_wins() {
        let mut db = db();
        assert!(db.define_variable(VariableDefinition::new(
            "count",
            VariableKind::Number,
            serde_json::json!(0.0)
        )));
        assert!(!db.define_variable(VariableDefinition::empty_text("count")));
        assert_eq!(db.variable("count").unwrap().kind, VariableKind::Number);
    }
}
