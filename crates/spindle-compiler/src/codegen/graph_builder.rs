//! Owns the entries and links of one conversation while it is lowered.

use spindle_common::{
    ActorId, ConditionPriority, Conversation, ConversationId, DialogueEntry, EntryId,
    FalseConditionAction, Link, START_ENTRY_ID,
};

/// Title of every conversation's root entry.
pub const START_TITLE: &str = "START";

/// Sequence of the root entry: nothing to play.
pub const START_SEQUENCE: &str = "None()";

/// Entries are stored in id order, so an id is also the entry's index.
#[derive(Debug)]
pub struct GraphBuilder {
    conversation: Conversation,
    speaker: ActorId,
    listener: ActorId,
}

impl GraphBuilder {
    /// A conversation holding only its START entry.
    ///
    /// `speaker`/`listener` are the default actor and conversant of every
    /// entry created afterwards.
    pub fn new(
        id: ConversationId,
        title: impl Into<String>,
        actor_id: ActorId,
        conversant_id: ActorId,
        speaker: ActorId,
        listener: ActorId,
    ) -> Self {
        let mut builder = Self {
            conversation: Conversation {
                id,
                title: title.into(),
                actor_id,
                conversant_id,
                entries: Vec::new(),
            },
            speaker,
            listener,
        };
        let start = builder.create_entry(START_TITLE);
        let entry = builder.entry_mut(start);
        entry.is_root = true;
        entry.sequence = START_SEQUENCE.to_string();
        builder
    }

    pub fn id(&self) -> ConversationId {
        self.conversation.id
    }

    pub fn start(&self) -> EntryId {
        START_ENTRY_ID
    }

    /// Id the next created entry will get.
    pub fn next_entry_id(&self) -> EntryId {
        self.conversation.entries.len() as EntryId
    }

    pub fn create_entry(&mut self, title: impl Into<String>) -> EntryId {
        let id = self.next_entry_id();
        let mut entry = DialogueEntry::new(id, self.conversation.id, title);
        entry.actor_id = self.speaker;
        entry.conversant_id = self.listener;
        self.conversation.entries.push(entry);
        id
    }

    pub fn entry(&self, id: EntryId) -> &DialogueEntry {
        &self.conversation.entries[id as usize]
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut DialogueEntry {
        &mut self.conversation.entries[id as usize]
    }

    /// Link two entries of this conversation.
    pub fn link(&mut self, from: EntryId, to: EntryId, priority: ConditionPriority) {
        let conversation = self.conversation.id;
        self.entry_mut(from).outgoing_links.push(Link {
            origin_conversation_id: conversation,
            origin_entry_id: from,
            destination_conversation_id: conversation,
            destination_entry_id: to,
            priority,
            is_connector: false,
        });
    }

    /// Link an entry of this conversation to an entry of another one.
    pub fn link_connector(&mut self, from: EntryId, conversation: ConversationId, to: EntryId) {
        let origin = self.conversation.id;
        self.entry_mut(from).outgoing_links.push(Link {
            origin_conversation_id: origin,
            origin_entry_id: from,
            destination_conversation_id: conversation,
            destination_entry_id: to,
            priority: ConditionPriority::Normal,
            is_connector: true,
        });
    }

    pub fn set_conditions(&mut self, id: EntryId, conditions: impl Into<String>, action: FalseConditionAction) {
        let entry = self.entry_mut(id);
        entry.conditions = conditions.into();
        entry.false_condition_action = action;
    }

    /// Add Lua statements to an entry's script, one per line.
    pub fn append_script(&mut self, id: EntryId, script: &str) {
        let entry = self.entry_mut(id);
        if !entry.user_script.is_empty() {
            entry.user_script.push('\n');
        }
        entry.user_script.push_str(script);
    }

    /// Add a sequencer command to an entry. A bare `Continue()` is replaced
    /// rather than run alongside it.
    pub fn append_sequence(&mut self, id: EntryId, sequence: &str) {
        let entry = self.entry_mut(id);
        if entry.sequence.is_empty() || entry.sequence == super::builtins::CONTINUE_SEQUENCE {
            entry.sequence = sequence.to_string();
        } else {
            entry.sequence.push_str("; ");
            entry.sequence.push_str(sequence);
        }
    }

    pub fn set_sequence(&mut self, id: EntryId, sequence: impl Into<String>) {
        self.entry_mut(id).sequence = sequence.into();
    }

    pub fn set_group(&mut self, id: EntryId) {
        self.entry_mut(id).is_group = true;
    }

    pub fn finish(self) -> Conversation {
        self.conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> GraphBuilder {
        GraphBuilder::new(3, "Shop", 1, 2, 2, 1)
    }

    #[test]
    fn starts_with_root_entry() {
        let graph = builder();
        assert_eq!(graph.start(), START_ENTRY_ID);
        let start = graph.entry(graph.start());
        assert!(start.is_root);
        assert_eq!(start.title, "START");
        assert_eq!(start.conversation_id, 3);
        assert_eq!(graph.next_entry_id(), 1);
    }

    #[test]
    fn entries_take_default_actors() {
        let mut graph = builder();
        let id = graph.create_entry("Line");
        assert_eq!(id, 1);
        assert_eq!(graph.entry(id).actor_id, 2);
        assert_eq!(graph.entry(id).conversant_id, 1);
    }

    #[test]
    fn links_and_connectors() {
        let mut graph = builder();
        let a = graph.create_entry("a");
        graph.link(graph.start(), a, ConditionPriority::BelowNormal);
        graph.link_connector(a, 7, START_ENTRY_ID);
        let conversation = graph.finish();

        let links: Vec<_> = conversation.links().collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].priority, ConditionPriority::BelowNormal);
        assert!(!links[0].is_connector);
        assert_eq!(links[1].destination_conversation_id, 7);
        assert!(links[1].is_connector);
    }

    #[test]
    fn scripts_and_sequences_accumulate() {
        let mut graph = builder();
        let a = graph.create_entry("a");
        graph.append_script(a, "x()");
        graph.append_script(a, "y()");
        assert_eq!(graph.entry(a).user_script, "x()\ny()");

        graph.set_sequence(a, "Continue()");
        graph.append_sequence(a, "Delay(2)");
        graph.append_sequence(a, "Fade(in)");
        assert_eq!(graph.entry(a).sequence, "Delay(2); Fade(in)");
    }
}
