//! Statement lowering: one script tree becomes one conversation graph.
//!
//! Every rule takes the entry flow currently continues from and returns
//! the entry flow continues from afterwards, so a block lowers its
//! children with a left-to-right fold.

use std::collections::BTreeMap;

use spindle_common::{
    ActorId, ActorRegistry, ConditionPriority, Conversation, ConversationId, EntryId,
    FalseConditionAction, START_ENTRY_ID,
};

use crate::ast::{
    AssignOp, CommandKind, IfClauseKind, JumpTarget, ScriptTree, Statement, StatementId,
    StatementKind,
};
use crate::error::{CompileError, Result};
use crate::lines::{self, LineTable};

use super::builtins::{
    ADD_FORMAT_ARG, CLEAR_AND_ADD_FORMAT_ARG, CONTINUE_SEQUENCE, STOP_CONVERSATION,
};
use super::commands;
use super::graph_builder::GraphBuilder;
use super::lua;

/// Node header naming the conversation's actor.
pub const ACTOR_HEADER: &str = "actor";
/// Node header naming the conversation's conversant.
pub const CONVERSANT_HEADER: &str = "conversant";

/// Read-only state shared by every conversation of a compilation.
pub struct LoweringContext<'a> {
    pub actors: &'a dyn ActorRegistry,
    /// Pre-allocated conversation ids, so jumps resolve in any order.
    pub conversations: &'a BTreeMap<String, ConversationId>,
    pub lines: &'a LineTable,
    pub default_locale: &'a str,
}

/// Lower one validated tree into a conversation with the given id.
pub fn lower_conversation(
    tree: &ScriptTree,
    id: ConversationId,
    ctx: &LoweringContext<'_>,
) -> Result<Conversation> {
    tree.validate()?;
    let mut emitter = Emitter::new(tree, id, ctx);
    let start = emitter.graph.start();
    emitter.lower_children(tree.root(), start)?;
    let conversation = emitter.graph.finish();
    tracing::debug!(
        conversation = %conversation.title,
        id,
        entries = conversation.entries.len(),
        "lowered conversation"
    );
    Ok(conversation)
}

struct Emitter<'t> {
    tree: &'t ScriptTree,
    ctx: &'t LoweringContext<'t>,
    graph: GraphBuilder,
    name: &'t str,
    player: ActorId,
    conversant: ActorId,
}

impl<'t> Emitter<'t> {
    fn new(tree: &'t ScriptTree, id: ConversationId, ctx: &'t LoweringContext<'t>) -> Self {
        let player = ctx.actors.player_actor();
        let npc = ctx.actors.default_actor();
        let (actor, conversant) = match &tree.get(tree.root()).kind {
            StatementKind::Conversation { headers, .. } => {
                let named = |key: &str| headers.get(key).and_then(|n| ctx.actors.actor_id(n));
                (
                    named(ACTOR_HEADER).unwrap_or(player),
                    named(CONVERSANT_HEADER).unwrap_or(npc),
                )
            }
            _ => (player, npc),
        };
        Self {
            tree,
            ctx,
            graph: GraphBuilder::new(id, tree.name(), actor, conversant, npc, player),
            name: tree.name(),
            player,
            conversant,
        }
    }

    fn lower(&mut self, id: StatementId, pred: EntryId) -> Result<EntryId> {
        let tree = self.tree;
        let stmt = tree.get(id);
        match &stmt.kind {
            StatementKind::Line { .. } => self.lower_line(id, pred, None),
            StatementKind::Command {
                name,
                kind,
                tokens,
                raw_text,
            } => match kind {
                CommandKind::PlaySequence => {
                    let directive = commands::sequence_directive(raw_text, tokens)
                        .map_err(|e| e.at(self.name, stmt.line))?;
                    self.graph.append_sequence(pred, &directive);
                    Ok(pred)
                }
                CommandKind::Wait => {
                    let directive =
                        commands::wait_directive(tokens).map_err(|e| e.at(self.name, stmt.line))?;
                    self.graph.append_sequence(pred, &directive);
                    Ok(pred)
                }
                CommandKind::Stop => {
                    let script = format!("{}()", STOP_CONVERSATION);
                    self.script_entry(stmt, pred, "Stop", &script)
                }
                CommandKind::Custom => {
                    let script = commands::command_call(name, tokens)
                        .map_err(|e| e.at(self.name, stmt.line))?;
                    self.script_entry(stmt, pred, "Run Command", &script)
                }
            },
            StatementKind::Call { name } => {
                let payload = stmt.payload().ok_or_else(|| CompileError::MalformedExpression {
                    conversation: self.name.to_string(),
                    line: stmt.line,
                    message: format!("call of '{}' without a function expression", name),
                })?;
                let script =
                    lua::generate_single(payload).map_err(|e| e.at(self.name, stmt.line))?;
                self.script_entry(stmt, pred, "Call Function", &script)
            }
            StatementKind::Jump { destination } => self.lower_jump(stmt, destination, pred),
            StatementKind::Set { variable, op } => self.lower_assignment(stmt, variable, *op, pred),
            StatementKind::Declare { variable } => {
                self.lower_assignment(stmt, variable, AssignOp::Assign, pred)
            }
            StatementKind::IfBlock => self.lower_if_block(id, pred),
            StatementKind::ShortcutOptionList => self.lower_option_list(id, pred),
            StatementKind::Conversation { .. }
            | StatementKind::IfClause { .. }
            | StatementKind::ShortcutOption => Err(self.invalid(
                stmt,
                format!("{} cannot be lowered outside its owning block", stmt.kind.name()),
            )),
        }
    }

    fn lower_children(&mut self, block: StatementId, pred: EntryId) -> Result<EntryId> {
        let tree = self.tree;
        self.lower_sequence(tree.children(block), pred)
    }

    fn lower_sequence(&mut self, statements: &[StatementId], pred: EntryId) -> Result<EntryId> {
        statements
            .iter()
            .try_fold(pred, |current, &id| self.lower(id, current))
    }

    /// `choice_of` is the option whose display line this is.
    fn lower_line(
        &mut self,
        id: StatementId,
        pred: EntryId,
        choice_of: Option<StatementId>,
    ) -> Result<EntryId> {
        let (tree, ctx) = (self.tree, self.ctx);
        let stmt = tree.get(id);
        let StatementKind::Line { line_id, hashtags } = &stmt.kind else {
            return Err(self.invalid(stmt, format!("expected a line, found {}", stmt.kind.name())));
        };

        let title = if choice_of.is_some() {
            "Shortcut Option Start"
        } else {
            "Line"
        };
        let entry = self.graph.create_entry(title);

        let mut speaker = None;
        match ctx.lines.resolve(line_id.as_deref(), self.name, stmt.line) {
            Some((_, text)) => {
                let default_text =
                    lines::default_text(text, ctx.default_locale).unwrap_or_default();
                speaker = lines::split_speaker(default_text).0;
                let sequence = lines::sequence_markup(default_text);

                let dialogue_text = text
                    .iter()
                    .map(|(locale, t)| (locale.clone(), lines::split_speaker(t).1.to_string()))
                    .collect();
                let e = self.graph.entry_mut(entry);
                e.dialogue_text = dialogue_text;
                if let Some(sequence) = sequence {
                    e.sequence = sequence;
                }
            }
            None => tracing::debug!(
                conversation = self.name,
                line = stmt.line,
                "no localized text for line"
            ),
        }

        let (actor, conversant) = if choice_of.is_some() {
            (self.player, self.conversant)
        } else {
            let actor = speaker
                .and_then(|name| ctx.actors.actor_id(name))
                .unwrap_or_else(|| ctx.actors.default_actor());
            let conversant = if actor == self.player {
                self.conversant
            } else {
                self.player
            };
            (actor, conversant)
        };
        let e = self.graph.entry_mut(entry);
        e.actor_id = actor;
        e.conversant_id = conversant;
        e.tags = hashtags.clone();

        let guard_source = match choice_of {
            Some(option) if !stmt.has_conditions() => tree.get(option),
            _ => stmt,
        };
        if let Some(guard) = self.guard(guard_source)? {
            let action = if choice_of.is_some() {
                FalseConditionAction::Block
            } else {
                FalseConditionAction::Passthrough
            };
            self.graph.set_conditions(entry, guard, action);
        }

        if let Some(payload) = stmt.payload() {
            let fragments =
                lua::generate_all(payload).map_err(|e| e.at(self.name, stmt.line))?;
            let conversation = self.graph.id();
            for (index, fragment) in fragments.iter().enumerate() {
                let function = if index == 0 {
                    CLEAR_AND_ADD_FORMAT_ARG
                } else {
                    ADD_FORMAT_ARG
                };
                let script = format!(
                    "{}({}, {}, tostring({}))",
                    function, conversation, entry, fragment
                );
                self.graph.append_script(pred, &script);
            }
        }

        self.graph.link(pred, entry, ConditionPriority::Normal);
        Ok(entry)
    }

    fn lower_assignment(
        &mut self,
        stmt: &Statement,
        variable: &str,
        op: AssignOp,
        pred: EntryId,
    ) -> Result<EntryId> {
        let payload = stmt.payload().ok_or_else(|| CompileError::MalformedExpression {
            conversation: self.name.to_string(),
            line: stmt.line,
            message: format!("assignment to '{}' without a value", variable),
        })?;
        let value = lua::generate_single(payload).map_err(|e| e.at(self.name, stmt.line))?;
        let target = lua::variable(variable);
        let script = match op.lua_operator() {
            None => format!("{} = {}", target, value),
            Some(symbol) => format!("{} = {} {} ({})", target, target, symbol, value),
        };
        self.script_entry(stmt, pred, "Store Variable", &script)
    }

    fn lower_jump(&mut self, stmt: &Statement, destination: &JumpTarget, pred: EntryId) -> Result<EntryId> {
        let target = match destination {
            JumpTarget::Node(name) => name,
            JumpTarget::Expression(_) => {
                return Err(self.unsupported(stmt, "jump to a computed destination".to_string()))
            }
        };
        let Some(&destination) = self.ctx.conversations.get(target) else {
            return Err(self.unsupported(stmt, format!("jump to unknown node '{}'", target)));
        };

        let jump = self.script_entry(stmt, pred, "Jump to Conversation", "")?;
        self.graph.link_connector(jump, destination, START_ENTRY_ID);

        // Statements after a jump still need a home in the graph.
        let unreachable = self.graph.create_entry("Unreachable Entry");
        self.graph
            .set_conditions(unreachable, "false", FalseConditionAction::Block);
        self.graph
            .link(jump, unreachable, ConditionPriority::BelowNormal);
        Ok(unreachable)
    }

    fn lower_if_block(&mut self, id: StatementId, pred: EntryId) -> Result<EntryId> {
        let start = self.control_entry("If Block Start");
        self.graph.set_group(start);
        self.graph.link(pred, start, ConditionPriority::Normal);
        let end = self.control_entry("If Block End");

        let mut clause_starts = Vec::new();
        let mut clause_ends = Vec::new();
        let mut fallbacks = Vec::new();
        let tree = self.tree;
        for &clause in tree.children(id) {
            let stmt = tree.get(clause);
            let label = match &stmt.kind {
                StatementKind::IfClause { kind } => clause_label(*kind),
                other => {
                    return Err(self.invalid(stmt, format!("if block contains a {}", other.name())))
                }
            };
            let clause_start = self.control_entry(&format!("{} Clause Start", label));
            let clause_end = self.control_entry(&format!("{} Clause End", label));
            let exit = self.lower_children(clause, clause_start)?;
            self.graph.link(exit, clause_end, ConditionPriority::Normal);

            if let Some(guard) = self.guard(stmt)? {
                self.graph
                    .set_conditions(clause_start, guard, FalseConditionAction::Block);
                fallbacks.push(self.control_entry(&format!("{} Clause Fallback", label)));
            }
            clause_starts.push(clause_start);
            clause_ends.push(clause_end);
        }

        // Every guarded clause gets a fallback tried after its own condition;
        // it leads to the next clause, or out of the block after the last.
        let mut previous = start;
        for (index, (&clause_start, &clause_end)) in
            clause_starts.iter().zip(&clause_ends).enumerate()
        {
            if index == 0 {
                self.graph.link(start, clause_start, ConditionPriority::Normal);
            }
            if let Some(&fallback) = fallbacks.get(index) {
                self.graph
                    .link(previous, fallback, ConditionPriority::BelowNormal);
                let next = clause_starts.get(index + 1).copied().unwrap_or(end);
                self.graph.link(fallback, next, ConditionPriority::Normal);
                self.graph.set_group(previous);
                previous = fallback;
            }
            self.graph.link(clause_end, end, ConditionPriority::Normal);
        }

        Ok(end)
    }

    fn lower_option_list(&mut self, id: StatementId, pred: EntryId) -> Result<EntryId> {
        let tree = self.tree;
        let options = tree.children(id);

        let start = self.control_entry("Shortcut Option List Start");
        if options.len() > 1 {
            self.graph.set_group(start);
        }
        self.graph.link(pred, start, ConditionPriority::Normal);
        let end = self.control_entry("Shortcut Option List End");

        let mut all_guarded = true;
        for &option in options {
            let Some((&line, body)) = tree.children(option).split_first() else {
                return Err(self.invalid(tree.get(option), "option without a line".to_string()));
            };
            let head = self.lower_line(line, start, Some(option))?;
            if !self.graph.entry(head).has_conditions() {
                all_guarded = false;
            }
            let exit = self.lower_sequence(body, head)?;
            self.graph.link(exit, end, ConditionPriority::Normal);
        }

        // Lets the menu fall through when no option qualifies.
        if all_guarded {
            self.graph.link(start, end, ConditionPriority::BelowNormal);
        }
        Ok(end)
    }

    /// An entry that runs `script` and advances. Conditions on the statement
    /// guard it without blocking the flow.
    fn script_entry(&mut self, stmt: &Statement, pred: EntryId, title: &str, script: &str) -> Result<EntryId> {
        let entry = self.control_entry(title);
        if !script.is_empty() {
            self.graph.append_script(entry, script);
        }
        if let Some(guard) = self.guard(stmt)? {
            self.graph
                .set_conditions(entry, guard, FalseConditionAction::Passthrough);
        }
        self.graph.link(pred, entry, ConditionPriority::Normal);
        Ok(entry)
    }

    fn control_entry(&mut self, title: &str) -> EntryId {
        let entry = self.graph.create_entry(title);
        self.graph.set_sequence(entry, CONTINUE_SEQUENCE);
        entry
    }

    fn guard(&self, stmt: &Statement) -> Result<Option<String>> {
        match &stmt.conditions {
            Some(conditions) if !conditions.is_empty() => lua::generate_single(conditions)
                .map(Some)
                .map_err(|e| e.at(self.name, stmt.line)),
            _ => Ok(None),
        }
    }

    fn invalid(&self, stmt: &Statement, message: String) -> CompileError {
        CompileError::InvalidAst {
            conversation: self.name.to_string(),
            line: stmt.line,
            message,
        }
    }

    fn unsupported(&self, stmt: &Statement, message: String) -> CompileError {
        CompileError::Unsupported {
            conversation: self.name.to_string(),
            line: stmt.line,
            message,
        }
    }
}

fn clause_label(kind: IfClauseKind) -> &'static str {
    match kind {
        IfClauseKind::If => "If",
        IfClauseKind::ElseIf => "ElseIf",
        IfClauseKind::Else => "Else",
    }
}
