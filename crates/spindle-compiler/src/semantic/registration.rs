//! Pre-pass seeding the variable store and actor registry.
//!
//! Runs once over every tree before any conversation is lowered; lowering
//! only reads what this pass creates.

use serde_json::Value;
use spindle_common::{
    ActorRegistry, Diagnostic, DiagnosticBag, Span, VariableDefinition, VariableKind,
    VariableStore,
};

use crate::ast::visitor::Visitor;
use crate::ast::{Expression, ExpressionToken, Literal, ScriptTree, StatementId, StatementKind};
use crate::codegen::emitter::{ACTOR_HEADER, CONVERSANT_HEADER};
use crate::lines::{self, LineTable};
use crate::reader::ScriptUnit;

/// A `declare` or `set` found while scanning.
#[derive(Debug)]
struct Site {
    variable: String,
    file: String,
    conversation: String,
    line: u32,
    inferred: (VariableKind, Value),
}

struct Collector<'u> {
    file: &'u str,
    lines: &'u LineTable,
    default_locale: &'u str,
    declares: Vec<Site>,
    sets: Vec<Site>,
    /// `(name, is_player)` in the order first seen.
    actors: Vec<(String, bool)>,
}

impl Collector<'_> {
    fn site(&self, tree: &ScriptTree, id: StatementId, variable: &str, inferred: (VariableKind, Value)) -> Site {
        Site {
            variable: variable.to_string(),
            file: self.file.to_string(),
            conversation: tree.name().to_string(),
            line: tree.get(id).line,
            inferred,
        }
    }

    fn actor(&mut self, name: &str, is_player: bool) {
        if !self.actors.iter().any(|(n, _)| n == name) {
            self.actors.push((name.to_string(), is_player));
        }
    }
}

impl Visitor for Collector<'_> {
    fn visit_tree(&mut self, tree: &ScriptTree) {
        if let StatementKind::Conversation { headers, .. } = &tree.get(tree.root()).kind {
            if let Some(name) = headers.get(ACTOR_HEADER) {
                self.actor(name, true);
            }
            if let Some(name) = headers.get(CONVERSANT_HEADER) {
                self.actor(name, false);
            }
        }
        self.visit_statement(tree, tree.root());
    }

    fn visit_line(&mut self, tree: &ScriptTree, id: StatementId) {
        // Choice lines are always spoken by the player.
        if tree.is_choice_line(id) {
            return;
        }
        let stmt = tree.get(id);
        let StatementKind::Line { line_id, .. } = &stmt.kind else {
            return;
        };
        let (table, locale) = (self.lines, self.default_locale);
        let speaker = table
            .resolve(line_id.as_deref(), tree.name(), stmt.line)
            .and_then(|(_, text)| lines::default_text(text, locale))
            .and_then(|text| lines::split_speaker(text).0);
        if let Some(name) = speaker {
            self.actor(name, false);
        }
    }

    fn visit_set(&mut self, tree: &ScriptTree, id: StatementId) {
        if let StatementKind::Set { variable, .. } = &tree.get(id).kind {
            let site = self.site(tree, id, variable, (VariableKind::Text, Value::String(String::new())));
            self.sets.push(site);
        }
    }

    fn visit_declare(&mut self, tree: &ScriptTree, id: StatementId) {
        let stmt = tree.get(id);
        if let StatementKind::Declare { variable } = &stmt.kind {
            let site = self.site(tree, id, variable, infer_declaration(stmt.payload()));
            self.declares.push(site);
        }
    }
}

/// Type and default value of a declared variable.
///
/// The type comes from the first token in push order. The default is the
/// literal the payload reduces to when it matches that type, else the
/// type's neutral value (`false`, `0`, `""`).
pub fn infer_declaration(payload: Option<&Expression>) -> (VariableKind, Value) {
    let first = payload.and_then(Expression::first_token);
    let constant = payload
        .and_then(|e| e.to_trees().ok())
        .and_then(|trees| match trees.as_slice() {
            [single] => single.constant(),
            _ => None,
        });

    match (first, constant) {
        (Some(ExpressionToken::Bool(_)), Some(Literal::Bool(v))) => (VariableKind::Boolean, Value::Bool(v)),
        (Some(ExpressionToken::Bool(_)), _) => (VariableKind::Boolean, Value::Bool(false)),
        (Some(ExpressionToken::Number(_)), Some(Literal::Number(v))) => (VariableKind::Number, number(v)),
        (Some(ExpressionToken::Number(_)), _) => (VariableKind::Number, Value::from(0)),
        (Some(ExpressionToken::Text(_)), Some(Literal::Text(v))) => (VariableKind::Text, Value::String(v)),
        _ => (VariableKind::Text, Value::String(String::new())),
    }
}

fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }
}

/// Register every actor and variable the units mention.
///
/// Actors come first (node headers, then speaker prefixes). Then every
/// `declare`, then every `set` on a still-unknown name, each group sorted by
/// variable name. An existing name is never redefined.
pub fn register<R>(units: &[ScriptUnit], registry: &mut R, default_locale: &str) -> DiagnosticBag
where
    R: ActorRegistry + VariableStore,
{
    let mut diagnostics = DiagnosticBag::new();
    let mut declares = Vec::new();
    let mut sets = Vec::new();
    let mut actors: Vec<(String, bool)> = Vec::new();

    for unit in units {
        let mut collector = Collector {
            file: &unit.file,
            lines: &unit.lines,
            default_locale,
            declares: Vec::new(),
            sets: Vec::new(),
            actors: Vec::new(),
        };
        for tree in &unit.trees {
            collector.visit_tree(tree);
        }
        declares.append(&mut collector.declares);
        sets.append(&mut collector.sets);
        for actor in collector.actors {
            if !actors.iter().any(|(n, _)| *n == actor.0) {
                actors.push(actor);
            }
        }
    }

    for (name, is_player) in actors {
        let id = registry.get_or_create_actor(&name, is_player);
        tracing::debug!(actor = %name, id, "registered actor");
    }

    declares.sort_by(|a, b| a.variable.cmp(&b.variable));
    sets.sort_by(|a, b| a.variable.cmp(&b.variable));

    for site in declares {
        let (kind, value) = site.inferred;
        if let Some(existing) = registry.variable(&site.variable) {
            if existing.kind != kind {
                tracing::warn!(
                    variable = %site.variable,
                    existing = ?existing.kind,
                    declared = ?kind,
                    "conflicting declaration ignored"
                );
                diagnostics.report(
                    Diagnostic::warning(format!(
                        "'{}' is already declared as {:?}; this declaration as {:?} is ignored",
                        site.variable, existing.kind, kind
                    ))
                    .with_span(Span::new(site.file, site.line))
                    .with_conversation(site.conversation),
                );
            }
            continue;
        }
        tracing::debug!(variable = %site.variable, kind = ?kind, "declared variable");
        registry.define_variable(VariableDefinition::new(site.variable, kind, value));
    }

    for site in sets {
        if registry.define_variable(VariableDefinition::empty_text(&site.variable)) {
            tracing::debug!(variable = %site.variable, "registered undeclared variable");
        }
    }

    diagnostics
}
