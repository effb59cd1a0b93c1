//! Ingest of reader bundles: the JSON form of parsed scripts.
//!
//! A bundle holds one unit per script file: its nodes as statement trees,
//! the `(node, line) -> line id` table and the localized strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{
    AssignOp, BuildError, CommandToken, Expression, IfClauseKind, JumpTarget, OperatorKind,
    ScriptTree, StatementKind, TreeBuilder,
};
use crate::lines::{LineTable, LocalizedText};

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("invalid bundle: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{file}: {source}")]
    Structure {
        file: String,
        #[source]
        source: BuildError,
    },

    #[error("{file}:{line}: {message}")]
    Invalid {
        file: String,
        line: u32,
        message: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptBundle {
    #[serde(default)]
    pub units: Vec<SourceUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUnit {
    pub file: String,
    #[serde(default)]
    pub conversations: Vec<StatementNode>,
    #[serde(default)]
    pub line_ids: Vec<LineIdEntry>,
    #[serde(default)]
    pub strings: BTreeMap<String, LocalizedText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineIdEntry {
    pub conversation: String,
    pub line: u32,
    pub line_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementNode {
    pub kind: NodeKind,
    #[serde(default)]
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StatementNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Node {
        name: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    Line {
        #[serde(default)]
        line_id: Option<String>,
        #[serde(default)]
        hashtags: Vec<String>,
    },
    Command {
        name: String,
        #[serde(default)]
        arguments: Vec<CommandToken>,
        /// Full command text, name included.
        #[serde(default)]
        text: String,
    },
    Call {
        name: String,
    },
    /// `node` names the destination; without it the statement's
    /// expression computes one.
    Jump {
        #[serde(default)]
        node: Option<String>,
    },
    Set {
        variable: String,
        #[serde(default = "assign_symbol")]
        operator: String,
    },
    Declare {
        variable: String,
    },
    If,
    IfClause {
        clause: IfClauseKind,
    },
    Options,
    Option,
}

fn assign_symbol() -> String {
    "=".to_string()
}

/// One script file, ready for registration and lowering.
#[derive(Debug, Clone)]
pub struct ScriptUnit {
    pub file: String,
    pub trees: Vec<ScriptTree>,
    pub lines: LineTable,
}

impl ScriptBundle {
    pub fn from_json(json: &str) -> Result<Self, ReaderError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_units(self) -> Result<Vec<ScriptUnit>, ReaderError> {
        self.units.into_iter().map(SourceUnit::into_script_unit).collect()
    }
}

/// Parse a bundle and build every unit's trees.
pub fn read_bundle(json: &str) -> Result<Vec<ScriptUnit>, ReaderError> {
    ScriptBundle::from_json(json)?.into_units()
}

impl SourceUnit {
    pub fn into_script_unit(self) -> Result<ScriptUnit, ReaderError> {
        let mut lines = LineTable::new();
        for entry in self.line_ids {
            lines.insert_id(entry.conversation, entry.line, entry.line_id);
        }
        for (line_id, text) in self.strings {
            lines.insert_text(line_id, text);
        }

        let trees = self
            .conversations
            .iter()
            .map(|root| build_tree(&self.file, root))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ScriptUnit {
            file: self.file,
            trees,
            lines,
        })
    }
}

fn build_tree(file: &str, root: &StatementNode) -> Result<ScriptTree, ReaderError> {
    let mut builder = TreeBuilder::new();
    push_node(&mut builder, file, root)?;
    builder.finish().map_err(|source| structure(file, source))
}

fn push_node(builder: &mut TreeBuilder, file: &str, node: &StatementNode) -> Result<(), ReaderError> {
    let kind = statement_kind(file, node)?;
    let is_block = kind.is_block();
    let id = if is_block {
        builder.begin_block(kind, node.line)
    } else {
        if !node.children.is_empty() {
            return Err(ReaderError::Invalid {
                file: file.to_string(),
                line: node.line,
                message: format!("{} statement has children", kind.name()),
            });
        }
        builder.add(kind, node.line)
    }
    .map_err(|source| structure(file, source))?;

    if let Some(conditions) = &node.conditions {
        builder.set_conditions(id, conditions.clone());
    }
    if let Some(expression) = &node.expression {
        builder.set_expression(id, expression.clone());
    }

    if is_block {
        for child in &node.children {
            push_node(builder, file, child)?;
        }
        builder.end_block().map_err(|source| structure(file, source))?;
    }
    Ok(())
}

fn statement_kind(file: &str, node: &StatementNode) -> Result<StatementKind, ReaderError> {
    let invalid = |message: String| ReaderError::Invalid {
        file: file.to_string(),
        line: node.line,
        message,
    };

    let kind = match &node.kind {
        NodeKind::Node { name, headers } => StatementKind::Conversation {
            name: name.clone(),
            headers: headers.clone(),
        },
        NodeKind::Line { line_id, hashtags } => StatementKind::Line {
            line_id: line_id.clone(),
            hashtags: hashtags.clone(),
        },
        NodeKind::Command {
            name,
            arguments,
            text,
        } => {
            let raw_text = if text.is_empty() { name.clone() } else { text.clone() };
            StatementKind::command(name.clone(), arguments.clone(), raw_text)
        }
        NodeKind::Call { name } => StatementKind::Call { name: name.clone() },
        NodeKind::Jump { node: Some(target) } => StatementKind::Jump {
            destination: JumpTarget::Node(target.clone()),
        },
        NodeKind::Jump { node: None } => match &node.expression {
            Some(expression) if !expression.is_empty() => StatementKind::Jump {
                destination: JumpTarget::Expression(expression.clone()),
            },
            _ => return Err(invalid("jump without a destination".to_string())),
        },
        NodeKind::Set { variable, operator } => {
            let op = OperatorKind::from_symbol(operator)
                .and_then(AssignOp::from_operator)
                .ok_or_else(|| invalid(format!("'{}' is not an assignment operator", operator)))?;
            StatementKind::Set {
                variable: variable.clone(),
                op,
            }
        }
        NodeKind::Declare { variable } => StatementKind::Declare {
            variable: variable.clone(),
        },
        NodeKind::If => StatementKind::IfBlock,
        NodeKind::IfClause { clause } => StatementKind::IfClause { kind: *clause },
        NodeKind::Options => StatementKind::ShortcutOptionList,
        NodeKind::Option => StatementKind::ShortcutOption,
    };
    Ok(kind)
}

fn structure(file: &str, source: BuildError) -> ReaderError {
    ReaderError::Structure {
        file: file.to_string(),
        source,
    }
}
