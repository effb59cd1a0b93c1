use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

use super::expression::{Expression, OperatorKind};

// ============================================================================
// Identifiers
// ============================================================================

/// Index of a statement inside its [`ScriptTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementId(pub(crate) u32);

impl StatementId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// Statement kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IfClauseKind {
    If,
    ElseIf,
    Else,
}

/// Commands the lowering engine treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `<<stop>>`: ends the conversation.
    Stop,
    /// `<<wait n>>`: delays the previous entry's transition.
    Wait,
    /// `<<seq ...>>` / `<<sequence ...>>`: raw transition directive.
    PlaySequence,
    /// Anything else, called as a Lua function of the same name.
    Custom,
}

impl CommandKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "stop" => CommandKind::Stop,
            "wait" => CommandKind::Wait,
            "seq" | "sequence" => CommandKind::PlaySequence,
            _ => CommandKind::Custom,
        }
    }
}

/// Argument piece of a command: literal text or an embedded `{expression}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandToken {
    Text(String),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JumpTarget {
    Node(String),
    /// `<<jump {$next}>>`; the graph cannot express a computed destination.
    Expression(Expression),
}

/// Assignment operator of a `set` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignOp {
    #[default]
    Assign,
    Add,
    Minus,
    Multiply,
    Divide,
}

impl AssignOp {
    pub fn from_operator(kind: OperatorKind) -> Option<Self> {
        match kind {
            OperatorKind::Assign => Some(AssignOp::Assign),
            OperatorKind::AddAssign => Some(AssignOp::Add),
            OperatorKind::MinusAssign => Some(AssignOp::Minus),
            OperatorKind::MultiplyAssign => Some(AssignOp::Multiply),
            OperatorKind::DivideAssign => Some(AssignOp::Divide),
            _ => None,
        }
    }

    /// Lua arithmetic operator applied before storing, if compound.
    pub fn lua_operator(self) -> Option<&'static str> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some("+"),
            AssignOp::Minus => Some("-"),
            AssignOp::Multiply => Some("*"),
            AssignOp::Divide => Some("/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    // Basic statements
    Line {
        line_id: Option<String>,
        hashtags: Vec<String>,
    },
    Command {
        name: String,
        kind: CommandKind,
        tokens: Vec<CommandToken>,
        raw_text: String,
    },
    Call {
        name: String,
    },
    Jump {
        destination: JumpTarget,
    },
    Set {
        variable: String,
        op: AssignOp,
    },
    Declare {
        variable: String,
    },

    // Block statements
    Conversation {
        name: String,
        headers: BTreeMap<String, String>,
    },
    IfBlock,
    IfClause {
        kind: IfClauseKind,
    },
    ShortcutOptionList,
    ShortcutOption,
}

impl StatementKind {
    pub fn command(name: impl Into<String>, tokens: Vec<CommandToken>, raw_text: impl Into<String>) -> Self {
        let name = name.into();
        StatementKind::Command {
            kind: CommandKind::from_name(&name),
            name,
            tokens,
            raw_text: raw_text.into(),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(
            self,
            StatementKind::Conversation { .. }
                | StatementKind::IfBlock
                | StatementKind::IfClause { .. }
                | StatementKind::ShortcutOptionList
                | StatementKind::ShortcutOption
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::Line { .. } => "line",
            StatementKind::Command { .. } => "command",
            StatementKind::Call { .. } => "call",
            StatementKind::Jump { .. } => "jump",
            StatementKind::Set { .. } => "set",
            StatementKind::Declare { .. } => "declare",
            StatementKind::Conversation { .. } => "node",
            StatementKind::IfBlock => "if block",
            StatementKind::IfClause { .. } => "if clause",
            StatementKind::ShortcutOptionList => "option list",
            StatementKind::ShortcutOption => "option",
        }
    }
}

/// A statement in the arena. Blocks own their children by id; every
/// non-root statement refers back to its enclosing block by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    /// 1-based source line.
    pub line: u32,
    pub parent: Option<StatementId>,
    pub children: Vec<StatementId>,
    /// Guard expression.
    pub conditions: Option<Expression>,
    /// Payload: assignment value, call, or interpolation arguments.
    pub expression: Option<Expression>,
}

impl Statement {
    pub(crate) fn new(kind: StatementKind, line: u32, parent: Option<StatementId>) -> Self {
        Self {
            kind,
            line,
            parent,
            children: Vec::new(),
            conditions: None,
            expression: None,
        }
    }

    pub fn has_conditions(&self) -> bool {
        self.conditions.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// The payload, when present and non-empty.
    pub fn payload(&self) -> Option<&Expression> {
        self.expression.as_ref().filter(|e| !e.is_empty())
    }
}

// ============================================================================
// Script tree
// ============================================================================

/// The statements of one conversation (script node), stored flat.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTree {
    pub(crate) statements: Vec<Statement>,
    pub(crate) root: StatementId,
}

impl ScriptTree {
    pub fn root(&self) -> StatementId {
        self.root
    }

    pub fn get(&self, id: StatementId) -> &Statement {
        &self.statements[id.index()]
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Name of the root conversation.
    pub fn name(&self) -> &str {
        match &self.get(self.root).kind {
            StatementKind::Conversation { name, .. } => name,
            _ => "",
        }
    }

    pub fn children(&self, id: StatementId) -> &[StatementId] {
        &self.get(id).children
    }

    pub fn parent(&self, id: StatementId) -> Option<StatementId> {
        self.get(id).parent
    }

    /// Enclosing blocks of `id`, nearest first.
    pub fn ancestors(&self, id: StatementId) -> impl Iterator<Item = StatementId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    pub fn enclosing_conversation(&self, id: StatementId) -> Option<StatementId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&a| matches!(self.get(a).kind, StatementKind::Conversation { .. }))
    }

    /// Whether `id` is the display line of a shortcut option.
    pub fn is_choice_line(&self, id: StatementId) -> bool {
        match self.parent(id) {
            Some(parent) => {
                matches!(self.get(parent).kind, StatementKind::ShortcutOption)
                    && self.children(parent).first() == Some(&id)
            }
            None => false,
        }
    }

    /// All statement ids in depth-first pre-order.
    pub fn preorder(&self) -> Vec<StatementId> {
        let mut order = Vec::with_capacity(self.statements.len());
        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            order.push(id);
            pending.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Check the structural invariants lowering relies on.
    pub fn validate(&self) -> Result<(), CompileError> {
        let conversation = self.name().to_string();
        let invalid = |stmt: &Statement, message: String| CompileError::InvalidAst {
            conversation: conversation.clone(),
            line: stmt.line,
            message,
        };

        let root = self.get(self.root);
        if !matches!(root.kind, StatementKind::Conversation { .. }) {
            return Err(invalid(
                root,
                format!("tree root must be a node, found {}", root.kind.name()),
            ));
        }

        for id in self.preorder() {
            let stmt = self.get(id);
            let parent_kind = stmt.parent.map(|p| &self.get(p).kind);
            match &stmt.kind {
                StatementKind::Conversation { .. } if id != self.root => {
                    return Err(invalid(stmt, "nested node".to_string()));
                }
                StatementKind::IfBlock => self.validate_if_block(stmt).map_err(|m| invalid(stmt, m))?,
                StatementKind::IfClause { .. } => {
                    if !matches!(parent_kind, Some(StatementKind::IfBlock)) {
                        return Err(invalid(stmt, "if clause outside of an if block".to_string()));
                    }
                }
                StatementKind::ShortcutOptionList => {
                    if stmt.children.is_empty() {
                        return Err(invalid(stmt, "option list without options".to_string()));
                    }
                    if let Some(&other) = stmt
                        .children
                        .iter()
                        .find(|&&c| !matches!(self.get(c).kind, StatementKind::ShortcutOption))
                    {
                        return Err(invalid(
                            stmt,
                            format!("option list contains a {}", self.get(other).kind.name()),
                        ));
                    }
                }
                StatementKind::ShortcutOption => {
                    if !matches!(parent_kind, Some(StatementKind::ShortcutOptionList)) {
                        return Err(invalid(stmt, "option outside of an option list".to_string()));
                    }
                    let first_is_line = stmt
                        .children
                        .first()
                        .is_some_and(|&c| matches!(self.get(c).kind, StatementKind::Line { .. }));
                    if !first_is_line {
                        return Err(invalid(stmt, "option does not start with its line".to_string()));
                    }
                }
                _ => {}
            }
            if !stmt.kind.is_block() && !stmt.children.is_empty() {
                return Err(invalid(
                    stmt,
                    format!("{} statement has children", stmt.kind.name()),
                ));
            }
        }
        Ok(())
    }

    fn validate_if_block(&self, stmt: &Statement) -> Result<(), String> {
        if stmt.children.is_empty() {
            return Err("if block without clauses".to_string());
        }
        let last = stmt.children.len() - 1;
        for (index, &child) in stmt.children.iter().enumerate() {
            let kind = match &self.get(child).kind {
                StatementKind::IfClause { kind } => *kind,
                other => return Err(format!("if block contains a {}", other.name())),
            };
            match kind {
                IfClauseKind::If if index != 0 => {
                    return Err("'if' clause after the first clause".to_string())
                }
                IfClauseKind::ElseIf | IfClauseKind::Else if index == 0 => {
                    return Err("if block must start with an 'if' clause".to_string())
                }
                IfClauseKind::Else if index != last => {
                    return Err("'else' clause must be the last clause".to_string())
                }
                _ => {}
            }
            let guarded = self.get(child).has_conditions();
            match kind {
                IfClauseKind::Else if guarded => {
                    return Err("'else' clause cannot have a condition".to_string())
                }
                IfClauseKind::If | IfClauseKind::ElseIf if !guarded => {
                    return Err("'if'/'elseif' clause without a condition".to_string())
                }
                _ => {}
            }
        }
        Ok(())
    }
}
