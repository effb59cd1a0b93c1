use thiserror::Error;

use super::expression::{Expression, ExpressionToken};
use super::statement::{ScriptTree, Statement, StatementId, StatementKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("line {0}: {1} statement outside of any block")]
    OutsideBlock(u32, &'static str),
    #[error("line {0}: second root block; a tree holds exactly one node")]
    SecondRoot(u32),
    #[error("line {0}: {1} is a block statement, use begin_block")]
    NotBasic(u32, &'static str),
    #[error("line {0}: {1} is a basic statement, use add")]
    NotBlock(u32, &'static str),
    #[error("no open block to close")]
    NothingOpen,
    #[error("{0} block(s) still open")]
    Unclosed(usize),
    #[error("empty tree")]
    Empty,
}

/// Builds a [`ScriptTree`] while a reader walks its source.
///
/// The builder keeps a stack of open blocks; `add` appends a basic statement
/// to the innermost one and `begin_block`/`end_block` push and pop.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    statements: Vec<Statement>,
    open: Vec<StatementId>,
    root: Option<StatementId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a block statement nested in the current block.
    pub fn begin_block(&mut self, kind: StatementKind, line: u32) -> Result<StatementId, BuildError> {
        if !kind.is_block() {
            return Err(BuildError::NotBlock(line, kind.name()));
        }
        let parent = self.open.last().copied();
        if parent.is_none() && self.root.is_some() {
            return Err(BuildError::SecondRoot(line));
        }
        let id = self.insert(kind, line, parent);
        if parent.is_none() {
            self.root = Some(id);
        }
        self.open.push(id);
        Ok(id)
    }

    /// Close the innermost open block.
    pub fn end_block(&mut self) -> Result<StatementId, BuildError> {
        self.open.pop().ok_or(BuildError::NothingOpen)
    }

    /// Append a basic statement to the innermost open block.
    pub fn add(&mut self, kind: StatementKind, line: u32) -> Result<StatementId, BuildError> {
        if kind.is_block() {
            return Err(BuildError::NotBasic(line, kind.name()));
        }
        let parent = match self.open.last() {
            Some(&p) => p,
            None => return Err(BuildError::OutsideBlock(line, kind.name())),
        };
        Ok(self.insert(kind, line, Some(parent)))
    }

    pub fn set_conditions(&mut self, id: StatementId, conditions: Expression) {
        self.statements[id.index()].conditions = Some(conditions);
    }

    pub fn set_expression(&mut self, id: StatementId, expression: Expression) {
        self.statements[id.index()].expression = Some(expression);
    }

    /// Append one token to a statement's payload, creating it if needed.
    pub fn push_expression_token(&mut self, id: StatementId, token: ExpressionToken) {
        self.statements[id.index()]
            .expression
            .get_or_insert_with(Expression::new)
            .push(token);
    }

    pub fn finish(self) -> Result<ScriptTree, BuildError> {
        if !self.open.is_empty() {
            return Err(BuildError::Unclosed(self.open.len()));
        }
        let root = self.root.ok_or(BuildError::Empty)?;
        Ok(ScriptTree {
            statements: self.statements,
            root,
        })
    }

    fn insert(&mut self, kind: StatementKind, line: u32, parent: Option<StatementId>) -> StatementId {
        let id = StatementId(self.statements.len() as u32);
        self.statements.push(Statement::new(kind, line, parent));
        if let Some(parent) = parent {
            self.statements[parent.index()].children.push(id);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::ast::expression::OperatorKind;

    fn conversation() -> StatementKind {
        StatementKind::Conversation {
            name: "Start".into(),
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn builds_nested_blocks_with_parents() {
        let mut b = TreeBuilder::new();
        let root = b.begin_block(conversation(), 1).unwrap();
        let set = b
            .add(
                StatementKind::Set {
                    variable: "gold".into(),
                    op: Default::default(),
                },
                2,
            )
            .unwrap();
        b.push_expression_token(set, ExpressionToken::Number(10.0));
        b.end_block().unwrap();
        let tree = b.finish().unwrap();

        assert_eq!(tree.root(), root);
        assert_eq!(tree.children(root), &[set]);
        assert_eq!(tree.parent(set), Some(root));
        assert_eq!(tree.get(set).payload().unwrap().tokens().len(), 1);
    }

    #[test]
    fn rejects_second_root() {
        let mut b = TreeBuilder::new();
        b.begin_block(conversation(), 1).unwrap();
        b.end_block().unwrap();
        assert_eq!(b.begin_block(conversation(), 9), Err(BuildError::SecondRoot(9)));
    }

    #[test]
    fn rejects_unclosed_and_misplaced() {
        let mut b = TreeBuilder::new();
        let jump = StatementKind::Call { name: "f".into() };
        assert!(matches!(b.add(jump, 1), Err(BuildError::OutsideBlock(1, "call"))));
        b.begin_block(conversation(), 1).unwrap();
        assert!(matches!(
            b.add(StatementKind::IfBlock, 2),
            Err(BuildError::NotBasic(2, "if block"))
        ));
        assert_eq!(b.finish().unwrap_err(), BuildError::Unclosed(1));
    }

    #[test]
    fn conditions_are_stored() {
        let mut b = TreeBuilder::new();
        b.begin_block(conversation(), 1).unwrap();
        let line = b
            .add(
                StatementKind::Line {
                    line_id: Some("line:1".into()),
                    hashtags: Vec::new(),
                },
                2,
            )
            .unwrap();
        b.set_conditions(
            line,
            Expression::from_tokens(vec![
                ExpressionToken::Bool(true),
                ExpressionToken::Operator {
                    kind: OperatorKind::Not,
                    arity: 1,
                },
            ]),
        );
        b.end_block().unwrap();
        assert!(b.finish().unwrap().get(line).has_conditions());
    }
}
