use super::statement::{ScriptTree, StatementId, StatementKind};

/// Visitor trait for walking a statement tree.
///
/// Default implementations walk children depth-first; override specific
/// methods to add behavior at particular statement kinds.
pub trait Visitor {
    fn visit_tree(&mut self, tree: &ScriptTree) {
        self.visit_statement(tree, tree.root());
    }

    fn visit_statement(&mut self, tree: &ScriptTree, id: StatementId) {
        match &tree.get(id).kind {
            StatementKind::Line { .. } => self.visit_line(tree, id),
            StatementKind::Command { .. } => self.visit_command(tree, id),
            StatementKind::Call { .. } => self.visit_call(tree, id),
            StatementKind::Jump { .. } => self.visit_jump(tree, id),
            StatementKind::Set { .. } => self.visit_set(tree, id),
            StatementKind::Declare { .. } => self.visit_declare(tree, id),
            StatementKind::Conversation { .. }
            | StatementKind::IfBlock
            | StatementKind::IfClause { .. }
            | StatementKind::ShortcutOptionList
            | StatementKind::ShortcutOption => self.visit_block(tree, id),
        }
    }

    fn visit_block(&mut self, tree: &ScriptTree, id: StatementId) {
        for &child in tree.children(id) {
            self.visit_statement(tree, child);
        }
    }

    fn visit_line(&mut self, _tree: &ScriptTree, _id: StatementId) {}
    fn visit_command(&mut self, _tree: &ScriptTree, _id: StatementId) {}
    fn visit_call(&mut self, _tree: &ScriptTree, _id: StatementId) {}
    fn visit_jump(&mut self, _tree: &ScriptTree, _id: StatementId) {}
    fn visit_set(&mut self, _tree: &ScriptTree, _id: StatementId) {}
    fn visit_declare(&mut self, _tree: &ScriptTree, _id: StatementId) {}
}
