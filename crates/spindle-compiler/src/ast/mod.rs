pub mod builder;
pub mod expression;
pub mod statement;
pub mod visitor;

pub use builder::{BuildError, TreeBuilder};
pub use expression::{Expr, Expression, ExpressionToken, Literal, OperatorKind};
pub use statement::*;
