use serde::{Deserialize, Serialize};

use crate::error::ExprError;

// ============================================================================
// Tokens
// ============================================================================

/// Built-in operators of the narrative script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    EqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    NotEqualTo,
    Or,
    And,
    Xor,
    Not,
    UnaryMinus,
    Add,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Assign,
    AddAssign,
    MinusAssign,
    MultiplyAssign,
    DivideAssign,
}

impl OperatorKind {
    /// Resolve a script operator symbol (`==`, `is`, `gte`, `and`, ...).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let kind = match symbol {
            "==" | "eq" | "is" => OperatorKind::EqualTo,
            ">" | "gt" => OperatorKind::GreaterThan,
            ">=" | "gte" => OperatorKind::GreaterThanOrEqualTo,
            "<" | "lt" => OperatorKind::LessThan,
            "<=" | "lte" => OperatorKind::LessThanOrEqualTo,
            "!=" | "neq" => OperatorKind::NotEqualTo,
            "||" | "or" => OperatorKind::Or,
            "&&" | "and" => OperatorKind::And,
            "^" | "xor" => OperatorKind::Xor,
            "!" | "not" => OperatorKind::Not,
            "=" | "to" => OperatorKind::Assign,
            "+" => OperatorKind::Add,
            "-" => OperatorKind::Minus,
            "*" => OperatorKind::Multiply,
            "/" => OperatorKind::Divide,
            "%" => OperatorKind::Modulo,
            "+=" => OperatorKind::AddAssign,
            "-=" => OperatorKind::MinusAssign,
            "*=" => OperatorKind::MultiplyAssign,
            "/=" => OperatorKind::DivideAssign,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_unary(self) -> bool {
        matches!(self, OperatorKind::Not | OperatorKind::UnaryMinus)
    }

    pub fn is_compound_assign(self) -> bool {
        matches!(
            self,
            OperatorKind::AddAssign
                | OperatorKind::MinusAssign
                | OperatorKind::MultiplyAssign
                | OperatorKind::DivideAssign
        )
    }

    /// Whether a token of this kind may carry `arity` operands.
    /// `Minus` doubles as negation when the reader tags it with arity 1.
    pub fn accepts_arity(self, arity: usize) -> bool {
        match self {
            OperatorKind::Minus => arity == 1 || arity == 2,
            k if k.is_unary() => arity == 1,
            _ => arity == 2,
        }
    }
}

impl std::fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            OperatorKind::EqualTo => "==",
            OperatorKind::GreaterThan => ">",
            OperatorKind::GreaterThanOrEqualTo => ">=",
            OperatorKind::LessThan => "<",
            OperatorKind::LessThanOrEqualTo => "<=",
            OperatorKind::NotEqualTo => "!=",
            OperatorKind::Or => "||",
            OperatorKind::And => "&&",
            OperatorKind::Xor => "^",
            OperatorKind::Not => "!",
            OperatorKind::UnaryMinus | OperatorKind::Minus => "-",
            OperatorKind::Add => "+",
            OperatorKind::Multiply => "*",
            OperatorKind::Divide => "/",
            OperatorKind::Modulo => "%",
            OperatorKind::Assign => "=",
            OperatorKind::AddAssign => "+=",
            OperatorKind::MinusAssign => "-=",
            OperatorKind::MultiplyAssign => "*=",
            OperatorKind::DivideAssign => "/=",
        };
        f.write_str(symbol)
    }
}

/// One element of a stack-evaluable expression plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionToken {
    Bool(bool),
    Number(f64),
    Null,
    Text(String),
    Variable(String),
    Function { name: String, arity: usize },
    Operator { kind: OperatorKind, arity: usize },
    /// An explicit source parenthesis around the previous operand.
    ParenGroup,
}

/// Tokens of one or more expressions, in push order.
///
/// The reader pushes tokens while visiting the expression tree in post-order,
/// so read as a stack from its top every operator or function token precedes
/// the tokens of its own operands. A binary operator's left operand is pushed
/// before its right operand; function arguments are pushed left to right.
///
/// Line interpolation stores one complete expression per `{}` site side by
/// side in a single `Expression`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression {
    tokens: Vec<ExpressionToken>,
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens(tokens: Vec<ExpressionToken>) -> Self {
        Self { tokens }
    }

    pub fn push(&mut self, token: ExpressionToken) {
        self.tokens.push(token);
    }

    pub fn tokens(&self) -> &[ExpressionToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The first token in push order: the leftmost leaf of the first expression.
    pub fn first_token(&self) -> Option<&ExpressionToken> {
        self.tokens.first()
    }

    /// Fold the tokens into expression trees, one per complete expression.
    pub fn to_trees(&self) -> Result<Vec<Expr>, ExprError> {
        let mut stack: Vec<Expr> = Vec::new();

        for token in &self.tokens {
            match token {
                ExpressionToken::Bool(v) => stack.push(Expr::Literal(Literal::Bool(*v))),
                ExpressionToken::Number(v) => stack.push(Expr::Literal(Literal::Number(*v))),
                ExpressionToken::Null => stack.push(Expr::Literal(Literal::Null)),
                ExpressionToken::Text(v) => stack.push(Expr::Literal(Literal::Text(v.clone()))),
                ExpressionToken::Variable(name) => stack.push(Expr::Variable(name.clone())),
                ExpressionToken::ParenGroup => {
                    let inner = pop_operands(&mut stack, 1, "parenthesis")?;
                    stack.extend(inner.into_iter().map(|e| Expr::Paren(Box::new(e))));
                }
                ExpressionToken::Operator { kind, arity } => {
                    if !kind.accepts_arity(*arity) {
                        return Err(ExprError::Malformed(format!(
                            "operator '{}' cannot take {} operand(s)",
                            kind, arity
                        )));
                    }
                    let what = format!("operator '{}'", kind);
                    let mut operands = pop_operands(&mut stack, *arity, &what)?;
                    if *arity == 1 {
                        let operand = Box::new(operands.remove(0));
                        let op = if *kind == OperatorKind::Minus {
                            OperatorKind::UnaryMinus
                        } else {
                            *kind
                        };
                        stack.push(Expr::Unary { op, operand });
                    } else {
                        let rhs = Box::new(operands.remove(1));
                        let lhs = Box::new(operands.remove(0));
                        stack.push(Expr::Binary {
                            op: *kind,
                            lhs,
                            rhs,
                        });
                    }
                }
                ExpressionToken::Function { name, arity } => {
                    let what = format!("function '{}'", name);
                    let args = pop_operands(&mut stack, *arity, &what)?;
                    stack.push(Expr::Call {
                        name: name.clone(),
                        args,
                    });
                }
            }
        }

        Ok(stack)
    }
}

/// Pop `count` operands, returned in source (push) order.
fn pop_operands(stack: &mut Vec<Expr>, count: usize, what: &str) -> Result<Vec<Expr>, ExprError> {
    if stack.len() < count {
        return Err(ExprError::Malformed(format!(
            "{} expects {} operand(s), found {}",
            what,
            count,
            stack.len()
        )));
    }
    // Operands come off last-pushed-first; split_off keeps source order.
    Ok(stack.split_off(stack.len() - count))
}

// ============================================================================
// Tree form
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Null,
    Text(String),
}

/// An expression tree; each node owns its operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Variable(String),
    Paren(Box<Expr>),
    Unary {
        op: OperatorKind,
        operand: Box<Expr>,
    },
    Binary {
        op: OperatorKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// The literal this expression reduces to, if it uses no variables or
    /// calls. Boolean logic and arithmetic on literals are folded; a result
    /// Lua would produce as `inf` or `nan` is not.
    pub fn constant(&self) -> Option<Literal> {
        match self {
            Expr::Literal(lit) => Some(lit.clone()),
            Expr::Paren(inner) => inner.constant(),
            Expr::Unary { op, operand } => match (op, operand.constant()?) {
                (OperatorKind::UnaryMinus, Literal::Number(v)) => Some(Literal::Number(-v)),
                (OperatorKind::Not, Literal::Bool(v)) => Some(Literal::Bool(!v)),
                _ => None,
            },
            Expr::Binary { op, lhs, rhs } => match (lhs.constant()?, rhs.constant()?) {
                (Literal::Number(l), Literal::Number(r)) => {
                    let v = match op {
                        OperatorKind::Add => l + r,
                        OperatorKind::Minus => l - r,
                        OperatorKind::Multiply => l * r,
                        OperatorKind::Divide => l / r,
                        // Lua's modulo takes the sign of the divisor.
                        OperatorKind::Modulo => l - (l / r).floor() * r,
                        _ => return None,
                    };
                    v.is_finite().then_some(Literal::Number(v))
                }
                (Literal::Bool(l), Literal::Bool(r)) => match op {
                    OperatorKind::And => Some(Literal::Bool(l && r)),
                    OperatorKind::Or => Some(Literal::Bool(l || r)),
                    OperatorKind::Xor => Some(Literal::Bool(l != r)),
                    _ => None,
                },
                _ => None,
            },
            Expr::Variable(_) | Expr::Call { .. } => None,
        }
    }
}
