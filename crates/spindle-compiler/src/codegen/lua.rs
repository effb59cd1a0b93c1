//! Expression codegen: expression IR to Lua source fragments.

use crate::ast::{Expr, Expression, Literal, OperatorKind};
use crate::error::ExprError;

use super::builtins::{BuiltinFunction, CUSTOM_FUNCTION_CALL, VARIABLE_TABLE};

/// Generate the single Lua fragment an expression stands for.
pub fn generate_single(expression: &Expression) -> Result<String, ExprError> {
    let mut fragments = generate_all(expression)?;
    if fragments.len() != 1 {
        return Err(ExprError::Malformed(format!(
            "expected one expression, found {}",
            fragments.len()
        )));
    }
    Ok(fragments.remove(0))
}

/// Generate one fragment per complete expression, in source order.
/// Used by interpolation, where every `{}` site leaves its own fragment.
pub fn generate_all(expression: &Expression) -> Result<Vec<String>, ExprError> {
    expression.to_trees()?.iter().map(generate_expr).collect()
}

/// Post-order walk of an expression tree.
pub fn generate_expr(expr: &Expr) -> Result<String, ExprError> {
    match expr {
        Expr::Literal(lit) => Ok(literal(lit)),
        Expr::Variable(name) => Ok(variable(name)),
        Expr::Paren(inner) => Ok(format!("({})", generate_expr(inner)?)),
        Expr::Unary { op, operand } => {
            let operand = generate_expr(operand)?;
            match op {
                OperatorKind::Not => Ok(format!("not {}", operand)),
                // `--` would open a Lua comment.
                OperatorKind::UnaryMinus if operand.starts_with('-') => Ok(format!("- {}", operand)),
                OperatorKind::UnaryMinus => Ok(format!("-{}", operand)),
                other => Err(ExprError::Malformed(format!(
                    "operator '{}' used as unary",
                    other
                ))),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let symbol = binary_operator(*op)?;
            Ok(format!(
                "{} {} {}",
                generate_expr(lhs)?,
                symbol,
                generate_expr(rhs)?
            ))
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(generate_expr)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(call(name, &args))
        }
    }
}

/// Call a script function: builtins natively, anything else through the
/// custom-function indirection.
pub fn call(name: &str, args: &[String]) -> String {
    match BuiltinFunction::from_script_name(name) {
        Some(builtin) => format!("{}({})", builtin.lua_name(), args.join(", ")),
        None => {
            let mut all = Vec::with_capacity(args.len() + 1);
            all.push(text(name));
            all.extend(args.iter().cloned());
            format!("{}({})", CUSTOM_FUNCTION_CALL, all.join(", "))
        }
    }
}

fn binary_operator(op: OperatorKind) -> Result<&'static str, ExprError> {
    let symbol = match op {
        OperatorKind::EqualTo => "==",
        OperatorKind::GreaterThan => ">",
        OperatorKind::GreaterThanOrEqualTo => ">=",
        OperatorKind::LessThan => "<",
        OperatorKind::LessThanOrEqualTo => "<=",
        // Xor on booleans is inequality.
        OperatorKind::NotEqualTo | OperatorKind::Xor => "~=",
        OperatorKind::Or => "or",
        OperatorKind::And => "and",
        OperatorKind::Add => "+",
        OperatorKind::Minus => "-",
        OperatorKind::Multiply => "*",
        OperatorKind::Divide => "/",
        OperatorKind::Modulo => "%",
        OperatorKind::Assign
        | OperatorKind::AddAssign
        | OperatorKind::MinusAssign
        | OperatorKind::MultiplyAssign
        | OperatorKind::DivideAssign => {
            return Err(ExprError::Unsupported(format!(
                "assignment operator '{}' cannot appear inside an expression",
                op
            )))
        }
        OperatorKind::Not | OperatorKind::UnaryMinus => {
            return Err(ExprError::Malformed(format!(
                "unary operator '{}' used with two operands",
                op
            )))
        }
    };
    Ok(symbol)
}

pub fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Bool(v) => v.to_string(),
        Literal::Number(v) => number(*v),
        Literal::Null => "nil".to_string(),
        Literal::Text(v) => text(v),
    }
}

pub fn number(value: f64) -> String {
    if value.is_nan() {
        "(0/0)".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "math.huge" } else { "-math.huge" }.to_string()
    } else {
        value.to_string()
    }
}

/// Single-quoted Lua string literal.
pub fn text(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Lookup of a script variable in the runtime's variable table.
pub fn variable(name: &str) -> String {
    format!("{}[{}]", VARIABLE_TABLE, text(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExpressionToken as T;

    fn op(kind: OperatorKind, arity: usize) -> T {
        T::Operator { kind, arity }
    }

    fn gen(tokens: Vec<T>) -> String {
        generate_single(&Expression::from_tokens(tokens)).unwrap()
    }

    #[test]
    fn literals() {
        assert_eq!(gen(vec![T::Bool(true)]), "true");
        assert_eq!(gen(vec![T::Number(0.0)]), "0");
        assert_eq!(gen(vec![T::Number(1.5)]), "1.5");
        assert_eq!(gen(vec![T::Null]), "nil");
        assert_eq!(gen(vec![T::Text("it's \\ ok\n".into())]), r"'it\'s \\ ok\n'");
    }

    #[test]
    fn variable_lookup() {
        assert_eq!(gen(vec![T::Variable("x".into())]), "Variable['x']");
    }

    #[test]
    fn comparison() {
        let out = gen(vec![
            T::Variable("x".into()),
            T::Number(0.0),
            op(OperatorKind::GreaterThan, 2),
        ]);
        assert_eq!(out, "Variable['x'] > 0");
    }

    #[test]
    fn explicit_parentheses_are_kept() {
        // ($a + 1) * 2
        let out = gen(vec![
            T::Variable("a".into()),
            T::Number(1.0),
            op(OperatorKind::Add, 2),
            T::ParenGroup,
            T::Number(2.0),
            op(OperatorKind::Multiply, 2),
        ]);
        assert_eq!(out, "(Variable['a'] + 1) * 2");

        // $a + (1 * 2)
        let out = gen(vec![
            T::Variable("a".into()),
            T::Number(1.0),
            T::Number(2.0),
            op(OperatorKind::Multiply, 2),
            T::ParenGroup,
            op(OperatorKind::Add, 2),
        ]);
        assert_eq!(out, "Variable['a'] + (1 * 2)");
    }

    #[test]
    fn word_form_and_symbol_unary() {
        assert_eq!(
            gen(vec![T::Variable("done".into()), op(OperatorKind::Not, 1)]),
            "not Variable['done']"
        );
        assert_eq!(gen(vec![T::Number(3.0), op(OperatorKind::UnaryMinus, 1)]), "-3");
        assert_eq!(
            gen(vec![
                T::Number(3.0),
                op(OperatorKind::UnaryMinus, 1),
                op(OperatorKind::UnaryMinus, 1)
            ]),
            "- -3"
        );
    }

    #[test]
    fn logical_operators_use_lua_spelling() {
        let out = gen(vec![
            T::Variable("a".into()),
            T::Variable("b".into()),
            op(OperatorKind::NotEqualTo, 2),
            T::Bool(true),
            op(OperatorKind::And, 2),
        ]);
        assert_eq!(out, "Variable['a'] ~= Variable['b'] and true");
    }

    #[test]
    fn builtin_and_custom_functions() {
        let out = gen(vec![
            T::Text("Shop".into()),
            T::Function {
                name: "visited".into(),
                arity: 1,
            },
        ]);
        assert_eq!(out, "ds_visited('Shop')");

        let out = gen(vec![
            T::Number(1.0),
            T::Variable("b".into()),
            T::Function {
                name: "max_of".into(),
                arity: 2,
            },
        ]);
        assert_eq!(out, "ds_call('max_of', 1, Variable['b'])");
    }

    #[test]
    fn zero_arity_function() {
        let out = gen(vec![T::Function {
            name: "random".into(),
            arity: 0,
        }]);
        assert_eq!(out, "ds_random()");
    }

    #[test]
    fn interpolation_returns_fragments_in_order() {
        let expr = Expression::from_tokens(vec![
            T::Variable("name".into()),
            T::Variable("gold".into()),
            T::Number(1.0),
            op(OperatorKind::Add, 2),
        ]);
        assert_eq!(
            generate_all(&expr).unwrap(),
            vec!["Variable['name']".to_string(), "Variable['gold'] + 1".to_string()]
        );
        assert!(matches!(generate_single(&expr), Err(ExprError::Malformed(_))));
    }

    #[test]
    fn empty_expression_is_malformed_for_single() {
        assert!(matches!(
            generate_single(&Expression::new()),
            Err(ExprError::Malformed(_))
        ));
    }

    #[test]
    fn compound_assignment_is_unsupported() {
        let expr = Expression::from_tokens(vec![
            T::Variable("a".into()),
            T::Number(1.0),
            op(OperatorKind::AddAssign, 2),
        ]);
        assert!(matches!(generate_single(&expr), Err(ExprError::Unsupported(_))));
    }

    #[test]
    fn non_finite_numbers() {
        assert_eq!(number(f64::INFINITY), "math.huge");
        assert_eq!(number(f64::NEG_INFINITY), "-math.huge");
        assert_eq!(number(f64::NAN), "(0/0)");
        assert_eq!(number(-2.0), "-2");
    }
}
