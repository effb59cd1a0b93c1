//! Argument handling for `<<command ...>>` statements.

use crate::ast::CommandToken;
use crate::error::ExprError;

use super::lua;

/// Split command text on whitespace. A double-quoted segment stays one
/// item, with `\"` and `\\` unescaped inside it.
pub fn split_command_text(input: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            if !current.is_empty() {
                items.push(std::mem::take(&mut current));
            }
        } else if c == '"' {
            loop {
                match chars.next() {
                    None => {
                        items.push(std::mem::take(&mut current));
                        return items;
                    }
                    Some('\\') => match chars.peek() {
                        Some(&next) if next == '\\' || next == '"' => {
                            chars.next();
                            current.push(next);
                        }
                        _ => current.push('\\'),
                    },
                    Some('"') => break,
                    Some(other) => current.push(other),
                }
            }
            // A quoted segment is kept even when empty.
            items.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() {
        items.push(current);
    }
    items
}

/// Lua spelling of one plain-text command argument: numbers and booleans
/// pass through, anything else becomes a string literal.
pub fn text_argument(item: &str) -> String {
    if item == "true" || item == "false" {
        item.to_string()
    } else {
        number_literal(item).unwrap_or_else(|| lua::text(item))
    }
}

/// A numeric item respelled the way Lua reads it (`+5` becomes `5`).
fn number_literal(item: &str) -> Option<String> {
    // Rust also accepts "inf" and "NaN", which Lua would read as names.
    item.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(lua::number)
}

/// Lua call of a custom command: `name(arg, ...)`.
pub fn command_call(name: &str, tokens: &[CommandToken]) -> Result<String, ExprError> {
    let mut args = Vec::new();
    for token in tokens {
        match token {
            CommandToken::Text(text) => {
                args.extend(split_command_text(text).iter().map(|item| text_argument(item)));
            }
            CommandToken::Expression(expression) => args.push(lua::generate_single(expression)?),
        }
    }
    Ok(format!("{}({})", name, args.join(", ")))
}

/// The transition directive of a `<<seq ...>>` command: everything after the
/// command name, with `{0}`, `{1}`, ... replaced by embedded-expression
/// placeholders in argument order.
pub fn sequence_directive(raw_text: &str, tokens: &[CommandToken]) -> Result<String, ExprError> {
    let trimmed = raw_text.trim();
    let directive = match trimmed.split_once(char::is_whitespace) {
        Some((_, rest)) => rest.trim().to_string(),
        None => String::new(),
    };

    let fragments = tokens
        .iter()
        .filter_map(|t| match t {
            CommandToken::Expression(e) => Some(lua::generate_single(e)),
            CommandToken::Text(_) => None,
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(substitute_placeholders(&directive, &fragments))
}

/// Replace `{i}` with `[lua(fragments[i])]` in one pass, so text coming
/// from a fragment is never scanned again. Unknown indices stay as written.
fn substitute_placeholders(directive: &str, fragments: &[String]) -> String {
    let mut out = String::with_capacity(directive.len());
    let mut rest = directive;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let digits = after
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after.len());
        let fragment = if digits > 0 && after[digits..].starts_with('}') {
            after[..digits]
                .parse::<usize>()
                .ok()
                .and_then(|index| fragments.get(index))
        } else {
            None
        };
        match fragment {
            Some(fragment) => {
                out.push_str("[lua(");
                out.push_str(fragment);
                out.push_str(")]");
                rest = &after[digits + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The transition directive of a `<<wait ...>>` command.
pub fn wait_directive(tokens: &[CommandToken]) -> Result<String, ExprError> {
    let argument = tokens.iter().find_map(|token| match token {
        CommandToken::Text(text) => split_command_text(text).into_iter().next().map(WaitArg::Text),
        CommandToken::Expression(e) => Some(WaitArg::Expression(e)),
    });

    match argument {
        Some(WaitArg::Text(item)) => match number_literal(&item) {
            Some(seconds) => Ok(format!("Delay({})", seconds)),
            None => Err(ExprError::Unsupported(format!(
                "wait expects a duration, found '{}'",
                item
            ))),
        },
        Some(WaitArg::Expression(expression)) => {
            let trees = expression.to_trees()?;
            let constant = match trees.as_slice() {
                [single] => single.constant(),
                _ => None,
            };
            match constant {
                Some(crate::ast::Literal::Number(v)) => Ok(format!("Delay({})", lua::number(v))),
                _ => Ok(format!("Delay([lua({})])", lua::generate_single(expression)?)),
            }
        }
        None => Err(ExprError::Unsupported("wait without a duration".to_string())),
    }
}

enum WaitArg<'a> {
    Text(String),
    Expression(&'a crate::ast::Expression),
}
