//! Expression evaluation against one region element.

use super::ast::{BinaryOperator, Expr};
use super::value::Value;
use crate::error::{Error, Result};
use std::cmp::Ordering;

/// Bindings visible while evaluating an expression.
pub(crate) struct Scope<'a> {
    /// The FROM alias, if the query declared one.
    pub alias: Option<&'a str>,
    /// The region element currently being evaluated.
    pub current: &'a Value,
    pub params: &'a [Value],
}

impl Scope<'_> {
    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(segments) => Ok(self.resolve_path(segments)),
            Expr::Parameter(index) => self.params.get(index - 1).cloned().ok_or_else(|| {
                Error::QueryExecution(format!(
                    "bind parameter ${} not supplied ({} given)",
                    index,
                    self.params.len()
                ))
            }),
            Expr::BinaryOp { left, op, right } => self.eval_binary(left, *op, right),
            Expr::Not(inner) => Ok(match self.eval_condition(inner)? {
                Some(b) => Value::Bool(!b),
                None => Value::Null,
            }),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let needle = self.eval(expr)?;
                if needle.is_null() {
                    return Ok(Value::Null);
                }
                let mut found = false;
                for item in list {
                    if needle.query_eq(&self.eval(item)?) {
                        found = true;
                        break;
                    }
                }
                Ok(Value::Bool(found != *negated))
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => match (self.eval(expr)?, self.eval(pattern)?) {
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                (Value::String(text), Value::String(pattern)) => {
                    Ok(Value::Bool(like_match(&text, &pattern) != *negated))
                }
                (text, pattern) => Err(Error::TypeMismatch(format!(
                    "LIKE needs strings, got {} LIKE {}",
                    text.type_name(),
                    pattern.type_name()
                ))),
            },
            Expr::IsNull { expr, negated } => {
                Ok(Value::Bool(self.eval(expr)?.is_null() != *negated))
            }
        }
    }

    /// Evaluate a condition. `None` means the condition is unknown (null).
    pub fn eval_condition(&self, expr: &Expr) -> Result<Option<bool>> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(Some(b)),
            Value::Null => Ok(None),
            other => Err(Error::TypeMismatch(format!(
                "condition must be boolean, got {}",
                other.type_name()
            ))),
        }
    }

    /// A path starting with the FROM alias is resolved from the element itself;
    /// any other path is resolved against the element's fields.
    fn resolve_path(&self, segments: &[String]) -> Value {
        let rest = match (self.alias, segments.split_first()) {
            (Some(alias), Some((head, rest))) if head == alias => rest,
            _ => segments,
        };

        let mut value = self.current;
        for segment in rest {
            match value.field(segment) {
                Some(v) => value = v,
                None => return Value::Null,
            }
        }
        value.clone()
    }

    fn eval_binary(&self, left: &Expr, op: BinaryOperator, right: &Expr) -> Result<Value> {
        match op {
            BinaryOperator::And => {
                let l = self.eval_condition(left)?;
                if l == Some(false) {
                    return Ok(Value::Bool(false));
                }
                Ok(match (l, self.eval_condition(right)?) {
                    (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            BinaryOperator::Or => {
                let l = self.eval_condition(left)?;
                if l == Some(true) {
                    return Ok(Value::Bool(true));
                }
                Ok(match (l, self.eval_condition(right)?) {
                    (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }
            BinaryOperator::Equal => {
                Ok(Value::Bool(self.eval(left)?.query_eq(&self.eval(right)?)))
            }
            BinaryOperator::NotEqual => {
                Ok(Value::Bool(!self.eval(left)?.query_eq(&self.eval(right)?)))
            }
            BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterEqual => {
                let ordering = self.eval(left)?.compare(&self.eval(right)?)?;
                Ok(match ordering {
                    None => Value::Bool(false),
                    Some(ord) => Value::Bool(match op {
                        BinaryOperator::Less => ord == Ordering::Less,
                        BinaryOperator::LessEqual => ord != Ordering::Greater,
                        BinaryOperator::Greater => ord == Ordering::Greater,
                        _ => ord != Ordering::Less,
                    }),
                })
            }
        }
    }
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one.
pub(crate) fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            p = star_p + 1;
            t = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}
