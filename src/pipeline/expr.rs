//! Expression evaluation for assertions and response-derived variables
//!
//! Supported left-hand expressions are property paths rooted at `res`,
//! `req` or a variable name:
//!
//! - `res.status`, `res.body.items[0].id`, `res.headers['x-id']`
//! - `res('data.token')` queries the response body
//! - `res.getStatus()`, `res.getHeader('etag')` and the other getters
//! - `.length` on strings and arrays
//!
//! A result of `None` stands for `undefined`.

use serde_json::{json, Value};

use crate::client::ResponseSnapshot;
use crate::interpolate::scope;

/// Values an expression may reference
pub struct ExprContext<'a> {
    pub response: Option<&'a ResponseSnapshot>,
    pub request: Option<&'a Value>,
    /// Combined variable scope
    pub scope: &'a Value,
}

impl<'a> ExprContext<'a> {
    fn root(&self, name: &str) -> Option<Value> {
        match name {
            "res" => self.response.map(response_value),
            "req" => self.request.cloned(),
            _ => scope::lookup(self.scope, name).cloned(),
        }
    }
}

fn response_value(response: &ResponseSnapshot) -> Value {
    json!({
        "status": response.status,
        "statusText": response.status_text,
        "headers": response.headers,
        "body": response.body,
        "responseTime": response.response_time,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' | '`' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        i += 1;
                    }
                    text.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(format!("Unterminated string in expression: {}", expr));
                }
                i += 1;
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid number '{}' in expression", text))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' || c == '-' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '$' | '-'))
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("Unexpected character '{}' in expression: {}", other, expr)),
        }
    }

    Ok(tokens)
}

/// Evaluate a left-hand expression
pub fn evaluate(expr: &str, ctx: &ExprContext<'_>) -> Result<Option<Value>, String> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err("Empty expression".to_string());
    }

    let tokens = tokenize(trimmed)?;

    // Variable paths follow interpolation lookup, so flat dotted names work
    if let Some(Token::Ident(root)) = tokens.first() {
        let literal_root = matches!(root.as_str(), "res" | "req" | "true" | "false" | "null" | "undefined");
        if !literal_root && !tokens.contains(&Token::LParen) {
            return Ok(scope::lookup(ctx.scope, trimmed).cloned());
        }
    }

    let mut iter = tokens.into_iter().peekable();

    let root_name = match iter.next() {
        Some(Token::Ident(name)) => name,
        Some(Token::Str(s)) => return Ok(Some(Value::String(s))),
        Some(Token::Num(n)) => return Ok(Some(number(n))),
        _ => return Err(format!("Invalid expression: {}", expr)),
    };

    let mut current = match root_name.as_str() {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "undefined" => None,
        name => ctx.root(name),
    };
    let is_res = root_name == "res";

    // `res('path')` queries the body
    if is_res && iter.peek() == Some(&Token::LParen) {
        iter.next();
        let arg = call_argument(&mut iter)?;
        current = match (current, arg) {
            (Some(res), Some(path)) => query(res.get("body"), &path),
            (Some(res), None) => res.get("body").cloned(),
            (None, _) => None,
        };
    }

    while let Some(token) = iter.next() {
        match token {
            Token::Dot => {
                let name = match iter.next() {
                    Some(Token::Ident(name)) => name,
                    _ => return Err(format!("Expected property name in expression: {}", expr)),
                };
                if iter.peek() == Some(&Token::LParen) {
                    iter.next();
                    let arg = call_argument(&mut iter)?;
                    current = call_method(current.as_ref(), &name, arg.as_deref())?;
                } else {
                    current = property(current.as_ref(), &name);
                }
            }
            Token::LBracket => {
                let key = match iter.next() {
                    Some(Token::Str(s)) => s,
                    Some(Token::Num(n)) => format!("{}", n as i64),
                    Some(Token::Ident(name)) => name,
                    _ => return Err(format!("Invalid index in expression: {}", expr)),
                };
                if iter.next() != Some(Token::RBracket) {
                    return Err(format!("Expected ']' in expression: {}", expr));
                }
                current = property(current.as_ref(), &key);
            }
            _ => return Err(format!("Unexpected token in expression: {}", expr)),
        }
    }

    Ok(current)
}

fn call_argument(iter: &mut std::iter::Peekable<std::vec::IntoIter<Token>>) -> Result<Option<String>, String> {
    let arg = match iter.next() {
        Some(Token::RParen) => return Ok(None),
        Some(Token::Str(s)) => Some(s),
        Some(Token::Num(n)) => Some(format!("{}", n)),
        _ => return Err("Expected a string argument".to_string()),
    };
    if iter.next() != Some(Token::RParen) {
        return Err("Expected ')'".to_string());
    }
    Ok(arg)
}

fn call_method(target: Option<&Value>, name: &str, arg: Option<&str>) -> Result<Option<Value>, String> {
    let field = match name {
        "getStatus" => "status",
        "getStatusText" => "statusText",
        "getHeaders" => "headers",
        "getBody" => "body",
        "getResponseTime" => "responseTime",
        "getHeader" => {
            let header = arg.unwrap_or_default().to_ascii_lowercase();
            return Ok(target
                .and_then(|t| t.get("headers"))
                .and_then(|h| h.get(&header))
                .cloned());
        }
        other => return Err(format!("Unsupported function in expression: {}()", other)),
    };
    Ok(target.and_then(|t| t.get(field)).cloned())
}

fn property(target: Option<&Value>, name: &str) -> Option<Value> {
    let target = target?;
    if name == "length" {
        match target {
            Value::String(s) => return Some(json!(s.encode_utf16().count())),
            Value::Array(items) => return Some(json!(items.len())),
            _ => {}
        }
    }
    match target {
        Value::Object(map) => map.get(name).cloned(),
        Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)).cloned(),
        _ => None,
    }
}

fn query(root: Option<&Value>, path: &str) -> Option<Value> {
    let root = root?;
    if path.is_empty() {
        return Some(root.clone());
    }
    let segments = scope::parse_path(path)?;
    scope::walk(root, &segments).cloned()
}

/// Parse a right-hand literal: `true`, `false`, `null`, `undefined`,
/// numbers and quoted strings. Anything else is taken as plain text.
pub fn literal(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    match trimmed {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        "undefined" => return None,
        _ => {}
    }

    for quote in ['"', '\'', '`'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return Some(Value::String(trimmed[1..trimmed.len() - 1].to_string()));
        }
    }

    if !trimmed.is_empty() {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Some(number(n));
            }
        }
    }

    Some(Value::String(trimmed.to_string()))
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        json!(n as i64)
    } else {
        json!(n)
    }
}
