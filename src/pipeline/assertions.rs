//! Declarative response assertions
//!
//! Each assertion pairs a left-hand expression (`res.status`) with an
//! operator and operand (`eq 200`, `isString`, `in 200, 201`). A value with
//! no recognized operator is compared with `eq`.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::expr::{self, ExprContext};
use crate::collection::KeyValue;
use crate::interpolate::interpolate_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    Length,
    Matches,
    NotMatches,
    StartsWith,
    EndsWith,
    Between,
    IsEmpty,
    IsNull,
    IsUndefined,
    IsDefined,
    IsTruthy,
    IsFalsy,
    IsJson,
    IsNumber,
    IsString,
    IsBoolean,
    IsArray,
}

impl Operator {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => Operator::Eq,
            "neq" => Operator::Neq,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "in" => Operator::In,
            "notIn" => Operator::NotIn,
            "contains" => Operator::Contains,
            "notContains" => Operator::NotContains,
            "length" => Operator::Length,
            "matches" => Operator::Matches,
            "notMatches" => Operator::NotMatches,
            "startsWith" => Operator::StartsWith,
            "endsWith" => Operator::EndsWith,
            "between" => Operator::Between,
            "isEmpty" => Operator::IsEmpty,
            "isNull" => Operator::IsNull,
            "isUndefined" => Operator::IsUndefined,
            "isDefined" => Operator::IsDefined,
            "isTruthy" => Operator::IsTruthy,
            "isFalsy" => Operator::IsFalsy,
            "isJson" => Operator::IsJson,
            "isNumber" => Operator::IsNumber,
            "isString" => Operator::IsString,
            "isBoolean" => Operator::IsBoolean,
            "isArray" => Operator::IsArray,
            _ => return None,
        })
    }

    fn is_unary(self) -> bool {
        matches!(
            self,
            Operator::IsEmpty
                | Operator::IsNull
                | Operator::IsUndefined
                | Operator::IsDefined
                | Operator::IsTruthy
                | Operator::IsFalsy
                | Operator::IsJson
                | Operator::IsNumber
                | Operator::IsString
                | Operator::IsBoolean
                | Operator::IsArray
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionStatus {
    Pass,
    Fail,
}

/// Outcome of one assertion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub lhs_expr: String,
    pub rhs_expr: String,
    pub rhs_operand: String,
    pub operator: Operator,
    pub status: AssertionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssertionResult {
    pub fn passed(&self) -> bool {
        self.status == AssertionStatus::Pass
    }
}

/// Split `"gt 5"` into its operator and operand
pub fn parse_operator(rhs: &str) -> (Operator, String) {
    let trimmed = rhs.trim();
    if trimmed.is_empty() {
        return (Operator::Eq, rhs.to_string());
    }

    let (head, rest) = match trimmed.split_once(' ') {
        Some((head, rest)) => (head, rest.to_string()),
        None => (trimmed, String::new()),
    };

    match Operator::parse(head) {
        Some(op) if op.is_unary() => (op, String::new()),
        Some(op) => (op, rest),
        None => (Operator::Eq, rhs.to_string()),
    }
}

/// Evaluate every enabled assertion
pub fn run_assertions(assertions: &[KeyValue], ctx: &ExprContext<'_>) -> Vec<AssertionResult> {
    assertions
        .iter()
        .filter(|a| a.enabled)
        .map(|a| {
            let (operator, operand) = parse_operator(&a.value);
            let outcome = expr::evaluate(&a.name, ctx)
                .and_then(|lhs| check(operator, lhs.as_ref(), &operand, ctx.scope));

            AssertionResult {
                lhs_expr: a.name.clone(),
                rhs_expr: a.value.clone(),
                rhs_operand: operand,
                operator,
                status: if outcome.is_ok() {
                    AssertionStatus::Pass
                } else {
                    AssertionStatus::Fail
                },
                error: outcome.err(),
            }
        })
        .collect()
}

fn rhs_value(operand: &str, scope: &Value) -> Option<Value> {
    expr::literal(&interpolate_str(operand, scope))
}

fn rhs_list(operand: &str, scope: &Value) -> Vec<Option<Value>> {
    let trimmed = operand.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner.split(',').map(|item| rhs_value(item, scope)).collect()
}

fn check(operator: Operator, lhs: Option<&Value>, operand: &str, scope: &Value) -> Result<(), String> {
    let shown = inspect(lhs);

    match operator {
        Operator::Eq => {
            let rhs = rhs_value(operand, scope);
            ensure(strict_equal(lhs, rhs.as_ref()), || format!("expected {} to equal {}", shown, inspect(rhs.as_ref())))
        }
        Operator::Neq => {
            let rhs = rhs_value(operand, scope);
            ensure(!strict_equal(lhs, rhs.as_ref()), || format!("expected {} to not equal {}", shown, inspect(rhs.as_ref())))
        }
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let rhs = rhs_value(operand, scope);
            let a = as_number(lhs).ok_or_else(|| format!("expected {} to be a number or a date", shown))?;
            let b = as_number(rhs.as_ref())
                .ok_or_else(|| format!("the argument to the comparison must be a number, got {}", inspect(rhs.as_ref())))?;
            let (pass, word) = match operator {
                Operator::Gt => (a > b, "above"),
                Operator::Gte => (a >= b, "at least"),
                Operator::Lt => (a < b, "below"),
                _ => (a <= b, "at most"),
            };
            ensure(pass, || format!("expected {} to be {} {}", shown, word, inspect(rhs.as_ref())))
        }
        Operator::In | Operator::NotIn => {
            let list = rhs_list(operand, scope);
            let found = list.iter().any(|item| strict_equal(lhs, item.as_ref()));
            let shown_list = format!(
                "[ {} ]",
                list.iter().map(|v| inspect(v.as_ref())).collect::<Vec<_>>().join(", ")
            );
            if operator == Operator::In {
                ensure(found, || format!("expected {} to be one of {}", shown, shown_list))
            } else {
                ensure(!found, || format!("expected {} to not be one of {}", shown, shown_list))
            }
        }
        Operator::Contains | Operator::NotContains => {
            let rhs = rhs_value(operand, scope);
            let found = includes(lhs, rhs.as_ref())?;
            if operator == Operator::Contains {
                ensure(found, || format!("expected {} to include {}", shown, inspect(rhs.as_ref())))
            } else {
                ensure(!found, || format!("expected {} to not include {}", shown, inspect(rhs.as_ref())))
            }
        }
        Operator::Length => {
            let rhs = rhs_value(operand, scope);
            let expected = as_number(rhs.as_ref())
                .ok_or_else(|| format!("expected length {} to be a number", inspect(rhs.as_ref())))?;
            let actual = match lhs {
                Some(Value::String(s)) => s.encode_utf16().count(),
                Some(Value::Array(items)) => items.len(),
                _ => return Err(format!("expected {} to have property 'length'", shown)),
            };
            ensure(actual as f64 == expected, || {
                format!("expected {} to have a length of {} but got {}", shown, expected, actual)
            })
        }
        Operator::Matches | Operator::NotMatches => {
            let pattern = interpolate_str(operand.trim(), scope);
            let pattern = pattern
                .strip_prefix('/')
                .and_then(|s| s.strip_suffix('/'))
                .map(str::to_string)
                .unwrap_or(pattern);
            let re = Regex::new(&pattern).map_err(|e| format!("Invalid regular expression /{}/: {}", pattern, e))?;
            let matched = match lhs {
                None => false,
                Some(Value::String(s)) => re.is_match(s),
                Some(other) => re.is_match(&other.to_string()),
            };
            if operator == Operator::Matches {
                ensure(matched, || format!("expected {} to match /{}/", shown, pattern))
            } else {
                ensure(!matched, || format!("expected {} not to match /{}/", shown, pattern))
            }
        }
        Operator::StartsWith | Operator::EndsWith => {
            let rhs = rhs_value(operand, scope);
            let (Some(Value::String(text)), Some(Value::String(affix))) = (lhs, rhs.as_ref()) else {
                return Err(format!("expected {} and {} to be strings", shown, inspect(rhs.as_ref())));
            };
            if operator == Operator::StartsWith {
                ensure(text.starts_with(affix.as_str()), || format!("expected {} to start with {}", shown, inspect(rhs.as_ref())))
            } else {
                ensure(text.ends_with(affix.as_str()), || format!("expected {} to end with {}", shown, inspect(rhs.as_ref())))
            }
        }
        Operator::Between => {
            let bounds = rhs_list(operand, scope);
            let (Some(min), Some(max)) = (
                bounds.first().and_then(|v| as_number(v.as_ref())),
                bounds.get(1).and_then(|v| as_number(v.as_ref())),
            ) else {
                return Err(format!("between needs two numeric bounds, got '{}'", operand));
            };
            let value = as_number(lhs).ok_or_else(|| format!("expected {} to be a number or a date", shown))?;
            ensure(value >= min && value <= max, || format!("expected {} to be within {}..{}", shown, min, max))
        }
        Operator::IsEmpty => {
            let empty = match lhs {
                Some(Value::String(s)) => s.is_empty(),
                Some(Value::Array(items)) => items.is_empty(),
                Some(Value::Object(map)) => map.is_empty(),
                _ => return Err(format!(".empty was passed non-string primitive {}", shown)),
            };
            ensure(empty, || format!("expected {} to be empty", shown))
        }
        Operator::IsNull => ensure(matches!(lhs, Some(Value::Null)), || format!("expected {} to be null", shown)),
        Operator::IsUndefined => ensure(lhs.is_none(), || format!("expected {} to be undefined", shown)),
        Operator::IsDefined => ensure(lhs.is_some(), || "expected undefined not to be undefined".to_string()),
        Operator::IsTruthy => ensure(matches!(lhs, Some(Value::Bool(true))), || format!("expected {} to be true", shown)),
        Operator::IsFalsy => ensure(matches!(lhs, Some(Value::Bool(false))), || format!("expected {} to be false", shown)),
        Operator::IsJson => ensure(matches!(lhs, Some(Value::Object(_))), || format!("expected {} to be JSON", shown)),
        Operator::IsNumber => ensure(matches!(lhs, Some(Value::Number(_))), || format!("expected {} to be a number", shown)),
        Operator::IsString => ensure(matches!(lhs, Some(Value::String(_))), || format!("expected {} to be a string", shown)),
        Operator::IsBoolean => ensure(matches!(lhs, Some(Value::Bool(_))), || format!("expected {} to be a boolean", shown)),
        Operator::IsArray => ensure(matches!(lhs, Some(Value::Array(_))), || format!("expected {} to be an array", shown)),
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message())
    }
}

/// `===` for scalars (numbers compared by value), structural for
/// objects and arrays
fn strict_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    value?.as_f64()
}

fn includes(haystack: Option<&Value>, needle: Option<&Value>) -> Result<bool, String> {
    match (haystack, needle) {
        (Some(Value::String(text)), Some(Value::String(part))) => Ok(text.contains(part.as_str())),
        (Some(Value::String(text)), Some(other @ Value::Number(_))) => Ok(text.contains(&other.to_string())),
        (Some(Value::Array(items)), needle) => Ok(items.iter().any(|item| strict_equal(Some(item), needle))),
        (Some(Value::Object(map)), Some(Value::String(key))) => Ok(map.contains_key(key)),
        (Some(Value::Object(map)), Some(Value::Object(subset))) => {
            Ok(subset.iter().all(|(k, v)| map.get(k) == Some(v)))
        }
        (lhs, _) => Err(format!("object tested must be an array, a map, an object, a set, a string, or a weakset, but {} given", inspect(lhs))),
    }
}

/// Render a value the way assertion messages show it
fn inspect(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => format!("'{}'", s),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResponseSnapshot;
    use indexmap::IndexMap;
    use serde_json::json;

    fn response() -> ResponseSnapshot {
        ResponseSnapshot {
            status: 200,
            status_text: "OK".into(),
            headers: IndexMap::from([("content-type".to_string(), "application/json; charset=utf-8".to_string())]),
            body: json!({"id": 7, "name": "widget", "tags": ["a", "b"], "active": true, "meta": {}, "none": null}),
            response_time: 30,
            size: 0,
        }
    }

    fn assert_one(lhs: &str, rhs: &str) -> AssertionResult {
        let res = response();
        let scope = json!({"expectedId": "7"});
        let ctx = ExprContext {
            response: Some(&res),
            request: None,
            scope: &scope,
        };
        run_assertions(&[KeyValue::new(lhs, rhs)], &ctx).remove(0)
    }

    #[test]
    fn test_parse_operator() {
        assert_eq!(parse_operator("eq 200"), (Operator::Eq, "200".to_string()));
        assert_eq!(parse_operator("isString"), (Operator::IsString, String::new()));
        assert_eq!(parse_operator("isJson extra"), (Operator::IsJson, String::new()));
        assert_eq!(parse_operator("200"), (Operator::Eq, "200".to_string()));
        assert_eq!(parse_operator("between 1, 5"), (Operator::Between, "1, 5".to_string()));
    }

    #[test]
    fn test_comparisons() {
        assert!(assert_one("res.status", "eq 200").passed());
        assert!(assert_one("res.status", "200").passed());
        assert!(!assert_one("res.status", "eq \"200\"").passed());
        assert!(assert_one("res.status", "neq 404").passed());
        assert!(assert_one("res.body.id", "eq {{expectedId}}").passed());
        assert!(assert_one("res.responseTime", "lt 1000").passed());
        assert!(assert_one("res.body.id", "gte 7").passed());
        assert!(assert_one("res.body.id", "between 1, 10").passed());
        assert!(assert_one("res.status", "in 200, 201").passed());
        assert!(assert_one("res.status", "notIn [400, 500]").passed());
    }

    #[test]
    fn test_string_operators() {
        assert!(assert_one("res.headers['content-type']", "contains application/json").passed());
        assert!(assert_one("res.body.name", "startsWith wid").passed());
        assert!(assert_one("res.body.name", "endsWith get").passed());
        assert!(assert_one("res.body.name", "matches ^w.*t$").passed());
        assert!(assert_one("res.body.name", "notMatches /^x/").passed());
        assert!(assert_one("res.body.tags", "length 2").passed());
        assert!(assert_one("res.body.tags", "contains a").passed());
    }

    #[test]
    fn test_unary_operators() {
        assert!(assert_one("res.body", "isJson").passed());
        assert!(assert_one("res.body.meta", "isEmpty").passed());
        assert!(assert_one("res.body.none", "isNull").passed());
        assert!(assert_one("res.body.missing", "isUndefined").passed());
        assert!(assert_one("res.body.id", "isDefined").passed());
        assert!(assert_one("res.body.active", "isTruthy").passed());
        assert!(assert_one("res.body.id", "isNumber").passed());
        assert!(assert_one("res.body.name", "isString").passed());
        assert!(assert_one("res.body.active", "isBoolean").passed());
        assert!(assert_one("res.body.tags", "isArray").passed());
    }

    #[test]
    fn test_truthy_is_strict() {
        let result = assert_one("res.body.id", "isTruthy");
        assert!(!result.passed());
        assert_eq!(result.error.as_deref(), Some("expected 7 to be true"));
    }

    #[test]
    fn test_failure_messages() {
        let result = assert_one("res.status", "eq 201");
        assert_eq!(result.error.as_deref(), Some("expected 200 to equal 201"));
        let result = assert_one("res.body.name", "gt 5");
        assert!(result.error.unwrap().contains("to be a number"));
    }

    #[test]
    fn test_disabled_assertions_skipped() {
        let res = response();
        let scope = json!({});
        let ctx = ExprContext {
            response: Some(&res),
            request: None,
            scope: &scope,
        };
        let mut disabled = KeyValue::new("res.status", "eq 500");
        disabled.enabled = false;
        assert!(run_assertions(&[disabled], &ctx).is_empty());
    }
}
