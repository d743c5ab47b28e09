//! Condition evaluation over an execution's variable bag.
//!
//! Fields are dotted paths (`user.profile.age`); a missing segment anywhere
//! along the path yields "absent" rather than an error. Operators compare the
//! resolved value against the condition's right-hand `value`; string
//! operators work on stringified values and ordering operators on parsed
//! numbers.

use cadence_types::workflow::{ConditionLogic, ConditionOperator, Variables, WorkflowCondition};
use regex::Regex;
use serde_json::Value;

/// Stateless evaluator for `WorkflowCondition` lists.
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Combine a condition list with AND/OR logic.
    ///
    /// An empty AND list holds; an empty OR list does not.
    pub fn evaluate(
        conditions: &[WorkflowCondition],
        logic: ConditionLogic,
        variables: &Variables,
    ) -> bool {
        match logic {
            ConditionLogic::And => conditions
                .iter()
                .all(|c| Self::evaluate_condition(c, variables)),
            ConditionLogic::Or => conditions
                .iter()
                .any(|c| Self::evaluate_condition(c, variables)),
        }
    }

    /// Evaluate a single condition, applying `negate` last.
    pub fn evaluate_condition(condition: &WorkflowCondition, variables: &Variables) -> bool {
        let left = resolve_path(variables, &condition.field);
        let right = condition.value.as_ref();
        let result = Self::apply(condition.operator, left, right);
        result != condition.negate
    }

    fn apply(operator: ConditionOperator, left: Option<&Value>, right: Option<&Value>) -> bool {
        match operator {
            ConditionOperator::Equals => values_equal(left, right),
            ConditionOperator::NotEquals => !values_equal(left, right),
            ConditionOperator::Contains => stringify(left).contains(&stringify(right)),
            ConditionOperator::NotContains => !stringify(left).contains(&stringify(right)),
            ConditionOperator::StartsWith => stringify(left).starts_with(&stringify(right)),
            ConditionOperator::EndsWith => stringify(left).ends_with(&stringify(right)),
            ConditionOperator::GreaterThan => compare(left, right, |a, b| a > b),
            ConditionOperator::LessThan => compare(left, right, |a, b| a < b),
            ConditionOperator::GreaterThanOrEqual => compare(left, right, |a, b| a >= b),
            ConditionOperator::LessThanOrEqual => compare(left, right, |a, b| a <= b),
            ConditionOperator::IsEmpty => is_empty(left),
            ConditionOperator::IsNotEmpty => !is_empty(left),
            ConditionOperator::MatchesRegex => {
                let pattern = stringify(right);
                match Regex::new(&pattern) {
                    Ok(re) => re.is_match(&stringify(left)),
                    Err(e) => {
                        tracing::warn!(pattern = %pattern, error = %e, "invalid regex in condition");
                        false
                    }
                }
            }
            ConditionOperator::Unknown => false,
        }
    }
}

/// Walk a dotted path through nested objects (and array indices).
pub fn resolve_path<'a>(variables: &'a Variables, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = variables.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a value the way string operators and templates see it.
///
/// Strings are used verbatim, absent and null become empty, and everything
/// else is rendered as compact JSON.
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn compare(left: Option<&Value>, right: Option<&Value>, op: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => op(a, b),
        _ => false,
    }
}

fn values_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None | Some(Value::Null), None | Some(Value::Null)) => true,
        (Some(a), Some(b)) if a == b => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        // "5" equals 5, "true" equals true
        (Some(Value::String(s)), Some(other @ (Value::Number(_) | Value::Bool(_))))
        | (Some(other @ (Value::Number(_) | Value::Bool(_))), Some(Value::String(s))) => {
            *s == other.to_string()
        }
        _ => false,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Variables {
        match value {
            Value::Object(map) => map,
            _ => panic!("variables must be an object"),
        }
    }

    fn cond(field: &str, operator: ConditionOperator, value: Option<Value>) -> WorkflowCondition {
        WorkflowCondition::new(field, operator, value)
    }

    #[test]
    fn test_nested_equals() {
        let v = vars(json!({"a": {"b": 5}}));
        let c = cond("a.b", ConditionOperator::Equals, Some(json!(5)));
        assert!(ConditionEvaluator::evaluate(&[c], ConditionLogic::And, &v));
    }

    #[test]
    fn test_negate_flips_result() {
        let v = vars(json!({"a": {"b": 5}}));
        let mut c = cond("a.b", ConditionOperator::Equals, Some(json!(5)));
        c.negate = true;
        assert!(!ConditionEvaluator::evaluate(&[c], ConditionLogic::And, &v));
    }

    #[test]
    fn test_is_empty_on_absent_field() {
        let v = vars(json!({"a": {}}));
        let c = cond("a.missing.deeper", ConditionOperator::IsEmpty, None);
        assert!(ConditionEvaluator::evaluate_condition(&c, &v));

        let c = cond("a.missing", ConditionOperator::IsNotEmpty, None);
        assert!(!ConditionEvaluator::evaluate_condition(&c, &v));
    }

    #[test]
    fn test_is_empty_on_empty_string_and_null() {
        let v = vars(json!({"s": "", "n": null, "zero": 0}));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("s", ConditionOperator::IsEmpty, None),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("n", ConditionOperator::IsEmpty, None),
            &v
        ));
        assert!(!ConditionEvaluator::evaluate_condition(
            &cond("zero", ConditionOperator::IsEmpty, None),
            &v
        ));
    }

    #[test]
    fn test_contains_uses_stringified_values() {
        let v = vars(json!({"count": 12345, "tags": ["alpha", "beta"]}));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("count", ConditionOperator::Contains, Some(json!(234))),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("tags", ConditionOperator::Contains, Some(json!("bet"))),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("count", ConditionOperator::NotContains, Some(json!("9"))),
            &v
        ));
    }

    #[test]
    fn test_prefix_and_suffix() {
        let v = vars(json!({"file": "report.pdf"}));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("file", ConditionOperator::StartsWith, Some(json!("rep"))),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("file", ConditionOperator::EndsWith, Some(json!(".pdf"))),
            &v
        ));
        assert!(!ConditionEvaluator::evaluate_condition(
            &cond("file", ConditionOperator::EndsWith, Some(json!(".doc"))),
            &v
        ));
    }

    #[test]
    fn test_numeric_ordering_parses_strings() {
        let v = vars(json!({"temp": "21.5", "limit": 20}));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("temp", ConditionOperator::GreaterThan, Some(json!(20))),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("limit", ConditionOperator::LessThanOrEqual, Some(json!("20"))),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("limit", ConditionOperator::GreaterThanOrEqual, Some(json!(20))),
            &v
        ));
        assert!(!ConditionEvaluator::evaluate_condition(
            &cond("temp", ConditionOperator::LessThan, Some(json!("abc"))),
            &v
        ));
    }

    #[test]
    fn test_regex_match() {
        let v = vars(json!({"email": "ana@example.com"}));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("email", ConditionOperator::MatchesRegex, Some(json!(r"^\w+@example\.com$"))),
            &v
        ));
        // Invalid pattern degrades to false
        assert!(!ConditionEvaluator::evaluate_condition(
            &cond("email", ConditionOperator::MatchesRegex, Some(json!("(unclosed"))),
            &v
        ));
    }

    #[test]
    fn test_unknown_operator_is_false_and_negate_flips_it() {
        let v = vars(json!({"a": 1}));
        let mut c = cond("a", ConditionOperator::Unknown, Some(json!(1)));
        assert!(!ConditionEvaluator::evaluate_condition(&c, &v));
        c.negate = true;
        assert!(ConditionEvaluator::evaluate_condition(&c, &v));
    }

    #[test]
    fn test_loose_equality() {
        let v = vars(json!({"n": "5", "flag": true, "f": 5.0}));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("n", ConditionOperator::Equals, Some(json!(5))),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("flag", ConditionOperator::Equals, Some(json!("true"))),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("f", ConditionOperator::Equals, Some(json!(5))),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("missing", ConditionOperator::Equals, None),
            &v
        ));
        assert!(ConditionEvaluator::evaluate_condition(
            &cond("n", ConditionOperator::NotEquals, Some(json!("6"))),
            &v
        ));
    }

    #[test]
    fn test_and_or_logic() {
        let v = vars(json!({"a": 1, "b": 2}));
        let yes = cond("a", ConditionOperator::Equals, Some(json!(1)));
        let no = cond("b", ConditionOperator::Equals, Some(json!(3)));
        let both = [yes.clone(), no.clone()];
        assert!(!ConditionEvaluator::evaluate(&both, ConditionLogic::And, &v));
        assert!(ConditionEvaluator::evaluate(&both, ConditionLogic::Or, &v));
        assert!(ConditionEvaluator::evaluate(&[], ConditionLogic::And, &v));
        assert!(!ConditionEvaluator::evaluate(&[], ConditionLogic::Or, &v));
    }

    #[test]
    fn test_resolve_path_through_arrays() {
        let v = vars(json!({"items": [{"name": "first"}, {"name": "second"}]}));
        assert_eq!(resolve_path(&v, "items.1.name"), Some(&json!("second")));
        assert_eq!(resolve_path(&v, "items.9.name"), None);
        assert_eq!(resolve_path(&v, "items.x"), None);
    }
}
