//! Sandboxed evaluation for `script` steps.
//!
//! Scripts are JEXL expressions evaluated by `jexl_eval` against an object
//! built from the step's declared input variables. The only callables are
//! the pure transforms registered here; there is no I/O and no access to
//! anything outside the input object.
//!
//! **Security note:** variable values are always passed as context objects,
//! NEVER interpolated into expression strings.

use cadence_types::workflow::Variables;
use serde_json::{json, Value};

use super::step_runner::StepError;

/// Languages accepted by `script` steps.
pub const SUPPORTED_LANGUAGES: &[&str] = &["jexl", "expression"];

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn str_arg(args: &[Value], index: usize) -> String {
    match args.get(index) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Evaluator with the standard transform set registered.
pub struct ScriptEngine {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl ScriptEngine {
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
            .with_transform("lower", |args: &[Value]| Ok(json!(str_arg(args, 0).to_lowercase())))
            .with_transform("upper", |args: &[Value]| Ok(json!(str_arg(args, 0).to_uppercase())))
            .with_transform("trim", |args: &[Value]| Ok(json!(str_arg(args, 0).trim())))
            .with_transform("split", |args: &[Value]| {
                let subject = str_arg(args, 0);
                let delimiter = args.get(1).and_then(|v| v.as_str()).unwrap_or(",");
                let parts: Vec<&str> = subject.split(delimiter).collect();
                Ok(json!(parts))
            })
            .with_transform("join", |args: &[Value]| {
                let delimiter = args.get(1).and_then(|v| v.as_str()).unwrap_or(",");
                let joined = match args.first() {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|v| str_arg(std::slice::from_ref(v), 0))
                        .collect::<Vec<_>>()
                        .join(delimiter),
                    _ => String::new(),
                };
                Ok(json!(joined))
            })
            .with_transform("not", |args: &[Value]| {
                Ok(json!(!args.first().map(truthy).unwrap_or(false)))
            })
            .with_transform("contains", |args: &[Value]| {
                Ok(json!(str_arg(args, 0).contains(&str_arg(args, 1))))
            })
            .with_transform("startsWith", |args: &[Value]| {
                Ok(json!(str_arg(args, 0).starts_with(&str_arg(args, 1))))
            })
            .with_transform("endsWith", |args: &[Value]| {
                Ok(json!(str_arg(args, 0).ends_with(&str_arg(args, 1))))
            })
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.chars().count(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            })
            .with_transform("number", |args: &[Value]| {
                let n = match args.first() {
                    Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                    Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
                    Some(Value::Bool(true)) => 1.0,
                    _ => 0.0,
                };
                Ok(json!(n))
            })
            .with_transform("string", |args: &[Value]| Ok(json!(str_arg(args, 0))))
            .with_transform("keys", |args: &[Value]| {
                let keys: Vec<String> = match args.first() {
                    Some(Value::Object(o)) => o.keys().cloned().collect(),
                    _ => Vec::new(),
                };
                Ok(json!(keys))
            });

        Self { evaluator }
    }

    /// Evaluate `code` written in `language` against `inputs`.
    pub fn run(&self, language: &str, code: &str, inputs: &Variables) -> Result<Value, StepError> {
        if !SUPPORTED_LANGUAGES.contains(&language.to_ascii_lowercase().as_str()) {
            return Err(StepError::UnsupportedScriptLanguage(language.to_string()));
        }
        let context = Value::Object(inputs.clone());
        self.evaluator
            .eval_in_context(code.trim(), &context)
            .map_err(|e| StepError::Failed(format!("script evaluation failed: {e}")))
    }

    /// Pick the values to write back for each declared output variable.
    ///
    /// An object result is read key by key. A non-object result is assigned
    /// whole when exactly one output variable is declared.
    pub fn map_outputs(result: &Value, output_variables: &[String]) -> Vec<(String, Value)> {
        match result {
            Value::Object(fields) => output_variables
                .iter()
                .filter_map(|name| fields.get(name).map(|v| (name.clone(), v.clone())))
                .collect(),
            other if output_variables.len() == 1 => {
                vec![(output_variables[0].clone(), other.clone())]
            }
            _ => Vec::new(),
        }
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(value: Value) -> Variables {
        match value {
            Value::Object(map) => map,
            _ => panic!("inputs must be an object"),
        }
    }

    #[test]
    fn test_arithmetic_over_inputs() {
        let engine = ScriptEngine::new();
        let result = engine
            .run("jexl", "{doubled: x * 2}", &inputs(json!({"x": 21})))
            .unwrap();
        assert_eq!(result["doubled"].as_f64(), Some(42.0));
    }

    #[test]
    fn test_transforms() {
        let engine = ScriptEngine::new();
        let result = engine
            .run("expression", "name|upper", &inputs(json!({"name": "ana"})))
            .unwrap();
        assert_eq!(result, json!("ANA"));

        let result = engine
            .run("jexl", "items|length > 1", &inputs(json!({"items": [1, 2]})))
            .unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn test_unsupported_language() {
        let engine = ScriptEngine::new();
        let err = engine
            .run("javascript", "1 + 1", &Variables::new())
            .unwrap_err();
        assert!(matches!(err, StepError::UnsupportedScriptLanguage(lang) if lang == "javascript"));
    }

    #[test]
    fn test_syntax_error_is_failure() {
        let engine = ScriptEngine::new();
        let err = engine.run("jexl", "x +* 2", &Variables::new()).unwrap_err();
        assert!(matches!(err, StepError::Failed(_)));
    }

    #[test]
    fn test_map_outputs_object_and_scalar() {
        let names = vec!["a".to_string(), "missing".to_string()];
        let mapped = ScriptEngine::map_outputs(&json!({"a": 1, "b": 2}), &names);
        assert_eq!(mapped, vec![("a".to_string(), json!(1))]);

        let single = vec!["total".to_string()];
        let mapped = ScriptEngine::map_outputs(&json!(7), &single);
        assert_eq!(mapped, vec![("total".to_string(), json!(7))]);

        assert!(ScriptEngine::map_outputs(&json!(7), &names).is_empty());
    }
}
