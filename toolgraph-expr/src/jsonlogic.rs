//! The JSON-Logic-like sublanguage used for switch routing.
//!
//! Standard JSON-Logic operators (`and`, `or`, comparisons, arithmetic,
//! string ops, ...) are evaluated by [`datalogic_rs`] unchanged. The one
//! deviation here is `var`: its single string argument is a JSONata-like
//! expression evaluated against the same context, not a dot-path. We
//! honor that by pre-processing the rule tree — replacing every
//! `{"var": "<expr>"}` subtree with its JSONata-evaluated literal value —
//! before handing a now-pure-literal tree to `datalogic_rs`. This keeps
//! the JSON-Logic engine itself unmodified (spec §4.A).

use crate::history::HistoryView;
use crate::jsonata;
use datalogic_rs::DataLogic;
use serde_json::Value;
use std::rc::Rc;
use toolgraph_types::ExpressionError;
use toolgraph_types::NodeId;

/// Evaluates a JSON-Logic-like rule against a context, resolving every
/// `var` subtree through the JSONata engine first. Returns the truthy
/// coercion of the final result, per spec §4.A.
pub fn evaluate(
    node: &NodeId,
    rule: &Value,
    context: &Value,
    history: Rc<dyn HistoryView>,
    current_index: u64,
) -> Result<bool, ExpressionError> {
    let resolved = resolve_vars(node, rule, context, &history, current_index)?;

    let engine = DataLogic::new();
    let result = engine
        .evaluate_json(&resolved, context, None)
        .map_err(|e| ExpressionError { node: node.clone(), message: e.to_string() })?;

    Ok(is_truthy(&result))
}

/// Validates a rule's syntax without evaluating it: JSONata-checks every
/// `var` argument that looks like a JSONata expression (starts with `$`,
/// per the heuristic spec §4.A names) and leaves the rest of the tree
/// alone, since a plain literal can never fail to parse.
pub fn check_syntax(rule: &Value) -> Result<(), String> {
    match rule {
        Value::Object(map) => {
            if let Some(var_arg) = map.get("var") {
                if let Some(expr) = var_arg.as_str() {
                    if expr.starts_with('$') {
                        jsonata::check_syntax(expr)?;
                    }
                    return Ok(());
                }
                return Err("`var` argument must be a string expression".to_string());
            }
            for value in map.values() {
                check_syntax(value)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                check_syntax(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn resolve_vars(
    node: &NodeId,
    rule: &Value,
    context: &Value,
    history: &Rc<dyn HistoryView>,
    current_index: u64,
) -> Result<Value, ExpressionError> {
    match rule {
        Value::Object(map) => {
            if let Some(var_arg) = map.get("var") {
                let expr = var_arg.as_str().ok_or_else(|| ExpressionError {
                    node: node.clone(),
                    message: "`var` argument must be a string expression".to_string(),
                })?;
                return jsonata::evaluate(node, expr, context, Rc::clone(history), current_index);
            }

            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key.clone(), resolve_vars(node, value, context, history, current_index)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve_vars(node, item, context, history, current_index)?);
            }
            Ok(Value::Array(resolved))
        }
        literal => Ok(literal.clone()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::test_support::FakeHistory;
    use serde_json::json;

    fn no_history() -> Rc<dyn HistoryView> {
        Rc::new(FakeHistory::default())
    }

    #[test]
    fn var_resolves_through_jsonata_not_as_dot_path() {
        let node = NodeId::from("switch_1");
        let ctx = json!({"score": {"value": 42}});
        let rule = json!({">": [{"var": "score.value"}, 10]});
        let result = evaluate(&node, &rule, &ctx, no_history(), 0).unwrap();
        assert!(result);
    }

    #[test]
    fn var_can_carry_a_jsonata_expression_not_just_a_path() {
        let node = NodeId::from("switch_1");
        let ctx = json!({"items": [1, 2, 3]});
        let rule = json!({"==": [{"var": "$count(items)"}, 3]});
        let result = evaluate(&node, &rule, &ctx, no_history(), 0).unwrap();
        assert!(result);
    }

    #[test]
    fn plain_comparison_without_var_still_works() {
        let node = NodeId::from("switch_1");
        let ctx = json!({});
        let rule = json!({"and": [true, {"==": [1, 1]}]});
        let result = evaluate(&node, &rule, &ctx, no_history(), 0).unwrap();
        assert!(result);
    }

    #[test]
    fn non_string_var_argument_is_rejected() {
        let node = NodeId::from("switch_1");
        let ctx = json!({});
        let rule = json!({"var": 5});
        let err = evaluate(&node, &rule, &ctx, no_history(), 0).unwrap_err();
        assert!(err.message.contains("string expression"));
    }

    #[test]
    fn check_syntax_validates_dollar_prefixed_var_as_jsonata() {
        let rule = json!({">": [{"var": "$count(items)"}, 0]});
        assert!(check_syntax(&rule).is_ok());

        let bad_rule = json!({">": [{"var": "$["}, 0]});
        assert!(check_syntax(&bad_rule).is_err());
    }

    #[test]
    fn check_syntax_ignores_plain_path_vars() {
        let rule = json!({"==": [{"var": "status"}, "ok"]});
        assert!(check_syntax(&rule).is_ok());
    }
}
