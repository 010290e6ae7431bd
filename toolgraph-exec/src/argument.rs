//! The Argument Evaluator (spec §4.C): recursively lowers `{expr: "..."}`
//! leaves in an arbitrary JSON tree to their evaluated values.

use serde_json::Value;
use std::rc::Rc;
use toolgraph_expr::{jsonata, HistoryView};
use toolgraph_types::{ArgumentEvaluationError, NodeId};

/// Lowers every `{expr: "<string>"}` leaf in `tree` to its JSONata
/// evaluation against `context`, recursing into arrays elementwise and
/// into other objects' values, and passing primitives through unchanged.
///
/// A node of shape `{expr: ..., ...other}` (extra keys) or whose `expr`
/// value is not a string is rejected as an ambiguous literal-vs-expression
/// (spec §4.C) rather than silently treated as a literal.
pub fn lower(
    node: &NodeId,
    tree: &Value,
    context: &Value,
    history: Rc<dyn HistoryView>,
    current_index: u64,
) -> Result<Value, ArgumentEvaluationError> {
    lower_at(node, "$", tree, context, &history, current_index)
}

fn lower_at(
    node: &NodeId,
    path: &str,
    tree: &Value,
    context: &Value,
    history: &Rc<dyn HistoryView>,
    current_index: u64,
) -> Result<Value, ArgumentEvaluationError> {
    match tree {
        Value::Object(map) => {
            if let Some(expr_value) = map.get("expr") {
                if map.len() == 1 {
                    let expr = expr_value.as_str().ok_or_else(|| ArgumentEvaluationError {
                        path: path.to_string(),
                        message: "`expr` value must be a string".to_string(),
                    })?;
                    return jsonata::evaluate(node, expr, context, Rc::clone(history), current_index)
                        .map_err(|e| ArgumentEvaluationError { path: path.to_string(), message: e.message });
                }
                return Err(ArgumentEvaluationError {
                    path: path.to_string(),
                    message: "ambiguous literal: `expr` key present alongside other keys".to_string(),
                });
            }

            let mut lowered = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let child_path = format!("{path}.{key}");
                lowered.insert(key.clone(), lower_at(node, &child_path, value, context, history, current_index)?);
            }
            Ok(Value::Object(lowered))
        }
        Value::Array(items) => {
            let mut lowered = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let child_path = format!("{path}[{i}]");
                lowered.push(lower_at(node, &child_path, item, context, history, current_index)?);
            }
            Ok(Value::Array(lowered))
        }
        literal => Ok(literal.clone()),
    }
}
