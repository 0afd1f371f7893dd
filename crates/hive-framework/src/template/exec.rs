//! Template evaluation.

use std::fmt::Write as _;

use hive_core::Value;

use super::funcs;
use super::parse::{Command, Node, Operand, Pipeline};
use crate::error::{TemplateError, TemplateResult};

static NULL: Value = Value::Null;

pub(crate) fn render_nodes(nodes: &[Node], dot: &Value, out: &mut String) -> TemplateResult<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(pipeline) => {
                let value = eval_pipeline(pipeline, dot)?;
                let _ = write!(out, "{value}");
            }
            Node::If {
                branches,
                otherwise,
            } => {
                let mut taken = false;
                for (condition, body) in branches {
                    if eval_pipeline(condition, dot)?.is_truthy() {
                        render_nodes(body, dot, out)?;
                        taken = true;
                        break;
                    }
                }
                if !taken {
                    render_nodes(otherwise, dot, out)?;
                }
            }
            Node::Range {
                pipeline,
                body,
                otherwise,
            } => {
                let items: Vec<Value> = match eval_pipeline(pipeline, dot)? {
                    Value::List(items) => items,
                    Value::Map(map) => map.into_values().collect(),
                    Value::Null => Vec::new(),
                    other => {
                        return Err(TemplateError::exec(format!(
                            "range can't iterate over {}",
                            other.type_name()
                        )));
                    }
                };
                if items.is_empty() {
                    render_nodes(otherwise, dot, out)?;
                }
                for item in &items {
                    render_nodes(body, item, out)?;
                }
            }
        }
    }
    Ok(())
}

fn eval_pipeline(pipeline: &Pipeline, dot: &Value) -> TemplateResult<Value> {
    let mut piped: Option<Value> = None;
    for command in &pipeline.commands {
        piped = Some(eval_command(command, dot, piped)?);
    }
    Ok(piped.unwrap_or_default())
}

fn eval_command(command: &Command, dot: &Value, piped: Option<Value>) -> TemplateResult<Value> {
    let Some((first, rest)) = command.args.split_first() else {
        return Err(TemplateError::exec("empty command"));
    };

    if let Operand::Function(name) = first {
        let mut args = rest
            .iter()
            .map(|operand| eval_operand(operand, dot))
            .collect::<TemplateResult<Vec<_>>>()?;
        args.extend(piped);
        return funcs::call(name, &args);
    }

    if !rest.is_empty() || piped.is_some() {
        return Err(TemplateError::exec(format!(
            "can't give argument to non-function {first:?}"
        )));
    }
    eval_operand(first, dot)
}

fn eval_operand(operand: &Operand, dot: &Value) -> TemplateResult<Value> {
    match operand {
        Operand::Dot => Ok(dot.clone()),
        Operand::Field(path) => {
            let mut current = dot;
            for key in path {
                current = match current {
                    Value::Map(map) => map.get(key).unwrap_or(&NULL),
                    Value::Null => &NULL,
                    other => {
                        return Err(TemplateError::exec(format!(
                            "can't evaluate field {key} in type {}",
                            other.type_name()
                        )));
                    }
                };
            }
            Ok(current.clone())
        }
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Function(name) => funcs::call(name, &[]),
        Operand::Nested(pipeline) => eval_pipeline(pipeline, dot),
    }
}
