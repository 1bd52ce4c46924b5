//! Template execution.

use std::fmt::Write;

use super::parse::{Command, Node, Operand, Pipeline};
use super::value::Value;
use super::{ExecError, ExecErrorKind, Template};

/// Maximum nesting of `{{template}}` invocations.
pub(crate) const MAX_DEPTH: usize = 100;

static NIL: Value = Value::Nil;

pub(crate) struct State<'a> {
    template: &'a Template,
    root: &'a Value,
    out: &'a mut String,
    current: &'a str,
    depth: usize,
}

impl<'a> State<'a> {
    pub(crate) fn new(template: &'a Template, root: &'a Value, out: &'a mut String) -> Self {
        Self {
            template,
            root,
            out,
            current: template.name(),
            depth: 0,
        }
    }

    fn error(&self, kind: ExecErrorKind) -> ExecError {
        ExecError {
            template: self.current.to_string(),
            kind,
        }
    }

    pub(crate) fn walk(&mut self, dot: &Value, nodes: &'a [Node]) -> Result<(), ExecError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Action(pipe) => {
                    let value = self.eval(dot, pipe)?;
                    // Writing to a String cannot fail.
                    let _ = write!(self.out, "{value}");
                }
                Node::If { pipe, body, otherwise } => {
                    if self.eval(dot, pipe)?.is_truthy() {
                        self.walk(dot, body)?;
                    } else {
                        self.walk(dot, otherwise)?;
                    }
                }
                Node::With { pipe, body, otherwise } => {
                    let value = self.eval(dot, pipe)?;
                    if value.is_truthy() {
                        self.walk(&value, body)?;
                    } else {
                        self.walk(dot, otherwise)?;
                    }
                }
                Node::Range { pipe, body, otherwise } => {
                    let items = match self.eval(dot, pipe)? {
                        Value::List(items) => items,
                        Value::Map(entries) => entries.into_values().collect(),
                        Value::Nil => Vec::new(),
                        other => {
                            return Err(self.error(ExecErrorKind::CannotRange(other.type_name())));
                        }
                    };
                    if items.is_empty() {
                        self.walk(dot, otherwise)?;
                    }
                    for item in &items {
                        self.walk(item, body)?;
                    }
                }
                Node::Template { name, pipe } => {
                    let value = match pipe {
                        Some(pipe) => self.eval(dot, pipe)?,
                        None => Value::Nil,
                    };
                    self.invoke(name, &value)?;
                }
            }
        }
        Ok(())
    }

    fn invoke(&mut self, name: &'a str, dot: &Value) -> Result<(), ExecError> {
        let template = self.template;
        let body = template
            .lookup(name)
            .ok_or_else(|| self.error(ExecErrorKind::NoSuchTemplate(name.to_string())))?;
        if self.depth >= MAX_DEPTH {
            return Err(self.error(ExecErrorKind::DepthExceeded));
        }

        let caller = std::mem::replace(&mut self.current, name);
        self.depth += 1;
        let result = self.walk(dot, body);
        self.depth -= 1;
        self.current = caller;
        result
    }

    fn eval(&self, dot: &Value, pipe: &Pipeline) -> Result<Value, ExecError> {
        self.eval_pipeline(dot, pipe).map_err(|kind| self.error(kind))
    }

    fn eval_pipeline(&self, dot: &Value, pipe: &Pipeline) -> Result<Value, ExecErrorKind> {
        let mut piped: Option<Value> = None;
        for command in &pipe.commands {
            let value = match command {
                Command::Operand(operand) => self.eval_operand(dot, operand)?,
                Command::Call(func, operands) => {
                    // `and` and `or` stop evaluating once the result is known.
                    let mut args = Vec::with_capacity(operands.len() + 1);
                    let mut settled = false;
                    for operand in operands {
                        let value = self.eval_operand(dot, operand)?;
                        settled = func.settles_on(&value);
                        args.push(value);
                        if settled {
                            break;
                        }
                    }
                    if !settled {
                        args.extend(piped.take());
                    }
                    func.call(args)?
                }
            };
            piped = Some(value);
        }
        Ok(piped.unwrap_or_default())
    }

    fn eval_operand(&self, dot: &Value, operand: &Operand) -> Result<Value, ExecErrorKind> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Field(chain) => resolve(dot, chain),
            Operand::Root(chain) => resolve(self.root, chain),
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Sub(pipe) => self.eval_pipeline(dot, pipe),
        }
    }
}

fn resolve(start: &Value, chain: &[String]) -> Result<Value, ExecErrorKind> {
    let mut current = start;
    for field in chain {
        current = match current {
            Value::Record { type_name, fields } => {
                fields
                    .get(field.as_str())
                    .ok_or_else(|| ExecErrorKind::NoField {
                        field: field.clone(),
                        type_name: *type_name,
                    })?
            }
            Value::Map(entries) => entries.get(field).unwrap_or(&NIL),
            Value::Nil => {
                return Err(ExecErrorKind::NilPointer {
                    field: field.clone(),
                });
            }
            other => {
                return Err(ExecErrorKind::NoField {
                    field: field.clone(),
                    type_name: other.type_name(),
                });
            }
        };
    }
    Ok(current.clone())
}
