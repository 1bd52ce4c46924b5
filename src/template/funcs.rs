//! Builtin template functions.

use super::value::Value;
use super::ExecErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    And,
    Or,
    Not,
    Eq,
    Ne,
    Len,
    Index,
    Print,
}

impl Func {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "and" => Func::And,
            "or" => Func::Or,
            "not" => Func::Not,
            "eq" => Func::Eq,
            "ne" => Func::Ne,
            "len" => Func::Len,
            "index" => Func::Index,
            "print" => Func::Print,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Func::And => "and",
            Func::Or => "or",
            Func::Not => "not",
            Func::Eq => "eq",
            Func::Ne => "ne",
            Func::Len => "len",
            Func::Index => "index",
            Func::Print => "print",
        }
    }

    /// Whether `value` decides the result of `and`/`or` without looking at
    /// later arguments. Always false for other functions.
    pub(crate) fn settles_on(self, value: &Value) -> bool {
        match self {
            Func::And => !value.is_truthy(),
            Func::Or => value.is_truthy(),
            _ => false,
        }
    }

    pub(crate) fn call(self, mut args: Vec<Value>) -> Result<Value, ExecErrorKind> {
        match self {
            Func::And | Func::Or => {
                self.require_at_least(&args, 1)?;
                let last = args.len() - 1;
                let pos = args.iter().position(|v| self.settles_on(v)).unwrap_or(last);
                Ok(args.swap_remove(pos))
            }
            Func::Not => {
                self.require_exactly(&args, 1)?;
                Ok(Value::Bool(!args[0].is_truthy()))
            }
            Func::Eq => {
                self.require_at_least(&args, 2)?;
                for other in &args[1..] {
                    if equal(&args[0], other)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Func::Ne => {
                self.require_exactly(&args, 2)?;
                Ok(Value::Bool(!equal(&args[0], &args[1])?))
            }
            Func::Len => {
                self.require_exactly(&args, 1)?;
                let len = match &args[0] {
                    Value::Str(s) => s.len(),
                    Value::List(items) => items.len(),
                    Value::Map(entries) => entries.len(),
                    other => {
                        return Err(ExecErrorKind::BadArgument {
                            func: "len",
                            message: format!("len of type {}", other.type_name()),
                        });
                    }
                };
                Ok(Value::Int(len as i64))
            }
            Func::Index => {
                self.require_at_least(&args, 1)?;
                let keys = args.split_off(1);
                let mut item = args.pop().unwrap_or_default();
                for key in keys {
                    item = index(item, key)?;
                }
                Ok(item)
            }
            Func::Print => Ok(Value::Str(sprint(&args))),
        }
    }

    fn require_exactly(self, args: &[Value], n: usize) -> Result<(), ExecErrorKind> {
        if args.len() == n {
            Ok(())
        } else {
            Err(ExecErrorKind::WrongArgCount {
                func: self.name(),
                expected: n.to_string(),
                got: args.len(),
            })
        }
    }

    fn require_at_least(self, args: &[Value], n: usize) -> Result<(), ExecErrorKind> {
        if args.len() >= n {
            Ok(())
        } else {
            Err(ExecErrorKind::WrongArgCount {
                func: self.name(),
                expected: format!("at least {n}"),
                got: args.len(),
            })
        }
    }
}

fn equal(a: &Value, b: &Value) -> Result<bool, ExecErrorKind> {
    Ok(match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => {
            return Err(ExecErrorKind::Incomparable {
                left: a.type_name(),
                right: b.type_name(),
            });
        }
    })
}

fn index(item: Value, key: Value) -> Result<Value, ExecErrorKind> {
    match (item, key) {
        (Value::List(mut items), Value::Int(i)) => {
            let len = items.len();
            if i < 0 || i as usize >= len {
                return Err(ExecErrorKind::BadArgument {
                    func: "index",
                    message: format!("index out of range: {i}"),
                });
            }
            Ok(items.swap_remove(i as usize))
        }
        (Value::Map(mut entries), Value::Str(k)) => Ok(entries.remove(&k).unwrap_or_default()),
        (Value::Nil, _) => Err(ExecErrorKind::BadArgument {
            func: "index",
            message: "index of untyped nil".to_string(),
        }),
        (item, key) => Err(ExecErrorKind::BadArgument {
            func: "index",
            message: format!(
                "can't index item of type {} with {}",
                item.type_name(),
                key.type_name()
            ),
        }),
    }
}

/// `fmt.Sprint`: spaces go between operands when neither side is a string.
fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !matches!(arg, Value::Str(_)) && !matches!(args[i - 1], Value::Str(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}
