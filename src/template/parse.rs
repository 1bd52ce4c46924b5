//! Builds the node tree from grammar pieces and resolves function names.

use std::collections::HashMap;

use super::funcs::Func;
use super::grammar::{self, Action, Arg, Piece, RawPipeline};
use super::value::Value;
use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
    If {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Range {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    With {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Template {
        name: String,
        pipe: Option<Pipeline>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub(crate) commands: Vec<Command>,
}

/// A function call or a single operand. Stages after the first in a pipeline
/// are always calls; the previous stage's result is their last argument.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Call(Func, Vec<Operand>),
    Operand(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Dot,
    Field(Vec<String>),
    Root(Vec<String>),
    Literal(Value),
    Sub(Box<Pipeline>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    If,
    Range,
    With,
}

enum Stop {
    Eof,
    End,
    Else,
    ElseIf(Pipeline),
}

pub(crate) struct Parsed {
    pub(crate) root: Vec<Node>,
    pub(crate) defines: HashMap<String, Vec<Node>>,
}

pub(crate) fn parse(name: &str, source: &str) -> Result<Parsed, ParseError> {
    let pieces = grammar::pieces(source).map_err(|e| ParseError {
        name: name.to_string(),
        line: e.line,
        message: e.message,
    })?;
    let mut builder = Builder {
        name,
        pieces: pieces.into_iter(),
        line: 1,
        defines: HashMap::new(),
    };

    let (root, stop) = builder.parse_list(0)?;
    match stop {
        Stop::Eof => Ok(Parsed {
            root,
            defines: builder.defines,
        }),
        Stop::End => Err(builder.error("unexpected {{end}}")),
        Stop::Else | Stop::ElseIf(_) => Err(builder.error("unexpected {{else}}")),
    }
}

struct Builder<'a> {
    name: &'a str,
    pieces: std::vec::IntoIter<Piece>,
    line: usize,
    defines: HashMap<String, Vec<Node>>,
}

impl Builder<'_> {
    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            name: self.name.to_string(),
            line: self.line,
            message: message.into(),
        }
    }

    fn parse_list(&mut self, depth: usize) -> Result<(Vec<Node>, Stop), ParseError> {
        let mut nodes = Vec::new();

        while let Some(piece) = self.pieces.next() {
            let action = match piece {
                Piece::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Piece::Action { line, action } => {
                    self.line = line;
                    action
                }
            };

            match action {
                Action::End => return Ok((nodes, Stop::End)),
                Action::Else => return Ok((nodes, Stop::Else)),
                Action::ElseIf(cond) => return Ok((nodes, Stop::ElseIf(self.pipeline(cond)?))),
                Action::If(pipe) => {
                    let pipe = self.pipeline(pipe)?;
                    nodes.push(self.parse_control(Kind::If, pipe, depth)?);
                }
                Action::Range(pipe) => {
                    let pipe = self.pipeline(pipe)?;
                    nodes.push(self.parse_control(Kind::Range, pipe, depth)?);
                }
                Action::With(pipe) => {
                    let pipe = self.pipeline(pipe)?;
                    nodes.push(self.parse_control(Kind::With, pipe, depth)?);
                }
                Action::Define(name) => {
                    if depth > 0 {
                        return Err(self.error("define is only allowed at the top level"));
                    }
                    self.parse_define(name)?;
                }
                Action::Template(name, pipe) => {
                    let pipe = pipe.map(|pipe| self.pipeline(pipe)).transpose()?;
                    nodes.push(Node::Template { name, pipe });
                }
                Action::Pipeline(pipe) => nodes.push(Node::Action(self.pipeline(pipe)?)),
            }
        }

        Ok((nodes, Stop::Eof))
    }

    fn parse_control(
        &mut self,
        kind: Kind,
        pipe: Pipeline,
        depth: usize,
    ) -> Result<Node, ParseError> {
        let (body, stop) = self.parse_list(depth + 1)?;
        let otherwise = match stop {
            Stop::End => Vec::new(),
            Stop::Else => {
                let (otherwise, stop) = self.parse_list(depth + 1)?;
                match stop {
                    Stop::End => otherwise,
                    Stop::Eof => return Err(self.error("unexpected EOF")),
                    Stop::Else | Stop::ElseIf(_) => {
                        return Err(self.error("expected end; found else"));
                    }
                }
            }
            // `{{else if}}` shares the enclosing `{{end}}`.
            Stop::ElseIf(cond) if kind == Kind::If => {
                vec![self.parse_control(Kind::If, cond, depth)?]
            }
            Stop::ElseIf(_) => return Err(self.error("else if is only allowed in if")),
            Stop::Eof => return Err(self.error("unexpected EOF")),
        };

        Ok(match kind {
            Kind::If => Node::If { pipe, body, otherwise },
            Kind::Range => Node::Range { pipe, body, otherwise },
            Kind::With => Node::With { pipe, body, otherwise },
        })
    }

    fn parse_define(&mut self, name: String) -> Result<(), ParseError> {
        let (body, stop) = self.parse_list(1)?;
        match stop {
            Stop::End => {}
            Stop::Eof => return Err(self.error("unexpected EOF in define")),
            Stop::Else | Stop::ElseIf(_) => {
                return Err(self.error("unexpected {{else}} in define"));
            }
        }
        if self.defines.contains_key(&name) {
            return Err(self.error(format!("multiple definition of template {name:?}")));
        }
        self.defines.insert(name, body);
        Ok(())
    }

    fn pipeline(&self, raw: RawPipeline) -> Result<Pipeline, ParseError> {
        build_pipeline(raw).map_err(|message| self.error(message))
    }
}

fn build_pipeline(raw: RawPipeline) -> Result<Pipeline, String> {
    let mut commands = Vec::with_capacity(raw.len());
    for (stage, args) in raw.into_iter().enumerate() {
        let command = build_command(args)?;
        if stage > 0 && !matches!(command, Command::Call(..)) {
            return Err("non-function in pipeline stage".to_string());
        }
        commands.push(command);
    }
    Ok(Pipeline { commands })
}

fn build_command(args: Vec<Arg>) -> Result<Command, String> {
    let mut args = args.into_iter();
    match args.next() {
        Some(Arg::Word(word)) => {
            let func = Func::lookup(&word).ok_or_else(|| format!("function {word:?} not defined"))?;
            let operands = args.map(operand).collect::<Result<_, _>>()?;
            Ok(Command::Call(func, operands))
        }
        Some(first) => {
            if args.next().is_some() {
                return Err("can't give argument to non-function".to_string());
            }
            match operand(first)? {
                Operand::Literal(Value::Nil) => Err("nil is not a command".to_string()),
                operand => Ok(Command::Operand(operand)),
            }
        }
        None => Err("missing value for command".to_string()),
    }
}

fn operand(arg: Arg) -> Result<Operand, String> {
    Ok(match arg {
        Arg::Dot => Operand::Dot,
        Arg::Field(chain) => Operand::Field(chain),
        Arg::Root(chain) => Operand::Root(chain),
        Arg::Literal(value) => Operand::Literal(value),
        Arg::Sub(raw) => Operand::Sub(Box::new(build_pipeline(raw)?)),
        Arg::Word(word) => {
            return Err(format!(
                "function {word:?} used as an argument; wrap the call in parentheses"
            ));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_src(src: &str) -> Result<Parsed, ParseError> {
        parse("t", src)
    }

    #[test]
    fn test_define_is_hoisted() {
        let parsed = parse_src(r#"{{define "T"}}Hi{{end}}{{template "T" .}}"#).unwrap();
        assert_eq!(parsed.defines["T"], vec![Node::Text("Hi".into())]);
        assert!(matches!(
            parsed.root.as_slice(),
            [Node::Template { name, pipe: Some(_) }] if name == "T"
        ));
    }

    #[test]
    fn test_else_if_chain_shares_end() {
        let parsed = parse_src("{{if .A}}a{{else if .B}}b{{else}}c{{end}}").unwrap();
        let [Node::If { otherwise, .. }] = parsed.root.as_slice() else {
            panic!("expected single if");
        };
        assert!(matches!(otherwise.as_slice(), [Node::If { .. }]));
    }

    #[test]
    fn test_pipeline_stages() {
        let parsed = parse_src(r#"{{.Name | print "x" | len}}"#).unwrap();
        let [Node::Action(pipe)] = parsed.root.as_slice() else {
            panic!("expected action");
        };
        assert_eq!(pipe.commands.len(), 3);
        assert!(matches!(pipe.commands[0], Command::Operand(Operand::Field(_))));
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("{{end}}", "unexpected {{end}}"),
            ("{{else}}", "unexpected {{else}}"),
            ("{{if .A}}open", "unexpected EOF"),
            ("{{nope .A}}", "function \"nope\" not defined"),
            ("{{.A .B}}", "can't give argument to non-function"),
            ("{{.A | .B}}", "non-function in pipeline stage"),
            ("{{}}", "missing value for command"),
            ("{{nil}}", "nil is not a command"),
            ("{{(len .A}}", "unclosed left paren"),
            ("{{if .A}}{{define \"T\"}}{{end}}{{end}}", "define is only allowed at the top level"),
            (
                "{{define \"T\"}}a{{end}}{{define \"T\"}}b{{end}}",
                "multiple definition of template \"T\"",
            ),
            ("{{template .Name}}", "template requires a quoted name"),
            (
                "{{len index}}",
                "function \"index\" used as an argument; wrap the call in parentheses",
            ),
            ("{{range .A}}x{{else if .B}}y{{end}}", "else if is only allowed in if"),
        ];
        for (src, message) in cases {
            let err = parse_src(src).err().unwrap_or_else(|| panic!("{src} should fail"));
            assert_eq!(err.message, message, "source: {src}");
        }
    }
}
