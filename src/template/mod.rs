//! Text templates for rule bodies.
//!
//! # Responsibilities
//! - Parse a template source once, at rule compile time
//! - Execute it per request against a [`Value`] tree
//! - Report parse errors with a line number and execution errors with the
//!   name of the template being executed
//!
//! # Syntax
//! The language follows Go's `text/template`:
//!
//! ```text
//! {{.Request.URL.Path}}                      field chains on the dot
//! {{index .Request.Header "Accept" 0}}       builtin functions
//! {{.Name | print "hi "}}                    pipelines
//! {{if .A}}..{{else if .B}}..{{else}}..{{end}}
//! {{range .List}}{{.}}{{else}}empty{{end}}
//! {{with .A}}{{.}}{{end}}
//! {{define "T"}}Hello {{.}}{{end}}{{template "T" "you"}}
//! {{- /* comment */ -}}                      trim markers and comments
//! ```
//!
//! Builtins: `and`, `or`, `not`, `eq`, `ne`, `len`, `index`, `print`.
//! `$` is the data passed to [`Template::execute`].
//!
//! # Design Decisions
//! - Parsed templates are immutable and `Send + Sync`
//! - Variables other than `$` and method calls are not supported
//! - `{{template}}` nesting depth is bounded

mod exec;
mod funcs;
mod grammar;
mod parse;
mod value;

use std::collections::HashMap;

use thiserror::Error;

use self::parse::Node;
pub use self::value::Value;

/// A template source that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("template: {name}:{line}: {message}")]
pub struct ParseError {
    pub name: String,
    pub line: usize,
    pub message: String,
}

/// A template that failed while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("template: {template}: {kind}")]
pub struct ExecError {
    /// Name of the template executing when the error occurred.
    pub template: String,
    pub kind: ExecErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecErrorKind {
    #[error("can't evaluate field {field} in type {type_name}")]
    NoField {
        field: String,
        type_name: &'static str,
    },
    #[error("nil pointer evaluating field {field}")]
    NilPointer { field: String },
    #[error("no such template {0:?}")]
    NoSuchTemplate(String),
    #[error("wrong number of args for {func}: want {expected} got {got}")]
    WrongArgCount {
        func: &'static str,
        expected: String,
        got: usize,
    },
    #[error("error calling {func}: {message}")]
    BadArgument { func: &'static str, message: String },
    #[error("incompatible types for comparison: {left} and {right}")]
    Incomparable {
        left: &'static str,
        right: &'static str,
    },
    #[error("range can't iterate over {0}")]
    CannotRange(&'static str),
    #[error("exceeded maximum template depth ({})", exec::MAX_DEPTH)]
    DepthExceeded,
}

/// A parsed template together with the templates it `define`s.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    root: Vec<Node>,
    defines: HashMap<String, Vec<Node>>,
}

impl Template {
    /// Parse `source`. `name` labels errors and lets the template invoke
    /// itself with `{{template "<name>"}}`.
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, ParseError> {
        let name = name.into();
        let parsed = parse::parse(&name, source)?;
        Ok(Self {
            name,
            root: parsed.root,
            defines: parsed.defines,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the template with `data` as both `.` and `$`.
    pub fn execute(&self, data: &Value) -> Result<String, ExecError> {
        let mut out = String::new();
        exec::State::new(self, data, &mut out).walk(data, &self.root)?;
        Ok(out)
    }

    fn lookup(&self, name: &str) -> Option<&[Node]> {
        self.defines
            .get(name)
            .map(Vec::as_slice)
            .or_else(|| (name == self.name).then_some(self.root.as_slice()))
    }
}
