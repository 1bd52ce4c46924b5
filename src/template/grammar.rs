//! Template source grammar.
//!
//! Splits a source into text runs and actions and parses each action's
//! body. Function names are left unresolved; [`super::parse`] checks them
//! while assembling the node tree.

use winnow::ascii::{digit1, multispace0, multispace1};
use winnow::combinator::{alt, cut_err, not, opt, peek, preceded, repeat, separated, terminated};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext};
use winnow::prelude::*;
use winnow::token::{any, one_of, rest, take_till, take_until, take_while};

use super::value::Value;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";

/// One argument of a command, before function names are resolved.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    Word(String),
    Dot,
    Field(Vec<String>),
    Root(Vec<String>),
    Literal(Value),
    Sub(RawPipeline),
}

/// Pipeline stages, each a list of arguments.
pub(crate) type RawPipeline = Vec<Vec<Arg>>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    End,
    Else,
    ElseIf(RawPipeline),
    If(RawPipeline),
    Range(RawPipeline),
    With(RawPipeline),
    Define(String),
    Template(String, Option<RawPipeline>),
    Pipeline(RawPipeline),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Piece {
    Text(String),
    Action { line: usize, action: Action },
}

#[derive(Debug)]
pub(crate) struct SyntaxError {
    pub(crate) line: usize,
    pub(crate) message: String,
}

/// Splits `source` into pieces, applying `{{-` / `-}}` trim markers and
/// dropping comments.
pub(crate) fn pieces(source: &str) -> Result<Vec<Piece>, SyntaxError> {
    let mut input = source;
    let mut pieces = Vec::new();
    let mut trim_leading = false;

    while !input.is_empty() {
        let text = run(&mut input, source, alt((take_until(0.., LEFT_DELIM), rest)))?;
        if input.is_empty() {
            push_text(&mut pieces, text, trim_leading, false);
            break;
        }

        let line = line_at(source, input);
        let (trim_trailing, action, trim_next) = run(&mut input, source, delimited_action)?;
        push_text(&mut pieces, text, trim_leading, trim_trailing);
        trim_leading = trim_next;
        if let Some(action) = action {
            pieces.push(Piece::Action { line, action });
        }
    }

    Ok(pieces)
}

fn run<'i, O>(
    input: &mut &'i str,
    source: &str,
    mut parser: impl Parser<&'i str, O, ErrMode<ContextError>>,
) -> Result<O, SyntaxError> {
    let start = *input;
    parser.parse_next(input).map_err(|err| SyntaxError {
        line: line_at(source, start),
        message: message(&err),
    })
}

fn message(err: &ErrMode<ContextError>) -> String {
    let context = match err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e,
        ErrMode::Incomplete(_) => return "unexpected EOF".to_string(),
    };
    context
        .context()
        .find_map(|c| match c {
            StrContext::Label(label) => Some(label.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "unexpected input in action".to_string())
}

fn line_at(source: &str, remaining: &str) -> usize {
    source[..source.len() - remaining.len()].matches('\n').count() + 1
}

fn push_text(pieces: &mut Vec<Piece>, text: &str, trim_leading: bool, trim_trailing: bool) {
    let mut text = text;
    if trim_leading {
        text = text.trim_start_matches(is_space);
    }
    if trim_trailing {
        text = text.trim_end_matches(is_space);
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text.to_string()));
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

// -- Delimiters & comments ------------------------------------------------

/// `{{ ... }}` with optional trim markers. Comments yield `None`.
fn delimited_action(input: &mut &str) -> ModalResult<(bool, Option<Action>, bool)> {
    LEFT_DELIM.parse_next(input)?;
    // `{{-3}}` is a number, not a trim marker.
    let trim_before = opt(('-', peek(multispace1))).parse_next(input)?.is_some();
    multispace0.parse_next(input)?;
    let action = alt((comment.value(None), action.map(Some))).parse_next(input)?;
    let trim_after = close(input)?;
    Ok((trim_before, action, trim_after))
}

fn comment(input: &mut &str) -> ModalResult<()> {
    preceded(
        "/*",
        cut_err(terminated(take_until(0.., "*/"), "*/"))
            .context(StrContext::Label("unclosed comment")),
    )
    .void()
    .parse_next(input)
}

fn close(input: &mut &str) -> ModalResult<bool> {
    let trim = opt((multispace1, '-', peek(RIGHT_DELIM))).parse_next(input)?.is_some();
    multispace0.parse_next(input)?;
    let label = if input.contains(RIGHT_DELIM) {
        "unexpected input in action"
    } else {
        "unclosed action"
    };
    cut_err(RIGHT_DELIM).context(StrContext::Label(label)).parse_next(input)?;
    Ok(trim)
}

// -- Actions --------------------------------------------------------------

fn action(input: &mut &str) -> ModalResult<Action> {
    alt((
        keyword("end").value(Action::End),
        preceded(
            keyword("else"),
            opt(preceded((multispace1, keyword("if")), required_pipeline)),
        )
        .map(|cond| cond.map_or(Action::Else, Action::ElseIf)),
        preceded(keyword("if"), required_pipeline).map(Action::If),
        preceded(keyword("range"), required_pipeline).map(Action::Range),
        preceded(keyword("with"), required_pipeline).map(Action::With),
        preceded(keyword("define"), quoted_name("define requires a quoted name"))
            .map(Action::Define),
        preceded(
            keyword("template"),
            (quoted_name("template requires a quoted name"), opt(pipeline)),
        )
        .map(|(name, pipe)| Action::Template(name, pipe)),
        required_pipeline.map(Action::Pipeline),
    ))
    .parse_next(input)
}

fn keyword<'i>(word: &'static str) -> impl Parser<&'i str, &'i str, ErrMode<ContextError>> {
    terminated(word, not(one_of(is_ident_char)))
}

fn quoted_name<'i>(label: &'static str) -> impl Parser<&'i str, String, ErrMode<ContextError>> {
    preceded(multispace0, cut_err(string_literal).context(StrContext::Label(label)))
}

// -- Pipelines ------------------------------------------------------------

fn required_pipeline(input: &mut &str) -> ModalResult<RawPipeline> {
    cut_err(pipeline)
        .context(StrContext::Label("missing value for command"))
        .parse_next(input)
}

fn pipeline(input: &mut &str) -> ModalResult<RawPipeline> {
    separated(1.., command, (multispace0, '|')).parse_next(input)
}

fn command(input: &mut &str) -> ModalResult<Vec<Arg>> {
    repeat(1.., preceded(multispace0, arg)).parse_next(input)
}

fn arg(input: &mut &str) -> ModalResult<Arg> {
    alt((
        preceded(
            '(',
            cut_err(terminated(pipeline, (multispace0, ')')))
                .context(StrContext::Label("unclosed left paren")),
        )
        .map(Arg::Sub),
        string_literal.map(|s| Arg::Literal(Value::Str(s))),
        raw_string.map(|s| Arg::Literal(Value::Str(s))),
        number.map(Arg::Literal),
        preceded('$', repeat(0.., field)).map(Arg::Root),
        repeat(1.., field).map(Arg::Field),
        '.'.value(Arg::Dot),
        ident.map(|word| match word {
            "true" => Arg::Literal(Value::Bool(true)),
            "false" => Arg::Literal(Value::Bool(false)),
            "nil" => Arg::Literal(Value::Nil),
            _ => Arg::Word(word.to_string()),
        }),
    ))
    .parse_next(input)
}

// -- Names ----------------------------------------------------------------

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .parse_next(input)
}

fn field(input: &mut &str) -> ModalResult<String> {
    preceded('.', ident).map(str::to_string).parse_next(input)
}

// -- Literals -------------------------------------------------------------

fn number(input: &mut &str) -> ModalResult<Value> {
    (
        opt(one_of(['+', '-'])),
        alt((digit1.void(), ('.', digit1).void())),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '.' || c == '_'),
        // Exponent sign, as in `1e-3`.
        opt((one_of(['+', '-']), digit1)),
    )
        .take()
        .verify_map(number_value)
        .parse_next(input)
}

fn number_value(text: &str) -> Option<Value> {
    let digits = text.replace('_', "");
    let (negative, unsigned) = match digits.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, digits.trim_start_matches('+')),
    };

    if let Some(hex) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        let n = i64::from_str_radix(hex, 16).ok()?;
        Some(Value::Int(if negative { -n } else { n }))
    } else if unsigned.contains(['.', 'e', 'E']) {
        digits.parse().ok().map(Value::Float)
    } else {
        digits.parse().ok().map(Value::Int)
    }
}

fn string_literal(input: &mut &str) -> ModalResult<String> {
    preceded(
        '"',
        cut_err(string_body).context(StrContext::Label("unterminated quoted string")),
    )
    .parse_next(input)
}

fn string_body(input: &mut &str) -> ModalResult<String> {
    let mut s = String::new();
    loop {
        match any.parse_next(input)? {
            '"' => return Ok(s),
            '\n' => return Err(ErrMode::from_input(input)),
            '\\' => match any.parse_next(input)? {
                'n' => s.push('\n'),
                't' => s.push('\t'),
                'r' => s.push('\r'),
                '0' => s.push('\0'),
                'u' => s.push(unicode_escape(input)?),
                other => s.push(other),
            },
            c => s.push(c),
        }
    }
}

fn unicode_escape(input: &mut &str) -> ModalResult<char> {
    take_while(4, |c: char| c.is_ascii_hexdigit())
        .verify_map(|hex| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32))
        .parse_next(input)
}

fn raw_string(input: &mut &str) -> ModalResult<String> {
    preceded(
        '`',
        cut_err(terminated(take_till(0.., '`'), '`'))
            .context(StrContext::Label("unterminated raw quoted string")),
    )
    .map(str::to_string)
    .parse_next(input)
}
