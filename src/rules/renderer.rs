//! Response synthesis for matched rules.

use std::io;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, Request, StatusCode},
    response::Response,
};
use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};

use crate::http::request::template_data;
use crate::observability::metrics::Outcome;
use crate::template::{ParseError, Template};

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const TEXT_XML: &str = "text/xml; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Produces the body of a matched rule.
#[derive(Debug, Clone)]
pub enum Renderer {
    /// JSON serialized at compile time, trailing newline included.
    Json(Bytes),
    /// Body rendered per request with the request bound to `Request`.
    /// Without a configured content type the rendered body is sniffed.
    Template {
        template: Template,
        content_type: Option<HeaderValue>,
    },
}

impl Renderer {
    /// Serialize `data` once. `indent == 0` is compact, otherwise each
    /// nesting level is indented by `indent` spaces.
    pub fn json(
        data: &serde_json::Map<String, serde_json::Value>,
        indent: usize,
    ) -> Result<Self, serde_json::Error> {
        let mut buf = Vec::new();
        if indent == 0 {
            write_json(&mut buf, data, CompactFormatter)?;
        } else {
            let spaces = " ".repeat(indent);
            write_json(&mut buf, data, PrettyFormatter::with_indent(spaces.as_bytes()))?;
        }
        buf.push(b'\n');
        Ok(Renderer::Json(Bytes::from(buf)))
    }

    /// Parse `content` as a template, terminating it with exactly one newline.
    pub fn template(
        name: &str,
        content: &str,
        content_type: Option<HeaderValue>,
    ) -> Result<Self, ParseError> {
        let template = Template::parse(name, &with_trailing_newline(content))?;
        Ok(Renderer::Template {
            template,
            content_type,
        })
    }

    /// Build the response for `req`. A status override is applied to every
    /// outcome except a template execution failure, which is always a 500.
    pub fn render<B>(&self, status: Option<StatusCode>, req: &Request<B>) -> (Response, Outcome) {
        let (mut response, outcome) = match self {
            Renderer::Json(bytes) => {
                let mut response = Response::new(Body::from(bytes.clone()));
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
                (response, Outcome::Json)
            }
            Renderer::Template {
                template,
                content_type,
            } => match template.execute(&template_data(req)) {
                Ok(body) => {
                    let content_type = match content_type {
                        Some(value) => value.clone(),
                        None => HeaderValue::from_static(sniff_content_type(&body)),
                    };
                    let mut response = Response::new(Body::from(body));
                    response.headers_mut().insert(header::CONTENT_TYPE, content_type);
                    (response, Outcome::Template)
                }
                Err(e) => {
                    tracing::warn!(
                        template = %template.name(),
                        error = %e,
                        "Template execution failed"
                    );
                    return (render_error(&e), Outcome::TemplateError);
                }
            },
        };

        if let Some(status) = status {
            *response.status_mut() = status;
        }
        (response, outcome)
    }
}

/// Appends a newline unless `content` already ends with one.
pub fn with_trailing_newline(content: &str) -> String {
    let mut content = content.to_string();
    if !content.ends_with('\n') {
        content.push('\n');
    }
    content
}

fn write_json<F: Formatter>(
    buf: &mut Vec<u8>,
    data: &serde_json::Map<String, serde_json::Value>,
    formatter: F,
) -> Result<(), serde_json::Error> {
    let mut ser = serde_json::Serializer::with_formatter(buf, HtmlSafe(formatter));
    data.serialize(&mut ser)
}

/// Wraps a formatter so `<`, `>`, `&`, U+2028 and U+2029 inside strings are
/// written as `\u` escapes, matching Go's `encoding/json`.
struct HtmlSafe<F>(F);

impl<F: Formatter> Formatter for HtmlSafe<F> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            let escaped = match c {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_key(writer, first)
    }

    fn end_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_key(writer)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}

/// Content type for a template body that has none configured, following
/// the text signatures of Go's `http.DetectContentType`.
pub fn sniff_content_type(body: &str) -> &'static str {
    // Only the first 512 bytes are considered.
    let head = &body.as_bytes()[..body.len().min(512)];
    let start = head
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(head.len());
    let data = &head[start..];

    if HTML_SIGNATURES.iter().any(|sig| html_tag_at(data, sig)) {
        return TEXT_HTML;
    }
    if data.starts_with(b"<?xml") {
        return TEXT_XML;
    }
    if head.iter().any(|&b| matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)) {
        return OCTET_STREAM;
    }
    TEXT_PLAIN
}

const HTML_SIGNATURES: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Case-insensitive `signature` followed by a space or `>`.
fn html_tag_at(data: &[u8], signature: &[u8]) -> bool {
    data.len() > signature.len()
        && data[..signature.len()].eq_ignore_ascii_case(signature)
        && matches!(data[signature.len()], b' ' | b'>')
}

fn render_error(err: &dyn std::error::Error) -> Response {
    let mut response = Response::new(Body::from(format!("{err}\n")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn json_body(renderer: &Renderer) -> String {
        match renderer {
            Renderer::Json(bytes) => String::from_utf8(bytes.to_vec()).unwrap(),
            Renderer::Template { .. } => panic!("expected json renderer"),
        }
    }

    #[test]
    fn test_trailing_newline_is_idempotent() {
        assert_eq!(with_trailing_newline("Hello"), "Hello\n");
        assert_eq!(with_trailing_newline("Hello\n"), "Hello\n");
        assert_eq!(with_trailing_newline(""), "\n");
    }

    #[test]
    fn test_compact_json() {
        let renderer = Renderer::json(&object(json!({"b": 1, "a": {"c": [true]}})), 0).unwrap();
        assert_eq!(json_body(&renderer), "{\"a\":{\"c\":[true]},\"b\":1}\n");
    }

    #[test]
    fn test_json_escapes_html_characters() {
        let data = object(json!({"<key>": "<b>Tom & Jerry</b>\u{2028}"}));

        let renderer = Renderer::json(&data, 0).unwrap();
        assert_eq!(
            json_body(&renderer),
            "{\"\\u003ckey\\u003e\":\"\\u003cb\\u003eTom \\u0026 Jerry\\u003c/b\\u003e\\u2028\"}\n"
        );

        let renderer = Renderer::json(&object(json!({"a": ["x&y"]})), 2).unwrap();
        assert_eq!(json_body(&renderer), "{\n  \"a\": [\n    \"x\\u0026y\"\n  ]\n}\n");
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type("Hello World!\n"), TEXT_PLAIN);
        assert_eq!(sniff_content_type("{\"ok\": true}\n"), TEXT_PLAIN);
        assert_eq!(sniff_content_type("<h1>static.test</h1>\n"), TEXT_HTML);
        assert_eq!(sniff_content_type("\n  <!doctype html>\n<p>x</p>"), TEXT_HTML);
        assert_eq!(sniff_content_type("<html lang=\"en\">"), TEXT_HTML);
        assert_eq!(sniff_content_type("<?xml version=\"1.0\"?><a/>"), TEXT_XML);
        // A tag name must end at a space or `>`.
        assert_eq!(sniff_content_type("<bold>"), TEXT_PLAIN);
        assert_eq!(sniff_content_type("a\0b"), OCTET_STREAM);
        assert_eq!(sniff_content_type(""), TEXT_PLAIN);
    }

    #[test]
    fn test_template_content_type() {
        let req = Request::builder().uri("/").body(()).unwrap();

        let sniffed = Renderer::template("/", "<p>{{.Request.Method}}</p>", None).unwrap();
        let (response, outcome) = sniffed.render(None, &req);
        assert_eq!(outcome, Outcome::Template);
        assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_HTML);

        let configured = HeaderValue::from_static("text/csv");
        let fixed = Renderer::template("/", "<p>x</p>", Some(configured)).unwrap();
        let (response, _) = fixed.render(None, &req);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    }

    #[test]
    fn test_indented_json() {
        let renderer = Renderer::json(&object(json!({"a": {"b": 1}})), 3).unwrap();
        assert_eq!(json_body(&renderer), "{\n   \"a\": {\n      \"b\": 1\n   }\n}\n");
    }

    #[test]
    fn test_template_error_response() {
        let renderer = Renderer::template("/broken", "{{.Request.Missing}}", None).unwrap();
        let req = Request::builder().uri("/broken").body(()).unwrap();

        let (response, outcome) = renderer.render(Some(StatusCode::CREATED), &req);

        assert_eq!(outcome, Outcome::TemplateError);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[test]
    fn test_status_override() {
        let renderer = Renderer::json(&object(json!({"ok": true})), 0).unwrap();
        let req = Request::builder().uri("/").body(()).unwrap();

        let (response, outcome) = renderer.render(Some(StatusCode::ACCEPTED), &req);

        assert_eq!(outcome, Outcome::Json);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], APPLICATION_JSON);
    }
}
