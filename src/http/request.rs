//! Request inspection.
//!
//! # Responsibilities
//! - Extract the path rules are matched against
//! - Expose the request to templates as `.Request`
//!
//! # Design Decisions
//! - The match path is percent-decoded; undecodable paths are used raw
//! - Template data is built only when a template rule matched
//! - Field and header names follow the Go `net/http` shapes template authors
//!   expect (`.Request.URL.Path`, `index .Request.Header "Accept" 0`)

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{header, HeaderMap, Request},
};

use crate::template::Value;

/// Decoded request path used for rule matching.
pub fn request_path<B>(req: &Request<B>) -> Cow<'_, str> {
    let raw = req.uri().path();
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Template data for `req`: a map with a single `Request` entry.
pub fn template_data<B>(req: &Request<B>) -> Value {
    Value::map([("Request", request_value(req))])
}

fn request_value<B>(req: &Request<B>) -> Value {
    let uri = req.uri();

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or_default();

    let request_uri = if uri.scheme().is_some() {
        uri.to_string()
    } else {
        uri.path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string())
    };

    let content_length = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);

    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    Value::record(
        "http.Request",
        [
            ("Method", Value::from(req.method().as_str())),
            ("URL", url_value(req)),
            ("Proto", Value::from(format!("{:?}", req.version()))),
            ("Header", header_value(req.headers())),
            ("Host", Value::from(host)),
            ("RequestURI", Value::from(request_uri)),
            ("ContentLength", Value::from(content_length)),
            ("RemoteAddr", Value::from(remote_addr)),
        ],
    )
}

fn url_value<B>(req: &Request<B>) -> Value {
    let uri = req.uri();
    let raw_path = uri.path();
    let path = request_path(req);
    let raw_query = uri.query().unwrap_or_default();

    let mut query: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        query
            .entry(key.into_owned())
            .or_default()
            .push(Value::from(value.into_owned()));
    }

    Value::record(
        "url.URL",
        [
            ("Scheme", Value::from(uri.scheme_str().unwrap_or_default())),
            ("Host", Value::from(uri.authority().map(|a| a.as_str()).unwrap_or_default())),
            // RawPath is only kept when decoding changed the path.
            ("RawPath", Value::from(if path == raw_path { "" } else { raw_path })),
            ("Path", Value::from(path.into_owned())),
            ("RawQuery", Value::from(raw_query)),
            ("Query", lists(query)),
        ],
    )
}

fn header_value(headers: &HeaderMap) -> Value {
    let mut values: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (name, value) in headers {
        values
            .entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(Value::from(String::from_utf8_lossy(value.as_bytes()).into_owned()));
    }
    lists(values)
}

fn lists(entries: BTreeMap<String, Vec<Value>>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(key, values)| (key, Value::List(values)))
            .collect(),
    )
}

/// `content-type` → `Content-Type`.
fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper = c == '-';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;

    fn render(src: &str, req: &Request<()>) -> String {
        Template::parse("t", src)
            .unwrap()
            .execute(&template_data(req))
            .unwrap()
    }

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("content-type"), "Content-Type");
        assert_eq!(canonical_header_name("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_header_name("accept"), "Accept");
    }

    #[test]
    fn test_request_path_decodes() {
        let req = Request::builder().uri("/a%20b/c?x=%20").body(()).unwrap();
        assert_eq!(request_path(&req), "/a b/c");
    }

    #[test]
    fn test_request_fields() {
        let req = Request::builder()
            .method("POST")
            .uri("/items/a%2Fb?tag=x&tag=y&q=1")
            .header("host", "example.com")
            .header("accept", "text/plain")
            .header("accept", "*/*")
            .header("content-length", "12")
            .body(())
            .unwrap();

        assert_eq!(
            render(
                "{{.Request.Method}} {{.Request.Host}} {{.Request.Proto}} {{.Request.ContentLength}}",
                &req
            ),
            "POST example.com HTTP/1.1 12"
        );
        assert_eq!(
            render("{{.Request.URL.Path}} {{.Request.URL.RawPath}}", &req),
            "/items/a/b /items/a%2Fb"
        );
        assert_eq!(
            render(r#"{{.Request.URL.RawQuery}} {{index .Request.URL.Query "tag" 1}}"#, &req),
            "tag=x&tag=y&q=1 y"
        );
        assert_eq!(render(r#"{{index .Request.Header "Accept" 1}}"#, &req), "*/*");
        assert_eq!(render("{{.Request.RequestURI}}", &req), "/items/a%2Fb?tag=x&tag=y&q=1");
        assert_eq!(render("[{{.Request.RemoteAddr}}]", &req), "[]");
    }

    #[test]
    fn test_remote_addr_from_connect_info() {
        let mut req = Request::builder().uri("/").body(()).unwrap();
        let addr: SocketAddr = "10.0.0.1:4242".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));

        assert_eq!(render("{{.Request.RemoteAddr}}", &req), "10.0.0.1:4242");
    }
}
