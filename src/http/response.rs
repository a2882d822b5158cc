//! Generated HTML responses.
//!
//! # Responsibilities
//! - Wrap page fragments in a minimal HTML document
//! - Render the service directory and error pages
//! - Escape every registry-derived string before it reaches markup
//!
//! # Design Decisions
//! - Every generated response is `text/html`
//! - Pages are self-contained (no external assets)

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;

/// Build an HTML response with the given status.
pub fn html(status: StatusCode, contents: &str) -> Response {
    let mut response = Response::new(Body::from(document(contents)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    response
}

/// Listing of every registered service, or a hint on how to register one.
pub fn directory_page(domains: &[String], registry_dir: &str) -> String {
    if domains.is_empty() {
        return format!(
            "<h1>No available services</h1><p>Define some services in <code>{}</code> to get started.</p>",
            escape(registry_dir)
        );
    }

    let items: String = domains
        .iter()
        .map(|domain| {
            let domain = escape(domain);
            format!("<li><a href=\"http://{domain}\">{domain}</a></li>")
        })
        .collect();
    format!("<h1>Available services</h1><ul>{items}</ul>")
}

/// Shown when the registered port has no listener.
pub fn not_started_page(domain: &str, port: u16, directory_url: &str) -> String {
    format!(
        "<h1>Service not started</h1><p>{} expects a listener on port {}</p><a href=\"{}\">Available services</a>",
        escape(domain),
        port,
        escape(directory_url)
    )
}

/// Generic failure page with diagnostic detail.
pub fn error_page(detail: &str) -> String {
    format!("<h1>Error</h1><pre>{}</pre>", escape(detail))
}

/// Standalone 500 response for failures outside the handler (e.g. layer errors).
pub fn internal_error(detail: &str) -> Response {
    html(StatusCode::INTERNAL_SERVER_ERROR, &error_page(detail))
}

fn document(contents: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>Proxy</title>\n<style>\nbody {{ font-family: sans-serif; }}\n</style>\n</head>\n<body>\n{contents}\n</body>\n</html>"
    )
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
