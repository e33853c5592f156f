//! DAV-namespace XML bodies.
//!
//! Encoding is a pure function of its input: a given ordered entry
//! sequence always yields byte-identical output. No timestamps, no map
//! iteration, no pretty-printing.

use crate::resource::Resource;

/// Advertised quota when a resource does not carry its own: 1 GiB.
pub const DEFAULT_QUOTA_AVAILABLE_BYTES: u64 = 1 << 30;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="utf-8" ?>"#;
const STATUS_OK: &str = "HTTP/1.1 200 OK";

/// One `<D:response>` in a multistatus body: a resource description paired
/// with its sub-status line. Built per response, never persisted.
#[derive(Debug, Clone)]
pub struct MultistatusEntry<'a> {
    pub resource: &'a Resource,
    pub status: &'a str,
}

impl<'a> MultistatusEntry<'a> {
    /// An entry that resolved successfully.
    pub fn ok(resource: &'a Resource) -> Self {
        Self {
            resource,
            status: STATUS_OK,
        }
    }
}

/// Encode a `D:multistatus` document for the given entries.
pub fn multistatus(entries: &[MultistatusEntry<'_>]) -> String {
    let mut out = String::with_capacity(256 + entries.len() * 256);
    out.push_str(XML_DECL);
    out.push_str(r#"<D:multistatus xmlns:D="DAV:">"#);
    for entry in entries {
        push_response(&mut out, entry);
    }
    out.push_str("</D:multistatus>");
    out
}

fn push_response(out: &mut String, entry: &MultistatusEntry<'_>) {
    let resource = entry.resource;

    out.push_str("<D:response>");
    out.push_str(&format!("<D:href>{}</D:href>", escape_text(&resource.path)));
    out.push_str("<D:propstat><D:prop>");

    if resource.is_collection {
        out.push_str("<D:resourcetype><D:collection/></D:resourcetype>");
    } else {
        out.push_str("<D:resourcetype/>");
    }

    // Unknown length or type means the element is absent, not empty.
    if let Some(len) = resource.content_length {
        out.push_str(&format!(
            "<D:getcontentlength>{}</D:getcontentlength>",
            len
        ));
    }
    if let Some(ref content_type) = resource.content_type {
        out.push_str(&format!(
            "<D:getcontenttype>{}</D:getcontenttype>",
            escape_text(content_type)
        ));
    }

    let quota = resource
        .quota_available_bytes
        .unwrap_or(DEFAULT_QUOTA_AVAILABLE_BYTES);
    out.push_str(&format!(
        "<D:quota-available-bytes>{}</D:quota-available-bytes>",
        quota
    ));

    out.push_str("</D:prop>");
    out.push_str(&format!("<D:status>{}</D:status>", entry.status));
    out.push_str("</D:propstat></D:response>");
}

/// Encode the LOCK discovery body echoing an issued token.
pub fn lock_discovery(token: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8" ?>"#,
            r#"<D:prop xmlns:D="DAV:">"#,
            "<D:lockdiscovery><D:activelock>",
            "<D:locktoken><D:href>opaquelocktoken:{token}</D:href></D:locktoken>",
            "</D:activelock></D:lockdiscovery>",
            "</D:prop>"
        ),
        token = escape_text(token)
    )
}

fn escape_text(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
