//! Out-of-scope per §1 ("HTML link extraction: an opaque function
//! string -> list<URL>"): a minimal extractor exists only so the worker
//! binary has something to call at §4.4.2 step 5. It does not attempt to
//! handle malformed markup beyond "skip the attribute".

use crate::model::Link;

/// Scans `body` for `href="..."` / `href='...'` attribute values, resolves
/// each against `page_url`, and returns the absolute URL strings.
#[must_use]
pub fn extract_links(body: &str, page_url: &str) -> Vec<String> {
    let lower = body.to_lowercase();
    let mut out = Vec::new();
    let mut search_from = 0;

    while let Some(rel) = lower[search_from..].find("href") {
        let pos = search_from + rel + "href".len();
        let Some(eq) = lower[pos..].find('=') else {
            break;
        };
        let after_eq = pos + eq + 1;
        let bytes = body.as_bytes();
        let mut i = after_eq;
        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        let Some(&quote) = bytes.get(i) else { break };
        if quote != b'"' && quote != b'\'' {
            search_from = after_eq;
            continue;
        }
        let start = i + 1;
        let Some(end_rel) = body[start..].find(quote as char) else {
            break;
        };
        let end = start + end_rel;
        let raw = &body[start..end];
        search_from = end + 1;

        if raw.is_empty() || raw.starts_with('#') || raw.starts_with("javascript:") {
            continue;
        }
        // `page_url` is always Some, so `Link::new` cannot hit its
        // relative-without-parent panic here.
        out.push(Link::new(raw, Some(page_url)).url);
    }
    out
}
