//! Per-request directive extraction.
//!
//! Directives are `key` / `key.value` commands embedded between marker
//! characters in URL path segments, query parameters, and the comma-separated
//! values of the directive header. Everything lands in one flat map built
//! once per request; later occurrences of a key overwrite earlier ones.

use std::collections::HashMap;
use tracing::debug;

/// Fixed key under which the cache-control override header is stored,
/// verbatim, with no marker extraction.
pub const CC_OVERRIDE_KEY: &str = "cc";

/// The per-request directive map. Built during parsing, mutated by the
/// header pre-pass (write-backs), and dropped with the request.
#[derive(Debug, Default, Clone)]
pub struct DirectiveMap {
    inner: HashMap<String, String>,
}

impl DirectiveMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), value.into());
    }

    /// Parse a directive value as i64, treating absent and malformed values
    /// as absent.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Extract directives from a request, in order: path segments, query
/// parameters, then each comma-separated value of each directive header
/// occurrence. Later writes win.
pub fn extract(
    path: &str,
    query: Option<&str>,
    header_values: &[&str],
    marker: char,
) -> DirectiveMap {
    let mut map = DirectiveMap::new();

    for segment in path.split('/') {
        if segment.is_empty() {
            continue;
        }
        match urlencoding::decode(segment) {
            Ok(decoded) => apply_command(&mut map, &decoded, marker),
            Err(err) => debug!("skipping undecodable path segment {segment:?}: {err}"),
        }
    }

    if let Some(query) = query {
        for param in query.split('&') {
            if param.is_empty() {
                continue;
            }
            match urlencoding::decode(param) {
                Ok(decoded) => apply_command(&mut map, &decoded, marker),
                Err(err) => debug!("skipping undecodable query parameter {param:?}: {err}"),
            }
        }
    }

    for value in header_values {
        for part in value.split(',') {
            apply_command(&mut map, part.trim(), marker);
        }
    }

    map
}

/// Pull the command out of one decoded string and store it. The command is
/// the substring between the first two markers (or from the first marker to
/// the end); strings without a marker carry no command and are ignored.
fn apply_command(map: &mut DirectiveMap, decoded: &str, marker: char) {
    let Some(start) = decoded.find(marker) else {
        return;
    };
    let rest = &decoded[start + marker.len_utf8()..];
    let command = match rest.find(marker) {
        Some(end) => &rest[..end],
        None => rest,
    };
    if command.is_empty() {
        return;
    }
    match command.split_once('.') {
        Some((key, value)) => map.insert(key, value),
        None => map.insert(command, ""),
    }
}
