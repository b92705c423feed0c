//! Local fragment pointers (`#/components/schemas/User`)
//!
//! Parsing follows RFC 6901 escaping (`~1` is `/`, `~0` is `~`) and also
//! percent-decodes each segment, since fragment identifiers in `$ref`
//! values are URI fragments.

use serde_json::Value;

/// Split a local pointer into unescaped segments.
///
/// Returns `None` for anything that is not a local fragment pointer
/// (external files, URLs, empty strings).
pub fn parse_pointer(pointer: &str) -> Option<Vec<String>> {
    let fragment = pointer.strip_prefix('#')?;
    if fragment.is_empty() {
        return Some(Vec::new());
    }
    let rest = fragment.strip_prefix('/')?;
    Some(rest.split('/').map(unescape_segment).collect())
}

/// Walk a tree along already-parsed segments. Any missing segment yields `None`.
pub fn walk<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments {
        let segment = segment.as_ref();
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(node)
}

/// Build a local pointer from raw (unescaped) segments.
pub fn pointer_for<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::from("#");
    for segment in segments {
        out.push('/');
        out.push_str(&escape_segment(segment.as_ref()));
    }
    out
}

pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_segment(segment: &str) -> String {
    percent_decode(segment).replace("~1", "/").replace("~0", "~")
}

fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pointer() {
        assert_eq!(parse_pointer("#"), Some(vec![]));
        assert_eq!(
            parse_pointer("#/components/schemas/User"),
            Some(vec!["components".into(), "schemas".into(), "User".into()])
        );
        assert_eq!(
            parse_pointer("#/paths/~1users~1{id}/get"),
            Some(vec!["paths".into(), "/users/{id}".into(), "get".into()])
        );
        assert_eq!(
            parse_pointer("#/paths/~1users~1%7Bid%7D"),
            Some(vec!["paths".into(), "/users/{id}".into()])
        );
        assert_eq!(parse_pointer("#/a~0b"), Some(vec!["a~b".into()]));
        assert_eq!(parse_pointer("other.yaml#/a"), None);
        assert_eq!(parse_pointer("#a"), None);
    }

    #[test]
    fn test_walk_mappings_and_sequences() {
        let doc = json!({"servers": [{"url": "https://a"}, {"url": "https://b"}]});
        assert_eq!(
            walk(&doc, &["servers", "1", "url"]),
            Some(&json!("https://b"))
        );
        assert_eq!(walk(&doc, &["servers", "7", "url"]), None);
        assert_eq!(walk(&doc, &["servers", "x"]), None);
        assert_eq!(walk(&doc, &["servers", "0", "url", "deeper"]), None);
    }

    #[test]
    fn test_pointer_round_trip() {
        let pointer = pointer_for(&["paths", "/users/{id}", "get"]);
        assert_eq!(pointer, "#/paths/~1users~1{id}/get");
        assert_eq!(
            parse_pointer(&pointer),
            Some(vec!["paths".into(), "/users/{id}".into(), "get".into()])
        );
    }
}
