use std::collections::BTreeMap;

use http::HeaderMap;

pub(crate) const REDACTED: &str = "[REDACTED]";

const SENSITIVE_HEADER_KEYWORDS: [&str; 8] = [
    "authorization",
    "cookie",
    "key",
    "password",
    "secret",
    "session",
    "set-cookie",
    "token",
];

const SENSITIVE_QUERY_KEYWORDS: [&str; 5] =
    ["authorization", "key", "password", "secret", "token"];

pub(crate) fn is_sensitive_header_name(name: &str) -> bool {
    contains_sensitive_keyword(name, &SENSITIVE_HEADER_KEYWORDS)
}

pub(crate) fn is_sensitive_query_name(name: &str) -> bool {
    contains_sensitive_keyword(name, &SENSITIVE_QUERY_KEYWORDS)
}

fn contains_sensitive_keyword(name: &str, keywords: &[&str]) -> bool {
    let lowered = name.to_ascii_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

pub(crate) fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut redacted = BTreeMap::new();
    for (name, value) in headers {
        let text = if is_sensitive_header_name(name.as_str()) {
            REDACTED.to_owned()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        redacted.insert(name.as_str().to_owned(), text);
    }
    redacted
}

pub(crate) fn redact_url(url: &str) -> String {
    let (without_fragment, fragment) = match url.split_once('#') {
        Some((left, right)) => (left, Some(right)),
        None => (url, None),
    };
    let (base, query) = match without_fragment.split_once('?') {
        Some((left, right)) => (left, Some(right)),
        None => (without_fragment, None),
    };
    let Some(query) = query else {
        return url.to_owned();
    };

    let redacted_query = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if is_sensitive_query_name(name) => format!("{name}={REDACTED}"),
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&");

    let mut redacted = format!("{base}?{redacted_query}");
    if let Some(fragment) = fragment {
        redacted.push('#');
        redacted.push_str(fragment);
    }
    redacted
}
