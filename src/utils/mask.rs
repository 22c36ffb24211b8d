//! Helpers that keep secret material out of terminal output and logs.

/// Mask a secret value for display, keeping only enough to recognise it.
///
/// Values of 8 characters or fewer are fully masked.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    format!("{}****", head)
}

/// Strip userinfo (tokens, passwords) from a URL before it is logged or
/// shown in an error message. Non-URL strings are returned unchanged.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    match authority.rfind('@') {
        Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
        None => url.to_string(),
    }
}

/// Replace every occurrence of a URL's userinfo inside free text (git stderr).
pub(crate) fn redact_text(text: &str, url: &str) -> String {
    let redacted = redact_url(url);
    if redacted == url {
        text.to_string()
    } else {
        text.replace(url, &redacted)
    }
}
