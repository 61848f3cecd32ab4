/// Number of token characters left visible when printing a token id
const VISIBLE_TOKEN_CHARS: usize = 6;

/// Mask all but the first few characters of a secret
pub fn redact(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= VISIBLE_TOKEN_CHARS {
        "*".repeat(count)
    } else {
        let visible: String = secret.chars().take(VISIBLE_TOKEN_CHARS).collect();
        format!("{}...({} chars)", visible, count)
    }
}

/// Format an optional value, returning a default if None
pub fn format_optional<T: ToString>(value: Option<T>, default: &str) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Format a token lifetime in seconds for display
pub fn format_ttl(secs: i64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}
