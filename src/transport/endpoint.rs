use super::channel::ConnectError;

/// Build the per-user WebSocket endpoint from the configured backend URL.
///
/// `http://` becomes `ws://` and `https://` becomes `wss://`; a bare host is
/// treated as plain `ws://`. The path always ends in `/ws/<user_id>`.
pub fn endpoint_for(base_url: &str, user_id: &str) -> Result<String, ConnectError> {
    let invalid = |reason: &str| ConnectError::InvalidEndpoint {
        endpoint: base_url.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = base_url.trim();
    let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        ("ws", rest)
    } else if let Some(rest) = trimmed.strip_prefix("wss://") {
        ("wss", rest)
    } else if let Some(rest) = trimmed.strip_prefix("ws://") {
        ("ws", rest)
    } else if trimmed.contains("://") {
        return Err(invalid("unsupported scheme"));
    } else {
        ("ws", trimmed)
    };

    let rest = rest.trim_end_matches('/');
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(invalid("empty user id"));
    }
    if user_id.contains('/') || user_id.chars().any(char::is_whitespace) {
        return Err(invalid("user id must be a single path segment"));
    }

    let base = if rest.ends_with("/ws") {
        rest.to_string()
    } else {
        format!("{rest}/ws")
    };

    Ok(format!("{scheme}://{base}/{user_id}"))
}
