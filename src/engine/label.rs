use super::error::EngineError;

/// Keyword in front of the opening brace, e.g. `sec1` for `sec1{intro}`.
pub fn marker_keyword(body: &str) -> &str {
    body.split('{').next().unwrap_or_default().trim()
}

/// Identifiers compare case-insensitively and ignore any whitespace inside them.
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|character| !character.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

pub fn extract_identifier(body: &str, keyword: &str) -> Result<String, EngineError> {
    let malformed = |reason| EngineError::MalformedMarker {
        marker: body.to_string(),
        reason,
    };

    let Some((head, rest)) = body.split_once('{') else {
        return Err(malformed("missing opening brace"));
    };
    if !head.trim().eq_ignore_ascii_case(keyword) {
        return Err(malformed("keyword does not match the catalog"));
    }
    let Some((raw, _)) = rest.split_once('}') else {
        return Err(malformed("missing closing brace"));
    };
    if raw.contains('{') {
        return Err(malformed("nested opening brace"));
    }

    let identifier = normalize_identifier(raw);
    if identifier.is_empty() {
        return Err(malformed("empty identifier"));
    }

    Ok(identifier)
}
