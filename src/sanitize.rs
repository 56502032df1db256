//! Deterministic sanitization of raw column names into storage identifiers.

/// Maximum length of a sanitized identifier.
const MAX_IDENTIFIER_LEN: usize = 64;

/// Placeholder used when sanitization leaves nothing behind.
const FALLBACK_IDENTIFIER: &str = "column";

/// Sanitize a raw name into a valid storage identifier.
///
/// Every character outside `[A-Za-z0-9_]` becomes an underscore, leading and
/// trailing underscores are stripped, the result is truncated to
/// [`MAX_IDENTIFIER_LEN`] (and re-stripped, so truncation cannot leave a
/// trailing underscore), and an empty result falls back to `"column"`.
///
/// The mapping is deterministic and idempotent: sanitizing an already
/// sanitized name returns it unchanged.
pub fn sanitize_identifier(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let mut out = replaced.trim_matches('_').to_string();
    if out.len() > MAX_IDENTIFIER_LEN {
        out.truncate(MAX_IDENTIFIER_LEN);
        out = out.trim_end_matches('_').to_string();
    }
    if out.is_empty() {
        out = FALLBACK_IDENTIFIER.to_string();
    }
    out
}

/// Sanitize a list of column names, disambiguating collisions.
///
/// The same source name always maps to the same destination name; when two
/// *different* source names collide after sanitization, later ones get a
/// positional `_2`, `_3`, … suffix so the destination table can be created.
pub fn sanitize_columns(names: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let base = sanitize_identifier(name);
        let mut candidate = base.clone();
        let mut n = 1usize;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        seen.push(candidate);
    }
    seen
}
