//! Identifier grammar and deterministic name allocation.

/// Whether `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Map an arbitrary string onto the identifier grammar.
///
/// Runs of invalid characters collapse to one `_`, trailing underscores
/// introduced that way are trimmed, and a leading digit gets a `_` prefix.
/// Generic-looking names keep their argument: `Page<User>` becomes
/// `Page_User`.
pub fn sanitize_identifier(name: &str) -> String {
    if is_identifier(name) {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 1);
    let mut pending_separator = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c);
        } else {
            pending_separator = true;
        }
    }
    if out.is_empty() {
        return "_".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// First candidate in `base`, `base2`, `base3`, ... that `taken` rejects.
pub fn next_free(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2u64..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Upper-camel-case a media subtype or other token for use as a name
/// suffix: `vnd.api+xml` becomes `VndApiXml`.
pub fn pascal_case(token: &str) -> String {
    token
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}
