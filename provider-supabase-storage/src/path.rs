//! Object path convention

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `{category}/{epoch_millis}-{sanitized_name}`
pub fn object_path(category: &str, file_name: &str, epoch_millis: i64) -> String {
    format!(
        "{}/{}-{}",
        category,
        epoch_millis,
        sanitize_file_name(file_name)
    )
}

/// Percent-encode each path segment, keeping the separators.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
