//! Content type lookup by file extension.

/// Content type used when the extension is not recognised.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    (".txt", "text/plain"),
    (".pdf", "application/pdf"),
    (".doc", "application/msword"),
    (
        ".docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".png", "image/png"),
    (".gif", "image/gif"),
    (".zip", "application/zip"),
];

/// Resolve the content type of `filename` from its lowercased suffix.
pub fn resolve(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix))
        .map(|(_, content_type)| *content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
