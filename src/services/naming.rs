//! Deterministic object keys for job results.

use crate::models::job::JobId;

/// Prefix for single-job results.
pub const SINGLE_RESULTS_PREFIX: &str = "results";

/// Key for a single-job result: `results/<job_id>/<stem>_modified.<ext>`.
pub fn make_key(job_id: &JobId, filename: Option<&str>, ext: &str) -> String {
    scoped_key(SINGLE_RESULTS_PREFIX, job_id, filename, ext)
}

/// Key for one batch result, named after the input object's base name.
pub fn make_batch_key(output_prefix: &str, job_id: &JobId, input_key: &str, ext: &str) -> String {
    let base_name = input_key.rsplit('/').next().unwrap_or(input_key);
    scoped_key(output_prefix, job_id, Some(base_name), ext)
}

fn scoped_key(prefix: &str, job_id: &JobId, filename: Option<&str>, ext: &str) -> String {
    let stem = filename
        .map(strip_extension)
        .and_then(sanitize_stem)
        .unwrap_or_else(|| format!("image_{}", job_id.short()));

    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("{job_id}/{stem}_modified.{ext}")
    } else {
        format!("{prefix}/{job_id}/{stem}_modified.{ext}")
    }
}

/// Drop the last extension of the final path segment. Leading dots (".env")
/// do not count as an extension.
fn strip_extension(name: &str) -> &str {
    let base_start = name.rfind('/').map_or(0, |i| i + 1);
    let base = &name[base_start..];

    match base.rfind('.') {
        Some(dot) if base[..dot].chars().any(|c| c != '.') => &name[..base_start + dot],
        _ => name,
    }
}

/// Reduce `raw` to `[A-Za-z0-9_.-]`, turning each run of whitespace or other
/// characters into one underscore and trimming `.`, `_` and `-` from both
/// ends. Returns `None` when nothing usable is left.
pub fn sanitize_stem(raw: &str) -> Option<String> {
    let mut stem = String::with_capacity(raw.len());
    let mut in_run = false;

    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            stem.push(c);
            in_run = false;
        } else if !in_run {
            stem.push('_');
            in_run = true;
        }
    }

    let trimmed = stem.trim_matches(|c| matches!(c, '.' | '_' | '-'));
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
