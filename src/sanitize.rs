//! Filesystem-safe path segments from untrusted titles
//!
//! Page titles and attachment names come from a remote system and are used
//! as directory and file names. [`sanitize`] turns any string into a single
//! path segment that cannot escape its parent directory and is valid on both
//! Unix and Windows filesystems. It is idempotent.

/// Longest segment most filesystems accept, in bytes
const MAX_SEGMENT_BYTES: usize = 255;

/// Replacement for characters that are illegal in a path segment
const REPLACEMENT: char = '_';

/// Device names Windows refuses as file names, with or without extension
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Map an arbitrary title to a filesystem-safe path segment
///
/// # Examples
///
/// ```
/// use confluence_offline_copy::sanitize::sanitize;
///
/// assert_eq!(sanitize("Release notes 1/2"), "Release notes 1_2");
/// assert_eq!(sanitize("../../etc/passwd"), ".._.._etc_passwd");
/// assert_eq!(sanitize(".."), "_");
/// assert_eq!(sanitize("CON"), "_CON");
/// ```
pub fn sanitize(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| if is_forbidden(c) { REPLACEMENT } else { c })
        .collect();

    let mut output = trim_segment(&replaced).to_string();
    truncate_segment(&mut output, MAX_SEGMENT_BYTES);

    // Checked last: truncation can expose a device name
    if is_reserved(&output) {
        output.insert(0, REPLACEMENT);
        truncate_segment(&mut output, MAX_SEGMENT_BYTES);
    }

    if output.is_empty() {
        output.push(REPLACEMENT);
    }
    output
}

/// Sanitized file name `<title>.<extension>` that still fits in one segment
///
/// The title part is shortened if needed so the extension is never cut off.
pub fn file_name(title: &str, extension: &str) -> String {
    let suffix = format!(".{}", extension);
    let budget = MAX_SEGMENT_BYTES.saturating_sub(suffix.len());
    let mut stem = sanitize(title);
    while stem.len() > budget {
        truncate_segment(&mut stem, budget);
        stem = sanitize(&stem);
    }
    stem + &suffix
}

/// Cut `segment` to at most `max` bytes on a char boundary and re-trim
fn truncate_segment(segment: &mut String, max: usize) {
    if segment.len() <= max {
        return;
    }
    let mut end = max;
    while !segment.is_char_boundary(end) {
        end -= 1;
    }
    segment.truncate(end);
    let trimmed = trim_segment(segment).to_string();
    *segment = trimmed;
}

fn is_forbidden(c: char) -> bool {
    c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// Strip leading whitespace and trailing dots/whitespace
///
/// Removing trailing dots also turns "." and ".." into empty strings.
fn trim_segment(value: &str) -> &str {
    value
        .trim_start()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
}

fn is_reserved(segment: &str) -> bool {
    let stem = segment.split('.').next().unwrap_or(segment).trim_end();
    RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
}
