//! Pure string-transformation helpers: task id generation, app identifier
//! derivation (SPEC_FULL.md §4.2), and directory-name sanitization.

use rand::Rng;

const TASK_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TASK_ID_LEN: usize = 12;

/// A 12-character URL-safe token, generated at admission.
pub fn generate_task_id() -> String {
    let mut rng = rand::rng();
    (0..TASK_ID_LEN)
        .map(|_| {
            let idx = rng.random_range(0..TASK_ID_ALPHABET.len());
            TASK_ID_ALPHABET[idx] as char
        })
        .collect()
}

/// Derives a reverse-DNS Java package identifier from an arbitrary app name.
///
/// Lowercases, replaces runs of non-`[a-z0-9]` with `.`, collapses consecutive
/// dots, strips leading/trailing dots, repairs empty/digit-leading segments,
/// and prefixes `com.vibecoding.`.
pub fn derive_app_id(app_name: &str) -> String {
    let lowered: String = app_name.to_lowercase();

    let mut collapsed = String::with_capacity(lowered.len());
    let mut last_was_sep = false;
    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            collapsed.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            collapsed.push('.');
            last_was_sep = true;
        }
    }

    let trimmed = collapsed.trim_matches('.');

    let suffix = if trimmed.is_empty() {
        "app".to_string()
    } else {
        trimmed
            .split('.')
            .enumerate()
            .map(|(index, segment)| repair_segment(segment, index))
            .collect::<Vec<_>>()
            .join(".")
    };

    format!("com.vibecoding.{suffix}")
}

fn repair_segment(segment: &str, index: usize) -> String {
    if segment.is_empty() {
        return format!("app{index}");
    }
    if segment.starts_with(|c: char| c.is_ascii_lowercase()) {
        segment.to_string()
    } else {
        format!("a{segment}")
    }
}

/// Sanitizes a string for use as a filesystem directory/workspace name,
/// distinct from [`derive_app_id`]. Protects external toolchains that do not
/// tolerate non-ASCII paths.
pub fn sanitize_dir_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || ch == '-' {
            out.push(ch);
            last_was_underscore = false;
        } else if !last_was_underscore {
            out.push('_');
            last_was_underscore = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.to_string()
    }
}
