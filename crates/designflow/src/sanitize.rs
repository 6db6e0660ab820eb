//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Prompts are free text typed by users and asset paths may reveal local
//! directory layouts; neither goes into spans verbatim.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Describes a prompt by length and fingerprint instead of its text.
///
/// `"make it denim"` → `"13 chars #1f2e…"` (16 hex digits).
pub fn redact_prompt(prompt: &str) -> String {
    format!("{} chars #{}", prompt.chars().count(), fingerprint(prompt))
}

/// Returns a short deterministic hash for correlation without exposing the
/// input.
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
