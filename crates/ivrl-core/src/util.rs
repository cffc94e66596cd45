//! Utility functions for ivrl
//!
//! Text previews, float rendering, and `ivrl.env` loading.

use std::borrow::Cow;
use std::path::PathBuf;

/// First `max_chars` characters of `text`, with `...` appended when cut.
/// Cuts on character boundaries, never inside a multi-byte sequence.
///
/// # Example
/// ```
/// use ivrl_core::util::preview;
///
/// assert_eq!(preview("The implied volatility", 11), "The implied...");
/// assert_eq!(preview("short", 11), "short");
/// ```
pub fn preview(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}

/// Render a float the way it reads in a data file: integral values keep a
/// trailing `.0`, everything else uses the shortest round-trip form.
///
/// # Example
/// ```
/// use ivrl_core::util::format_float;
///
/// assert_eq!(format_float(500.0), "500.0");
/// assert_eq!(format_float(12.35), "12.35");
/// ```
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Candidate locations of the env file, in lookup order
fn env_file_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("ivrl.env")];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("ivrl").join("ivrl.env"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".config").join("ivrl").join("ivrl.env"));
    }
    candidates
}

/// Export variables from the first `ivrl.env` found (working directory, then
/// the user config directory). Variables already set are left alone.
pub fn load_env_file() {
    let Some(path) = env_file_candidates().into_iter().find(|p| p.is_file()) else {
        return;
    };
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            tracing::debug!("Loading environment from {}", path.display());
            parse_env_file(&contents);
        }
        Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
    }
}

/// One `KEY=value` assignment, `export` prefix and surrounding quotes
/// removed. Blank lines and `#` comments yield `None`.
pub fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let value = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value);
    Some((key, value))
}

/// Set every assignment in `contents` that is not already in the environment
pub fn parse_env_file(contents: &str) {
    for (key, value) in contents.lines().filter_map(parse_env_line) {
        if std::env::var_os(key).is_none() {
            std::env::set_var(key, value);
        }
    }
}
