//! Log file location, timestamps and ANSI stripping.
use std::path::PathBuf;

/// `chrono` pattern for the log file header.
pub(super) const DATETIME: &str = "%Y-%m-%d %H:%M:%S";
/// `chrono` pattern for each log line.
pub(super) const TIME: &str = "%H:%M:%S";

/// Current UTC time rendered with `pattern`.
pub(super) fn utc_now(pattern: &str) -> String {
    chrono::Utc::now().format(pattern).to_string()
}

/// Remove terminal escape sequences from `s`.
///
/// A CSI sequence (`ESC [`) runs up to its final byte in `@`..=`~`; any
/// other escape swallows exactly one following character.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            chars
                .by_ref()
                .take_while(|c| !('@'..='~').contains(c))
                .for_each(drop);
        }
    }
    out
}

/// `<cache>/dotsync/<command>.log`, creating the directory.
///
/// `<cache>` is `$XDG_CACHE_HOME`, else `.cache` under `$HOME` (or
/// `%USERPROFILE%`), else `./.cache`.  `None` if the directory cannot be
/// created.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let cache = std::env::var_os("XDG_CACHE_HOME").map_or_else(
        || {
            std::env::var_os("HOME")
                .or_else(|| std::env::var_os("USERPROFILE"))
                .map_or_else(|| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    );
    let dir = cache.join("dotsync");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}
