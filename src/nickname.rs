//! Nickname policy
//!
//! 3-12 characters, first character a letter, the rest letters,
//! digits or underscore.

use std::sync::LazyLock;

use regex::Regex;

static NICKNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]{2,11}$").expect("nickname pattern is valid")
});

/// Check a display name against the nickname policy
pub fn is_valid_nickname(name: &str) -> bool {
    NICKNAME_RE.is_match(name)
}
