//! Nickname rules.
//!
//! A nickname is a letter followed by 2 to 19 letters, digits or underscores.
//! Comparison is ASCII case-insensitive everywhere.

use crate::error::ChatError;
use regex::Regex;
use std::sync::LazyLock;

static NICKNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]{2,19}$").expect("nickname pattern"));

/// Check the nickname format.
pub fn validate(nick: &str) -> Result<(), ChatError> {
    if NICKNAME_RE.is_match(nick) {
        Ok(())
    } else {
        Err(ChatError::IllegalNickname(nick.to_string()))
    }
}

/// Strip spaces and backslashes, then any trailing CR/LF.
pub fn sanitize(input: &str) -> String {
    let cleaned: String = input.chars().filter(|c| *c != ' ' && *c != '\\').collect();
    cleaned.trim_end_matches(['\r', '\n']).to_string()
}

/// Registry key for a nickname.
#[inline]
pub fn normalize(nick: &str) -> String {
    nick.to_ascii_lowercase()
}
