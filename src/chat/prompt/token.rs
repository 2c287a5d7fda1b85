//! Length-based token estimation.
//!
//! Not a tokenizer: a cheap per-character heuristic that is good enough to
//! bound prompt size.

use crate::chat::core::message::ChatMessage;

/// Estimated token length of a string.
///
/// ASCII letters count a quarter token, other ASCII characters half a token,
/// and anything outside ASCII one and a half tokens.
#[must_use]
pub fn estimate_token_length(input: &str) -> f64 {
    input
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphabetic() {
                0.25
            } else if ch.is_ascii() {
                0.5
            } else {
                1.5
            }
        })
        .sum()
}

/// Summed token estimate of a message sequence.
#[must_use]
pub fn count_messages<'a, I>(messages: I) -> f64
where
    I: IntoIterator<Item = &'a ChatMessage>,
{
    messages
        .into_iter()
        .map(|m| estimate_token_length(m.text()))
        .sum()
}
