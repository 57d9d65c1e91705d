// Answer-length guards for the submission path.
//
// These bounds are a UX guard, not a security boundary: the remote API is the
// source of truth for what it accepts.

use thiserror::Error;

pub const MIN_ANSWER_CHARS: usize = 140;
pub const MAX_ANSWER_CHARS: usize = 1499;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnswerGuardError {
    #[error("answer is empty")]
    Empty,

    #[error("answer is {len} characters; minimum is {min}")]
    TooShort { len: usize, min: usize },
}

/// Validates an answer against the length bounds.
///
/// Leading/trailing whitespace is trimmed before counting. Answers below the
/// minimum are rejected; answers above the maximum are truncated at a char
/// boundary (mirroring the input field's hard cap).
pub fn validate_answer(text: &str) -> Result<String, AnswerGuardError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AnswerGuardError::Empty);
    }

    let len = trimmed.chars().count();
    if len < MIN_ANSWER_CHARS {
        return Err(AnswerGuardError::TooShort {
            len,
            min: MIN_ANSWER_CHARS,
        });
    }

    Ok(clip_answer(trimmed).to_string())
}

/// Hard cap applied to the draft as it is edited; truncation happens at a
/// char boundary.
pub fn clip_answer(text: &str) -> &str {
    truncate_chars(text, MAX_ANSWER_CHARS)
}

/// Whether an Enter keypress (without shift) should submit the draft.
///
/// Below the minimum the keystroke is absorbed so a half-typed answer is not
/// submitted by accident.
pub fn enter_submits(draft: &str, shift_held: bool) -> bool {
    !shift_held && validate_answer(draft).is_ok()
}

/// Renders remaining recording time as `mm:ss`.
pub fn format_remaining(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
