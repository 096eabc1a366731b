//! Message validation.
//!
//! Applied to participant-authored messages after stamping. Notices the relay
//! writes itself never pass through here.

use crate::error::Rejection;
use crate::message::MessageKind;

/// Longest accepted chat body, in characters.
pub const MAX_CONTENT_CHARS: usize = 5000;

/// Check a candidate's kind and body.
///
/// Rules run in order: empty body, oversized body, unknown kind. An empty
/// `kind` counts as absent.
pub fn validate(kind: &str, body: &str) -> Result<(), Rejection> {
    if body.is_empty() {
        return Err(Rejection::EmptyContent);
    }
    let len = body.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(Rejection::ContentTooLong { len });
    }
    if !kind.is_empty() && MessageKind::from_wire(kind).is_none() {
        return Err(Rejection::InvalidType(kind.to_string()));
    }
    Ok(())
}
