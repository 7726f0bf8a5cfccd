//! Stored conversation log → request-shaped turns.

use crate::llm::{InlineImage, Part, Role, Turn};
use crate::store::StoredMessage;

/// Text part (if non-empty) followed by image part (if any).
pub fn input_parts(text: Option<&str>, image: Option<&InlineImage>) -> Vec<Part> {
    let mut parts = Vec::with_capacity(2);
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        parts.push(Part::Text(text.to_string()));
    }
    if let Some(image) = image {
        parts.push(Part::Image(image.clone()));
    }
    parts
}

/// Map stored messages to turns, dropping messages with neither text nor image.
pub fn to_turns(messages: &[StoredMessage]) -> Vec<Turn> {
    messages
        .iter()
        .map(|m| Turn { role: m.role, parts: input_parts(m.text.as_deref(), m.image.as_ref()) })
        .filter(|t| !t.parts.is_empty())
        .collect()
}

/// A usable context starts with a user turn: drop everything before the
/// first one, or everything if there is none.
pub fn validate_history(mut turns: Vec<Turn>) -> Vec<Turn> {
    match turns.iter().position(|t| t.role == Role::User) {
        Some(first_user) => {
            turns.drain(..first_user);
            turns
        }
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(role: Role, text: Option<&str>) -> StoredMessage {
        StoredMessage { id: None, role, text: text.map(str::to_string), image: None, timestamp: Utc::now() }
    }

    fn roles(turns: &[Turn]) -> Vec<Role> {
        turns.iter().map(|t| t.role).collect()
    }

    #[test]
    fn model_first_log_is_trimmed_to_first_user() {
        let turns = to_turns(&[
            msg(Role::Model, Some("Hello! I am Gemini")),
            msg(Role::User, Some("hi")),
            msg(Role::Model, Some("hey")),
        ]);
        assert_eq!(roles(&validate_history(turns)), vec![Role::User, Role::Model]);
    }

    #[test]
    fn log_without_user_collapses_to_empty() {
        let turns = to_turns(&[msg(Role::Model, Some("a")), msg(Role::Model, Some("b"))]);
        assert!(validate_history(turns).is_empty());
    }

    #[test]
    fn empty_messages_are_dropped() {
        let turns = to_turns(&[msg(Role::User, None), msg(Role::User, Some("")), msg(Role::User, Some("x"))]);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].joined_text(), "x");
    }

    #[test]
    fn image_follows_text() {
        let img = InlineImage { mime_type: "image/jpeg".into(), data: vec![1, 2] };
        let parts = input_parts(Some("look"), Some(&img));
        assert_eq!(parts, vec![Part::Text("look".into()), Part::Image(img)]);
    }
}
