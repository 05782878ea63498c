//! Model-backed agents that read the store, call a model, and write back.
//!
//! None of these keep state between ticks except the camera agent's image
//! cooldown.

pub mod camera;
pub mod insights;
pub mod sentiment;

pub use self::camera::CameraAgent;
pub use self::insights::InsightsAgent;
pub use self::sentiment::SentimentAgent;

/// First `max` characters of `text`, on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
