//! Discord presentation: embeds and the now-playing control buttons.

pub mod buttons;
pub mod embeds;
