use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// Custom ids of the control buttons
pub mod button_ids {
    pub const PAUSE_RESUME: &str = "pause_resume";
    pub const SKIP: &str = "skip";
    pub const STOP: &str = "stop";
    pub const LOOP: &str = "loop";
    pub const LIKE: &str = "like";
}

const LABEL_PLAY: &str = "▶";
const LABEL_PAUSE: &str = "⏸";
const LABEL_SKIP: &str = "⏭";
const LABEL_STOP: &str = "⏹";
const LABEL_LOOP: &str = "↻";
const LABEL_LIKE: &str = "♡";

/// A press on one of the now-playing controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    PauseResume,
    Skip,
    Stop,
    Loop,
    Like,
}

impl ControlAction {
    pub fn from_custom_id(id: &str) -> Option<Self> {
        match id {
            button_ids::PAUSE_RESUME => Some(Self::PauseResume),
            button_ids::SKIP => Some(Self::Skip),
            button_ids::STOP => Some(Self::Stop),
            button_ids::LOOP => Some(Self::Loop),
            button_ids::LIKE => Some(Self::Like),
            _ => None,
        }
    }
}

/// Green when looping, grey otherwise.
pub fn loop_style(loop_enabled: bool) -> ButtonStyle {
    if loop_enabled {
        ButtonStyle::Success
    } else {
        ButtonStyle::Secondary
    }
}

fn pause_resume_label(paused: bool) -> &'static str {
    if paused {
        LABEL_PLAY
    } else {
        LABEL_PAUSE
    }
}

/// Control row for the now-playing message, rendered from the current flags.
pub fn player_controls(paused: bool, loop_enabled: bool) -> Vec<CreateActionRow> {
    let buttons = vec![
        CreateButton::new(button_ids::PAUSE_RESUME)
            .label(pause_resume_label(paused))
            .style(ButtonStyle::Success),
        CreateButton::new(button_ids::SKIP)
            .label(LABEL_SKIP)
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::STOP)
            .label(LABEL_STOP)
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::LOOP)
            .label(LABEL_LOOP)
            .style(loop_style(loop_enabled)),
        CreateButton::new(button_ids::LIKE)
            .label(LABEL_LIKE)
            .style(ButtonStyle::Secondary),
    ];

    vec![CreateActionRow::Buttons(buttons)]
}
