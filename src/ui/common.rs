//! Shared colors and small helpers for the screen.

use eframe::egui::{Color32, Frame, Stroke, Visuals};

use crate::mqtt::mqtt_handler::ConnectionState;

/// Centralized color palette for the dark theme.
///
/// Background colors go from darkest to lightest: EXTREME_BG, INNER_BG.
/// ACTIVE, PENDING and INACTIVE color the connection indicator.
pub struct UiColors;

impl UiColors {
    pub const INNER_BG: Color32 = Color32::from_rgb(25, 25, 25);

    pub const EXTREME_BG: Color32 = Color32::from_rgb(20, 20, 20);

    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    /// Connected (RGB: 50, 200, 20)
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Connecting or reconnecting (RGB: 220, 170, 20)
    pub const PENDING: Color32 = Color32::from_rgb(220, 170, 20);

    /// Disconnected (RGB: 200, 50, 20)
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);

    pub const ERROR_TEXT: Color32 = Color32::from_rgb(230, 90, 70);
}

pub fn connection_color(state: ConnectionState) -> Color32 {
    match state {
        ConnectionState::Connected => UiColors::ACTIVE,
        ConnectionState::Connecting | ConnectionState::Reconnecting => UiColors::PENDING,
        ConnectionState::Disconnected => UiColors::INACTIVE,
    }
}

pub fn connection_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "Disconnected",
        ConnectionState::Connecting => "Connecting",
        ConnectionState::Connected => "Connected",
        ConnectionState::Reconnecting => "Reconnecting",
    }
}

/// Colors of the message log frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogPalette {
    pub background: Color32,
    pub record: Color32,
    pub border: Color32,
}

impl LogPalette {
    /// Fixed dark palette in dark mode, otherwise taken from `visuals`.
    pub fn from_visuals(visuals: &Visuals) -> Self {
        if visuals.dark_mode {
            Self {
                background: UiColors::INNER_BG,
                record: UiColors::EXTREME_BG,
                border: UiColors::BORDER,
            }
        } else {
            Self {
                background: visuals.faint_bg_color,
                record: visuals.extreme_bg_color,
                border: visuals.widgets.noninteractive.bg_stroke.color,
            }
        }
    }
}

/// Frame with the border and margins used around every panel.
pub fn create_frame(bg_color: Color32, border_color: Color32) -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, border_color))
        .fill(bg_color)
        .inner_margin(4)
        .outer_margin(2)
}
