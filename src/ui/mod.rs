//! # MQTT Screen
//!
//! The eframe application: a header with the broker and the three sheet
//! buttons, the message log in the center and a status bar at the bottom.
//!
//! The screen never touches the broker or the ingest buffer directly while
//! running. It reads two watch channels (display window, connection status),
//! sends [`MqttCommand`]s to the transport task and tells the feed poller
//! which sheet is open, so draining pauses while the user fills in a form.
//!
//! Closing the window tears the screen down: the ingest buffer is closed
//! first, then both background tasks are cancelled.

pub mod common;
pub mod message_log;
pub mod sheets;

use eframe::egui::{self, Button, Vec2};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::feed::{DisplayRecord, DisplayWindow, IngestBuffer, Sheet, TICK_PERIOD};
use crate::mqtt::message::{MqttCommand, OperationKind, StatusNotice};
use crate::mqtt::mqtt_handler::ConnectionStatus;

use self::common::{connection_color, connection_label};
use self::sheets::{SheetAction, SheetForms};

/// Channels and shared state the screen is built from.
pub struct ScreenChannels {
    pub window_rx: watch::Receiver<DisplayWindow>,
    pub status_rx: watch::Receiver<ConnectionStatus>,
    pub command_tx: mpsc::Sender<MqttCommand>,
    pub sheet_tx: watch::Sender<Option<Sheet>>,
    pub ingest: IngestBuffer,
    pub cancel: CancellationToken,
}

pub struct MqttScreen {
    broker_label: String,
    channels: ScreenChannels,
    records: Vec<DisplayRecord>,
    active_sheet: Option<Sheet>,
    forms: SheetForms,
    subscribed_topics: Vec<String>,
}

impl MqttScreen {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        broker_label: String,
        dark_theme: bool,
        subscribed_topics: Vec<String>,
        channels: ScreenChannels,
    ) -> Self {
        let theme = if dark_theme {
            egui::Theme::Dark
        } else {
            egui::Theme::Light
        };
        cc.egui_ctx.set_theme(theme);

        Self::from_parts(broker_label, subscribed_topics, channels)
    }

    fn from_parts(
        broker_label: String,
        subscribed_topics: Vec<String>,
        channels: ScreenChannels,
    ) -> Self {
        Self {
            broker_label,
            channels,
            records: Vec::new(),
            active_sheet: None,
            forms: SheetForms::default(),
            subscribed_topics,
        }
    }

    fn set_sheet(&mut self, sheet: Option<Sheet>) {
        if self.active_sheet == sheet {
            return;
        }
        debug!("Active sheet: {:?}", sheet);
        self.active_sheet = sheet;
        self.channels.sheet_tx.send_replace(sheet);
    }

    /// Picks up a new window snapshot if the poller published one.
    fn refresh_records(&mut self) {
        if self.channels.window_rx.has_changed().unwrap_or(false) {
            self.records = self.channels.window_rx.borrow_and_update().current_contents();
        }
    }

    fn submit(&mut self, command: MqttCommand) {
        let kind = command.kind();
        let topic = command.topic().to_string();
        if let Err(e) = self.channels.command_tx.try_send(command) {
            warn!("Could not hand {:?} request to the MQTT task: {}", kind, e);
            self.channels.ingest.append(
                StatusNotice::OperationFailed {
                    kind,
                    target: topic,
                    error: e.to_string(),
                }
                .to_string(),
            );
            return;
        }

        match kind {
            OperationKind::Subscribe if !self.subscribed_topics.contains(&topic) => {
                self.subscribed_topics.push(topic);
            }
            OperationKind::Unsubscribe => self.subscribed_topics.retain(|t| *t != topic),
            _ => {}
        }
    }

    fn header(&mut self, ui: &mut egui::Ui, status: &ConnectionStatus) {
        ui.horizontal_centered(|ui| {
            ui.heading("MQTT");
            ui.label(&self.broker_label);
            ui.colored_label(connection_color(status.state), "\u{2B24}");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let size = Vec2::new(100.0, 20.0);
                for sheet in [Sheet::Publish, Sheet::Unsubscribe, Sheet::Subscribe] {
                    if ui.add(Button::new(sheet.to_string()).min_size(size)).clicked() {
                        self.set_sheet(Some(sheet));
                    }
                }
            });
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui, status: &ConnectionStatus) {
        ui.horizontal_centered(|ui| {
            ui.colored_label(connection_color(status.state), connection_label(status.state));
            ui.separator();
            ui.label(format!("Received: {}", status.messages_received));
            ui.label(format!("Sent: {}", status.messages_sent));
            ui.separator();
            let last = status
                .last_activity
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            ui.label(format!("Last activity: {}", last));
            ui.separator();
            ui.label(format!("Topics: {}", self.subscribed_topics.len()));
        });
    }
}

impl eframe::App for MqttScreen {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(TICK_PERIOD);
        self.refresh_records();
        let status = self.channels.status_rx.borrow().clone();

        egui::TopBottomPanel::top("top_panel")
            .show_separator_line(false)
            .show(ctx, |ui| self.header(ui, &status));

        egui::TopBottomPanel::bottom("bottom_panel")
            .show_separator_line(false)
            .show(ctx, |ui| self.status_bar(ui, &status));

        egui::CentralPanel::default().show(ctx, |ui| {
            message_log::message_log(ui, &self.records);
        });

        if let Some(sheet) = self.active_sheet {
            match self.forms.render(ctx, sheet, &self.subscribed_topics) {
                SheetAction::Keep => {}
                SheetAction::Cancel => self.set_sheet(None),
                SheetAction::Submit(command) => {
                    self.submit(command);
                    self.set_sheet(None);
                }
            }
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Screen closing, stopping background tasks");
        self.channels.ingest.close();
        self.channels.cancel.cancel();
    }
}
