use eframe::egui::{self, Label, RichText, ScrollArea, Stroke, Ui};
use tracing::info;

use super::common::{create_frame, LogPalette};
use crate::feed::DisplayRecord;

/// Renders the records oldest first and sticks to the bottom as new ones
/// arrive. Clicking a record copies its text to the clipboard.
pub fn message_log(ui: &mut Ui, records: &[DisplayRecord]) {
    let palette = LogPalette::from_visuals(ui.visuals());
    create_frame(palette.background, palette.border).show(ui, |ui| {
        ui.set_min_size(ui.available_size());

        if records.is_empty() {
            ui.centered_and_justified(|ui| {
                ui.weak("No messages yet");
            });
            return;
        }

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for record in records {
                    egui::Frame::new()
                        .stroke(Stroke::new(1.0, palette.border))
                        .inner_margin(4)
                        .fill(palette.record)
                        .show(ui, |ui| {
                            ui.set_width(ui.available_width());
                            ui.horizontal_top(|ui| {
                                ui.label(RichText::new(format!("#{}", record.id)).weak().small());
                                let response = ui.add(
                                    Label::new(RichText::new(&record.text).monospace())
                                        .wrap()
                                        .sense(egui::Sense::click()),
                                )
                                .on_hover_text("Click to copy");
                                if response.clicked() {
                                    ui.ctx().copy_text(record.text.clone());
                                    info!("Copied message #{} to clipboard", record.id);
                                }
                            });
                        });
                    ui.add_space(2.0);
                }
            });
    });
}
