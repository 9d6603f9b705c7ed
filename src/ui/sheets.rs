//! Subscribe, unsubscribe and publish sheets.
//!
//! Each sheet is an egui [`Modal`] backed by a small form struct. The forms
//! keep their input between openings and validate on submit; an invalid form
//! stays open and shows the problem inline.

use eframe::egui::{self, ComboBox, Context, Id, Modal, TextEdit, Ui};
use rumqttc::QoS;

use super::common::UiColors;
use crate::feed::Sheet;
use crate::mqtt::message::{qos_label, MqttCommand, QOS_LEVELS};

/// What the user did with the open sheet this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetAction {
    Keep,
    Cancel,
    Submit(MqttCommand),
}

fn topic_error(topic: &str, allow_wildcards: bool) -> Option<&'static str> {
    if topic.is_empty() {
        Some("Topic must not be empty")
    } else if !allow_wildcards && (topic.contains('+') || topic.contains('#')) {
        Some("Topic must not contain wildcards")
    } else {
        None
    }
}

#[derive(Debug)]
pub struct SubscribeForm {
    pub topic: String,
    pub qos: QoS,
    error: Option<&'static str>,
}

impl Default for SubscribeForm {
    fn default() -> Self {
        Self {
            topic: String::new(),
            qos: QoS::AtMostOnce,
            error: None,
        }
    }
}

impl SubscribeForm {
    pub fn submit(&mut self) -> Option<MqttCommand> {
        let topic = self.topic.trim().to_string();
        self.error = topic_error(&topic, true);
        if self.error.is_some() {
            return None;
        }
        self.topic.clear();
        Some(MqttCommand::Subscribe {
            topic,
            qos: self.qos,
        })
    }
}

#[derive(Debug, Default)]
pub struct UnsubscribeForm {
    pub topic: String,
    error: Option<&'static str>,
}

impl UnsubscribeForm {
    pub fn submit(&mut self) -> Option<MqttCommand> {
        let topic = self.topic.trim().to_string();
        self.error = topic_error(&topic, true);
        if self.error.is_some() {
            return None;
        }
        self.topic.clear();
        Some(MqttCommand::Unsubscribe { topic })
    }
}

#[derive(Debug)]
pub struct PublishForm {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
    error: Option<&'static str>,
}

impl Default for PublishForm {
    fn default() -> Self {
        Self {
            topic: String::new(),
            payload: String::new(),
            qos: QoS::AtMostOnce,
            retain: false,
            error: None,
        }
    }
}

impl PublishForm {
    /// Keeps topic and payload so the same message can be sent again.
    pub fn submit(&mut self) -> Option<MqttCommand> {
        let topic = self.topic.trim().to_string();
        self.error = topic_error(&topic, false);
        if self.error.is_some() {
            return None;
        }
        Some(MqttCommand::Publish {
            topic,
            payload: self.payload.clone().into_bytes(),
            qos: self.qos,
            retain: self.retain,
        })
    }
}

#[derive(Debug, Default)]
pub struct SheetForms {
    pub subscribe: SubscribeForm,
    pub unsubscribe: UnsubscribeForm,
    pub publish: PublishForm,
}

impl SheetForms {
    pub fn render(&mut self, ctx: &Context, sheet: Sheet, subscribed: &[String]) -> SheetAction {
        match sheet {
            Sheet::Subscribe => {
                let form = &mut self.subscribe;
                show_sheet(ctx, sheet, |ui| {
                    ui.label("Topic filter");
                    ui.text_edit_singleline(&mut form.topic);
                    qos_selector(ui, "subscribe_qos", &mut form.qos);
                    error_label(ui, form.error);
                    buttons(ui, "Subscribe", || form.submit())
                })
            }
            Sheet::Unsubscribe => {
                let form = &mut self.unsubscribe;
                show_sheet(ctx, sheet, |ui| {
                    ui.label("Topic filter");
                    ui.horizontal(|ui| {
                        ui.text_edit_singleline(&mut form.topic);
                        ComboBox::from_id_salt("unsubscribe_topics")
                            .selected_text("Subscribed")
                            .show_ui(ui, |ui| {
                                for topic in subscribed {
                                    ui.selectable_value(&mut form.topic, topic.clone(), topic);
                                }
                            });
                    });
                    error_label(ui, form.error);
                    buttons(ui, "Unsubscribe", || form.submit())
                })
            }
            Sheet::Publish => {
                let form = &mut self.publish;
                show_sheet(ctx, sheet, |ui| {
                    ui.label("Topic");
                    ui.text_edit_singleline(&mut form.topic);
                    ui.label("Payload");
                    ui.add(
                        TextEdit::multiline(&mut form.payload)
                            .desired_rows(6)
                            .hint_text("Enter message...")
                            .code_editor(),
                    );
                    ui.horizontal(|ui| {
                        qos_selector(ui, "publish_qos", &mut form.qos);
                        ui.checkbox(&mut form.retain, "Retain");
                    });
                    error_label(ui, form.error);
                    buttons(ui, "Publish", || form.submit())
                })
            }
        }
    }
}

fn show_sheet(ctx: &Context, sheet: Sheet, body: impl FnOnce(&mut Ui) -> SheetAction) -> SheetAction {
    let response = Modal::new(Id::new(("sheet", sheet))).show(ctx, |ui| {
        ui.set_width(320.0);
        ui.heading(sheet.to_string());
        ui.separator();
        body(ui)
    });

    // Escape or a click on the backdrop cancels
    if response.should_close() && response.inner == SheetAction::Keep {
        SheetAction::Cancel
    } else {
        response.inner
    }
}

fn qos_selector(ui: &mut Ui, id: &str, qos: &mut QoS) {
    ComboBox::from_id_salt(id)
        .selected_text(qos_label(*qos))
        .show_ui(ui, |ui| {
            for level in QOS_LEVELS {
                ui.selectable_value(qos, level, qos_label(level));
            }
        });
}

fn error_label(ui: &mut Ui, error: Option<&'static str>) {
    if let Some(error) = error {
        ui.colored_label(UiColors::ERROR_TEXT, error);
    }
}

fn buttons(ui: &mut Ui, submit_label: &str, submit: impl FnOnce() -> Option<MqttCommand>) -> SheetAction {
    ui.separator();
    let (submitted, cancelled) = egui::Sides::new().show(
        ui,
        |left| left.button(submit_label).clicked(),
        |right| right.button("Cancel").clicked(),
    );

    if cancelled {
        SheetAction::Cancel
    } else if submitted {
        submit().map_or(SheetAction::Keep, SheetAction::Submit)
    } else {
        SheetAction::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_topic_keeps_the_sheet_open() {
        let mut form = SubscribeForm {
            topic: "   ".into(),
            ..Default::default()
        };
        assert_eq!(form.submit(), None);
        assert_eq!(form.error, Some("Topic must not be empty"));
    }

    #[test]
    fn subscribe_accepts_filters_and_clears_the_topic() {
        let mut form = SubscribeForm {
            topic: " home/+/temp ".into(),
            qos: QoS::AtLeastOnce,
            error: Some("Topic must not be empty"),
        };

        assert_eq!(
            form.submit(),
            Some(MqttCommand::Subscribe {
                topic: "home/+/temp".into(),
                qos: QoS::AtLeastOnce,
            })
        );
        assert!(form.topic.is_empty());
        assert_eq!(form.error, None);
    }

    #[test]
    fn publish_rejects_wildcards_and_keeps_input() {
        let mut form = PublishForm {
            topic: "lights/#".into(),
            payload: "on".into(),
            ..Default::default()
        };
        assert_eq!(form.submit(), None);
        assert_eq!(form.error, Some("Topic must not contain wildcards"));

        form.topic = "lights/kitchen".into();
        form.retain = true;
        assert_eq!(
            form.submit(),
            Some(MqttCommand::Publish {
                topic: "lights/kitchen".into(),
                payload: b"on".to_vec(),
                qos: QoS::AtMostOnce,
                retain: true,
            })
        );
        assert_eq!(form.topic, "lights/kitchen");
        assert_eq!(form.payload, "on");
    }

    #[test]
    fn unsubscribe_builds_the_command() {
        let mut form = UnsubscribeForm {
            topic: "home/#".into(),
            ..Default::default()
        };
        assert_eq!(
            form.submit(),
            Some(MqttCommand::Unsubscribe {
                topic: "home/#".into()
            })
        );
    }
}
