use rumqttc::{Publish, QoS};
use std::fmt;

/// Longest payload excerpt, in characters, that ends up in a staged line.
pub const MAX_PAYLOAD_LENGTH: usize = 256;

/// A message as delivered by the broker, before formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInboundRecord {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl RawInboundRecord {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Formats the record as `"topic:\npayload"` with the payload cut to
    /// [`MAX_PAYLOAD_LENGTH`] characters and `...` appended when cut.
    pub fn into_staged_line(self) -> String {
        format_staged_line(&self.topic, &self.payload)
    }
}

impl From<&Publish> for RawInboundRecord {
    fn from(publish: &Publish) -> Self {
        Self::new(publish.topic.clone(), publish.payload.to_vec())
    }
}

pub fn format_staged_line(topic: &str, payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    match text.char_indices().nth(MAX_PAYLOAD_LENGTH) {
        Some((cut, _)) => format!("{}:\n{}...", topic, &text[..cut]),
        None => format!("{}:\n{}", topic, text),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Connect,
    Subscribe,
    Unsubscribe,
    Publish,
}

impl OperationKind {
    fn failure_phrase(&self) -> &'static str {
        match self {
            OperationKind::Connect => "connect to",
            OperationKind::Subscribe => "subscribe to",
            OperationKind::Unsubscribe => "unsubscribe from",
            OperationKind::Publish => "publish to",
        }
    }
}

/// Operational notices shown in the message log next to real messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusNotice {
    ConnectionSuccessful,
    ConnectionClosed,
    Reconnecting,
    OperationSucceeded {
        kind: OperationKind,
        target: String,
    },
    OperationFailed {
        kind: OperationKind,
        target: String,
        error: String,
    },
}

impl fmt::Display for StatusNotice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StatusNotice::ConnectionSuccessful => write!(f, "Connection successful"),
            StatusNotice::ConnectionClosed => write!(f, "Connection closed"),
            StatusNotice::Reconnecting => write!(f, "Reconnecting..."),
            StatusNotice::OperationSucceeded { kind, target } => match kind {
                OperationKind::Connect => write!(f, "Connection successful"),
                OperationKind::Subscribe => write!(f, "Subscribed to {}", target),
                OperationKind::Unsubscribe => write!(f, "Unsubscribed from {}", target),
                OperationKind::Publish => write!(f, "Published to {}", target),
            },
            StatusNotice::OperationFailed {
                kind,
                target,
                error,
            } => write!(
                f,
                "Failed to {} {}\nError: {}",
                kind.failure_phrase(),
                target,
                error
            ),
        }
    }
}

/// Requests from the UI to the transport task.
#[derive(Debug, Clone, PartialEq)]
pub enum MqttCommand {
    Subscribe {
        topic: String,
        qos: QoS,
    },
    Unsubscribe {
        topic: String,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    },
}

impl MqttCommand {
    pub fn kind(&self) -> OperationKind {
        match self {
            MqttCommand::Subscribe { .. } => OperationKind::Subscribe,
            MqttCommand::Unsubscribe { .. } => OperationKind::Unsubscribe,
            MqttCommand::Publish { .. } => OperationKind::Publish,
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            MqttCommand::Subscribe { topic, .. }
            | MqttCommand::Unsubscribe { topic }
            | MqttCommand::Publish { topic, .. } => topic,
        }
    }
}

pub const QOS_LEVELS: [QoS; 3] = [QoS::AtMostOnce, QoS::AtLeastOnce, QoS::ExactlyOnce];

pub fn qos_label(qos: QoS) -> &'static str {
    match qos {
        QoS::AtMostOnce => "QoS 0",
        QoS::AtLeastOnce => "QoS 1",
        QoS::ExactlyOnce => "QoS 2",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_payload_is_cut_with_ellipsis() {
        let line = RawInboundRecord::new("t", "x".repeat(300)).into_staged_line();
        assert_eq!(line, format!("t:\n{}...", "x".repeat(256)));
    }

    #[test]
    fn payload_at_the_limit_is_kept_whole() {
        let line = format_staged_line("t", "y".repeat(256).as_bytes());
        assert_eq!(line, format!("t:\n{}", "y".repeat(256)));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let payload = "ä".repeat(257);
        let line = format_staged_line("umlaut", payload.as_bytes());
        let excerpt = line
            .strip_prefix("umlaut:\n")
            .and_then(|rest| rest.strip_suffix("..."))
            .unwrap();
        assert_eq!(excerpt.chars().count(), 256);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let line = format_staged_line("bin", &[0x66, 0xff, 0x6f]);
        assert_eq!(line, "bin:\nf\u{fffd}o");
    }

    #[test]
    fn status_lines_read_naturally() {
        let failed = StatusNotice::OperationFailed {
            kind: OperationKind::Subscribe,
            target: "sensors/#".into(),
            error: "request queue full".into(),
        };
        assert_eq!(
            failed.to_string(),
            "Failed to subscribe to sensors/#\nError: request queue full"
        );
        assert_eq!(StatusNotice::Reconnecting.to_string(), "Reconnecting...");
        assert_eq!(
            StatusNotice::OperationSucceeded {
                kind: OperationKind::Unsubscribe,
                target: "a/b".into(),
            }
            .to_string(),
            "Unsubscribed from a/b"
        );
    }
}
