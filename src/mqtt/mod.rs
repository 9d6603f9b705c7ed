//! # MQTT Integration Module
//!
//! Connects the screen to a single MQTT broker through `rumqttc`. The
//! protocol, its transport and the reconnect machinery all live in the client
//! library; this module only adapts it to the rest of the application.
//!
//! ```text
//! mqtt/
//! ├── config.rs        - Runtime broker settings and `MqttOptions` construction
//! ├── message.rs       - Inbound records, staged line formatting, status notices, UI commands
//! └── mqtt_handler.rs  - Transport task: command execution and event translation
//! ```
//!
//! ## Data Flow
//!
//! The UI sends [`MqttCommand`](message::MqttCommand)s over an mpsc channel.
//! The handler answers indirectly: every received message and every operation
//! result is appended as a text line to the shared
//! [`IngestBuffer`](crate::feed::IngestBuffer), from where the feed poller
//! moves it into the message log. Failures are reported, never propagated.
//! Connection state and counters go to the status bar over a watch channel.

pub mod config;
pub mod message;
pub mod mqtt_handler;
