//! MQTT Handler - transport adapter around `rumqttc`
//!
//! Runs in its own tokio task and is the only place that talks to the broker.
//! It executes [`MqttCommand`]s coming from the UI, polls the `rumqttc` event
//! loop and turns everything it sees into lines for the [`IngestBuffer`]:
//! received messages become staged lines, connection changes and operation
//! results become [`StatusNotice`]s. Nothing the broker does is fatal here.
//!
//! On connection loss the handler reports it, switches the session to
//! `clean_session = false`, waits the configured delay and polls again, which
//! makes `rumqttc` reconnect.

use chrono::{DateTime, Local};
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, Outgoing, Packet, SubscribeReasonCode,
};
use std::collections::{HashMap, VecDeque};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use super::message::{MqttCommand, OperationKind, RawInboundRecord, StatusNotice};
use crate::feed::IngestBuffer;

/// Capacity of the `rumqttc` request channel.
const REQUEST_CAPACITY: usize = 100;

/// Capacity of the UI command channel.
const COMMAND_CAPACITY: usize = 100;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Snapshot published to the status bar.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub last_activity: Option<DateTime<Local>>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("{0}")]
    Connection(#[from] ConnectionError),

    #[error("Subscription rejected by broker")]
    SubscriptionRejected,
}

pub struct MqttHandler {
    config: MqttConfig,
    client: AsyncClient,
    event_loop: EventLoop,
    ingest: IngestBuffer,
    commands: mpsc::Receiver<MqttCommand>,
    status: ConnectionStatus,
    status_tx: watch::Sender<ConnectionStatus>,
    // Topics whose SUBSCRIBE has been queued but not yet sent
    queued_subscriptions: VecDeque<String>,
    // Sent SUBSCRIBE packets waiting for their SUBACK, by packet id
    awaiting_suback: HashMap<u16, String>,
}

impl MqttHandler {
    pub fn new(
        config: MqttConfig,
        ingest: IngestBuffer,
        commands: mpsc::Receiver<MqttCommand>,
    ) -> (Self, watch::Receiver<ConnectionStatus>) {
        let (client, event_loop) = AsyncClient::new(config.mqtt_options(), REQUEST_CAPACITY);
        let status = ConnectionStatus::default();
        let (status_tx, status_rx) = watch::channel(status.clone());

        let handler = Self {
            config,
            client,
            event_loop,
            ingest,
            commands,
            status,
            status_tx,
            queued_subscriptions: VecDeque::new(),
            awaiting_suback: HashMap::new(),
        };
        (handler, status_rx)
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Connecting to MQTT broker {}", self.config.broker_label());
        self.set_state(ConnectionState::Connecting);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("MQTT handler cancelled");
                    break;
                }

                Some(command) = self.commands.recv() => {
                    self.execute(command);
                }

                event = self.event_loop.poll() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(e) => {
                        self.handle_connection_error(e);
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("MQTT handler cancelled while waiting to reconnect");
                                break;
                            }
                            _ = tokio::time::sleep(self.config.reconnect_delay) => {
                                debug!("Reconnecting to {}", self.config.broker_label());
                            }
                        }
                    }
                },
            }
        }

        if let Err(e) = self.client.try_disconnect() {
            debug!("Disconnect request not delivered: {}", e);
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Queues a UI command on the client and reports the outcome.
    ///
    /// Uses the non-blocking `try_*` requests: this task is also the one
    /// polling the event loop, so awaiting a full request channel here would
    /// never complete.
    pub fn execute(&mut self, command: MqttCommand) {
        debug!("Executing {:?}", command);
        let kind = command.kind();
        let topic = command.topic().to_string();

        let result = match command {
            MqttCommand::Subscribe { topic, qos } => self.client.try_subscribe(topic, qos),
            MqttCommand::Unsubscribe { topic } => self.client.try_unsubscribe(topic),
            MqttCommand::Publish {
                topic,
                payload,
                qos,
                retain,
            } => self.client.try_publish(topic, qos, retain, payload),
        };

        match result {
            // Subscriptions are reported once the broker acknowledges them.
            Ok(()) if kind == OperationKind::Subscribe => {
                self.queued_subscriptions.push_back(topic);
            }
            Ok(()) => {
                if kind == OperationKind::Publish {
                    self.status.messages_sent += 1;
                    self.touch();
                }
                self.report(StatusNotice::OperationSucceeded {
                    kind,
                    target: topic,
                });
            }
            Err(e) => {
                warn!("{:?} request for {} failed: {}", kind, topic, e);
                self.report_failure(kind, topic, TransportError::from(e));
            }
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            // Refused connects surface as `ConnectionError::ConnectionRefused`
            // from `poll`, so every ConnAck seen here is a success.
            Event::Incoming(Packet::ConnAck(connack)) => {
                info!(
                    "Connected to {} (session present: {})",
                    self.config.broker_label(),
                    connack.session_present
                );
                self.set_state(ConnectionState::Connected);
                self.report(StatusNotice::ConnectionSuccessful);
                self.subscribe_configured_topics();
            }
            Event::Incoming(Packet::Publish(publish)) => {
                debug!("Received message on {}", publish.topic);
                self.status.messages_received += 1;
                self.touch();
                self.ingest
                    .append(RawInboundRecord::from(&publish).into_staged_line());
            }
            Event::Incoming(Packet::SubAck(suback)) => {
                let Some(topic) = self.awaiting_suback.remove(&suback.pkid) else {
                    debug!("SUBACK for unknown packet id {}", suback.pkid);
                    return;
                };
                let rejected = suback
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));
                if rejected {
                    self.report_failure(
                        OperationKind::Subscribe,
                        topic,
                        TransportError::SubscriptionRejected,
                    );
                } else {
                    info!("Subscribed to {}", topic);
                    self.report(StatusNotice::OperationSucceeded {
                        kind: OperationKind::Subscribe,
                        target: topic,
                    });
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                info!("Broker sent DISCONNECT");
            }
            Event::Outgoing(Outgoing::Subscribe(pkid)) => {
                if let Some(topic) = self.queued_subscriptions.pop_front() {
                    self.awaiting_suback.insert(pkid, topic);
                }
            }
            other => {
                debug!("MQTT event: {:?}", other);
            }
        }
    }

    pub fn handle_connection_error(&mut self, error: ConnectionError) {
        let reason = error.to_string();
        match self.status.state {
            ConnectionState::Connected => {
                warn!("Connection to {} lost: {}", self.config.broker_label(), error);
                self.report(StatusNotice::ConnectionClosed);
            }
            _ => {
                warn!("Connecting to {} failed: {}", self.config.broker_label(), error);
                self.report_failure(
                    OperationKind::Connect,
                    self.config.broker_label(),
                    TransportError::from(error),
                );
            }
        }

        // Sent SUBSCRIBEs are not retransmitted after a reconnect, so their
        // SUBACK will never arrive.
        let mut unacknowledged: Vec<_> = self.awaiting_suback.drain().collect();
        unacknowledged.sort_unstable_by_key(|(pkid, _)| *pkid);
        for (pkid, topic) in unacknowledged {
            debug!("Dropping pending SUBACK {} for {}", pkid, topic);
            self.report(StatusNotice::OperationFailed {
                kind: OperationKind::Subscribe,
                target: topic,
                error: reason.clone(),
            });
        }

        self.report(StatusNotice::Reconnecting);
        self.set_state(ConnectionState::Reconnecting);
        self.event_loop.mqtt_options.set_clean_session(false);
    }

    fn subscribe_configured_topics(&mut self) {
        let topics = self.config.subscribe_on_connect.clone();
        for topic in topics {
            self.execute(MqttCommand::Subscribe {
                topic,
                qos: rumqttc::QoS::AtMostOnce,
            });
        }
    }

    fn report(&self, notice: StatusNotice) {
        self.ingest.append(notice.to_string());
    }

    fn report_failure(&self, kind: OperationKind, target: String, error: TransportError) {
        self.report(StatusNotice::OperationFailed {
            kind,
            target,
            error: error.to_string(),
        });
    }

    fn touch(&mut self) {
        self.status.last_activity = Some(Local::now());
        self.publish_status();
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.status.state = state;
        self.publish_status();
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status.clone());
    }
}

/// Handle to the spawned transport task.
#[derive(Debug)]
pub struct MQTTHandle {
    pub commands: mpsc::Sender<MqttCommand>,
    pub status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl MQTTHandle {
    pub fn spawn(config: MqttConfig, ingest: IngestBuffer, cancel: CancellationToken) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (handler, status) = MqttHandler::new(config, ingest, command_rx);

        info!("Spawning MQTT handler task");
        let task = tokio::spawn(handler.run(cancel));

        Self {
            commands: command_tx,
            status,
            task,
        }
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("MQTT handler task panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish, QoS, SubAck};
    use std::time::Duration;

    fn config() -> MqttConfig {
        MqttConfig {
            host: "localhost".into(),
            port: 1883,
            client_id: "mqttview-test".into(),
            credentials: None,
            keep_alive: Duration::from_secs(5),
            reconnect_delay: Duration::from_millis(100),
            clean_session: true,
            subscribe_on_connect: vec!["home/+/temp".into()],
        }
    }

    fn handler() -> (MqttHandler, IngestBuffer, watch::Receiver<ConnectionStatus>) {
        let ingest = IngestBuffer::new();
        let (_tx, rx) = mpsc::channel(1);
        let (handler, status) = MqttHandler::new(config(), ingest.clone(), rx);
        (handler, ingest, status)
    }

    fn connack() -> Event {
        Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        }))
    }

    #[tokio::test]
    async fn connack_reports_success_and_subscribes_configured_topics() {
        let (mut handler, ingest, status) = handler();

        handler.handle_event(connack());

        assert_eq!(ingest.drain_all(), vec!["Connection successful"]);
        assert_eq!(status.borrow().state, ConnectionState::Connected);
        assert_eq!(handler.queued_subscriptions, vec!["home/+/temp".to_string()]);
    }

    #[tokio::test]
    async fn suback_reports_the_subscribed_topic() {
        let (mut handler, ingest, _status) = handler();
        handler.execute(MqttCommand::Subscribe {
            topic: "a/b".into(),
            qos: QoS::AtLeastOnce,
        });
        handler.execute(MqttCommand::Subscribe {
            topic: "c/d".into(),
            qos: QoS::AtMostOnce,
        });
        assert!(ingest.is_empty());

        handler.handle_event(Event::Outgoing(Outgoing::Subscribe(1)));
        handler.handle_event(Event::Outgoing(Outgoing::Subscribe(2)));
        handler.handle_event(Event::Incoming(Packet::SubAck(SubAck::new(
            2,
            vec![SubscribeReasonCode::Failure],
        ))));
        handler.handle_event(Event::Incoming(Packet::SubAck(SubAck::new(
            1,
            vec![SubscribeReasonCode::Success(QoS::AtLeastOnce)],
        ))));

        assert_eq!(
            ingest.drain_all(),
            vec![
                "Failed to subscribe to c/d\nError: Subscription rejected by broker".to_string(),
                "Subscribed to a/b".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn publish_and_unsubscribe_are_reported_when_queued() {
        let (mut handler, ingest, status) = handler();

        handler.execute(MqttCommand::Publish {
            topic: "lights/kitchen".into(),
            payload: b"on".to_vec(),
            qos: QoS::AtMostOnce,
            retain: true,
        });
        handler.execute(MqttCommand::Unsubscribe {
            topic: "lights/#".into(),
        });

        assert_eq!(
            ingest.drain_all(),
            vec!["Published to lights/kitchen", "Unsubscribed from lights/#"]
        );
        assert_eq!(status.borrow().messages_sent, 1);
        assert!(status.borrow().last_activity.is_some());
    }

    #[tokio::test]
    async fn incoming_publish_is_staged() {
        let (mut handler, ingest, status) = handler();
        let publish = Publish::new("sensors/door", QoS::AtMostOnce, b"open".to_vec());

        handler.handle_event(Event::Incoming(Packet::Publish(publish)));

        assert_eq!(ingest.drain_all(), vec!["sensors/door:\nopen"]);
        assert_eq!(status.borrow().messages_received, 1);
    }

    #[tokio::test]
    async fn lost_connection_reports_and_resumes_session() {
        let (mut handler, ingest, status) = handler();
        handler.handle_event(connack());
        ingest.drain_all();

        handler.handle_connection_error(ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        )));

        assert_eq!(
            ingest.drain_all(),
            vec!["Connection closed", "Reconnecting..."]
        );
        assert_eq!(status.borrow().state, ConnectionState::Reconnecting);
        assert!(!handler.event_loop.mqtt_options.clean_session());

        // Traffic resumes on the same buffer after reconnecting.
        handler.handle_event(connack());
        handler.handle_event(Event::Incoming(Packet::Publish(Publish::new(
            "t",
            QoS::AtMostOnce,
            b"back".to_vec(),
        ))));
        assert_eq!(
            ingest.drain_all(),
            vec!["Connection successful", "t:\nback"]
        );
    }

    #[tokio::test]
    async fn subscribe_in_flight_when_connection_drops_is_reported_failed() {
        let (mut handler, ingest, _status) = handler();
        handler.handle_event(connack());
        handler.handle_event(Event::Outgoing(Outgoing::Subscribe(1)));
        handler.execute(MqttCommand::Subscribe {
            topic: "a".into(),
            qos: QoS::AtMostOnce,
        });
        handler.handle_event(Event::Outgoing(Outgoing::Subscribe(2)));
        ingest.drain_all();

        let reset = || {
            ConnectionError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            ))
        };
        let reason = reset().to_string();
        handler.handle_connection_error(reset());

        assert_eq!(
            ingest.drain_all(),
            vec![
                "Connection closed".to_string(),
                format!("Failed to subscribe to home/+/temp\nError: {reason}"),
                format!("Failed to subscribe to a\nError: {reason}"),
                "Reconnecting...".to_string(),
            ]
        );
        assert!(handler.awaiting_suback.is_empty());

        // A later subscribe on the new connection is still reported.
        handler.handle_event(connack());
        handler.execute(MqttCommand::Subscribe {
            topic: "b".into(),
            qos: QoS::AtMostOnce,
        });
        handler.handle_event(Event::Outgoing(Outgoing::Subscribe(3)));
        handler.handle_event(Event::Outgoing(Outgoing::Subscribe(4)));
        handler.handle_event(Event::Incoming(Packet::SubAck(SubAck::new(
            4,
            vec![SubscribeReasonCode::Success(QoS::AtMostOnce)],
        ))));
        assert_eq!(
            ingest.drain_all(),
            vec!["Connection successful", "Subscribed to b"]
        );
    }

    #[tokio::test]
    async fn failed_first_connect_names_the_broker() {
        let (mut handler, ingest, _status) = handler();

        handler.handle_connection_error(ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )));

        let lines = ingest.drain_all();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Failed to connect to localhost:1883\nError: "));
        assert_eq!(lines[1], "Reconnecting...");
    }

    #[tokio::test]
    async fn events_after_teardown_are_ignored() {
        let (mut handler, ingest, _status) = handler();
        ingest.close();

        handler.handle_event(connack());
        handler.handle_event(Event::Incoming(Packet::Publish(Publish::new(
            "late",
            QoS::AtMostOnce,
            b"x".to_vec(),
        ))));

        assert!(ingest.drain_all().is_empty());
    }
}
