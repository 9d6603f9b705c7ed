use rumqttc::MqttOptions;
use std::time::Duration;

/// Runtime broker settings handed to the transport task.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
    /// Only applies to the first connect; reconnects always resume the session.
    pub clean_session: bool,
    pub subscribe_on_connect: Vec<String>,
}

impl MqttConfig {
    pub fn broker_label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options
            .set_keep_alive(self.keep_alive)
            .set_clean_session(self.clean_session);
        if let Some((user, pw)) = &self.credentials {
            options.set_credentials(user.clone(), pw.clone());
        }
        options
    }
}
