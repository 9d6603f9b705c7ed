pub mod config;
pub mod feed;
pub mod mqtt;
pub mod ui;

use crate::config::AppConfig;
use crate::feed::poller::FeedPollerHandle;
use crate::feed::IngestBuffer;
use crate::mqtt::mqtt_handler::MQTTHandle;
use crate::ui::{MqttScreen, ScreenChannels};
use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = AppConfig::config_path();
    AppConfig::ensure_default_config(&config_path).await?;
    let app_config = AppConfig::load(&config_path).await?;
    let mqtt_config = app_config.mqtt_config()?;
    let broker_label = mqtt_config.broker_label();
    let initial_topics = mqtt_config.subscribe_on_connect.clone();

    // Shared by the transport task, the poller and the screen
    let ingest = IngestBuffer::new();
    let cancel = CancellationToken::new();

    let mqtt_handle = MQTTHandle::spawn(mqtt_config, ingest.clone(), cancel.clone());

    let (sheet_tx, sheet_rx) = watch::channel(None);
    let (poller_handle, window_rx) =
        FeedPollerHandle::spawn(ingest.clone(), sheet_rx, cancel.clone());

    let channels = ScreenChannels {
        window_rx,
        status_rx: mqtt_handle.status.clone(),
        command_tx: mqtt_handle.commands.clone(),
        sheet_tx,
        ingest: ingest.clone(),
        cancel: cancel.clone(),
    };

    info!("Starting UI for broker {}", broker_label);
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("mqttview")
            .with_inner_size([900.0, 640.0]),
        ..Default::default()
    };

    let dark_theme = app_config.ui.dark_theme;
    eframe::run_native(
        "mqttview",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(MqttScreen::new(
                cc,
                broker_label,
                dark_theme,
                initial_topics,
                channels,
            )))
        }),
    )
    .map_err(|e| eyre!("UI terminated with error: {}", e))?;

    // on_exit already did this unless the event loop ended some other way
    ingest.close();
    cancel.cancel();
    mqtt_handle.join().await;
    poller_handle.join().await;
    info!("Shutdown complete");

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
