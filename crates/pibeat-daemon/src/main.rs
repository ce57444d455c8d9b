use pibeat_core::config::Config;
use pibeat_core::event::ButtonEvent;
use pibeat_daemon::buttons::ButtonWatcher;
use pibeat_daemon::controller::Controller;
use pibeat_daemon::display::{Screen, SerialDisplay};
use pibeat_daemon::mpd::MpdClient;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// MPD often comes up after us when both start at boot.
const CONNECT_ATTEMPTS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,pibeat_daemon=debug")),
        )
        .init();

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let mut player = MpdClient::new(config.mpd.address(), config.mpd.command_timeout());
    player.connect_with_retry(CONNECT_ATTEMPTS).await?;

    let display = SerialDisplay::open(&config.display.device, config.display.baud_rate)?;
    let screen = Screen::new(display, config.display.hold());

    // Buttons and SIGINT both funnel into the controller through this channel
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<ButtonEvent>(16);

    let _buttons = ButtonWatcher::bind(event_tx.clone())?;

    // SIGINT takes the same clean shutdown path as the power button
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = event_tx.send(ButtonEvent::Power).await;
        }
    });

    let controller = Controller::new(player, screen).await?;
    controller.run(event_rx).await
}
