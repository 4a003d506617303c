pub mod desktop;
pub mod display;
pub mod effects;
pub mod hotkey;
pub mod ipc;
pub mod overlay;
pub mod rate_limiter;
pub mod recorder;
pub mod settings;
pub mod state_machine;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use desktop::{Desktop, X11Desktop};
use effects::{DesktopEffectRunner, EffectRunner};
use hotkey::{manager::failed_status, EvdevBinding, HotkeyBackend, HotkeyManager};
use ipc::UiMessage;
use settings::{JsonSettingsStore, MemorySettingsStore, SettingsStore};
use state_machine::{Controller, Event};

/// Capacity of the state loop's event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Startup options, usually from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Settings file; the XDG config location when `None`
    pub settings_path: Option<PathBuf>,
    /// Keep settings in memory only
    pub ephemeral: bool,
}

/// Run the main state loop
///
/// Owns the controller until `Event::Shutdown` arrives (or every sender is
/// gone), then hands it back so callers can inspect the final state.
pub async fn run_state_loop<S, B>(
    mut controller: Controller<S, B>,
    desktop: Arc<dyn Desktop>,
    mut rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    effect_runner: Arc<dyn EffectRunner>,
) -> Controller<S, B>
where
    S: SettingsStore,
    B: HotkeyBackend,
{
    for eff in controller.startup() {
        effect_runner.spawn(eff, tx.clone());
    }
    log::info!("State loop started");

    while let Some(event) = rx.recv().await {
        log::debug!("Received event: {:?}", event);

        // Geometry is sampled at the edge so the controller stays pure
        let event = match event {
            Event::HotkeyPressed => match sample_trigger(desktop.as_ref()) {
                Ok(trigger) => trigger,
                Err(e) => {
                    log::warn!("Ignoring hotkey, could not read pointer/monitors: {}", e);
                    continue;
                }
            },
            other => other,
        };

        let shutting_down = matches!(event, Event::Shutdown);
        let now = tokio::time::Instant::now().into_std();

        for eff in controller.handle(event, now) {
            effect_runner.spawn(eff, tx.clone());
        }

        // Handle Shutdown at the edge, after its sweep has been executed
        if shutting_down {
            log::info!("Shutdown requested, stopping state loop");
            break;
        }
    }

    log::info!("State loop ended");
    controller
}

fn sample_trigger(desktop: &dyn Desktop) -> Result<Event, String> {
    Ok(Event::Trigger {
        cursor: desktop.cursor_position()?,
        monitors: desktop.monitors()?,
    })
}

/// Build the runtime and run until interrupted
pub fn run(options: RunOptions) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to build tokio runtime: {}", e))?;

    runtime.block_on(async move {
        if options.ephemeral {
            log::info!("Settings are kept in memory only");
            serve(MemorySettingsStore::default()).await
        } else {
            let path = match options.settings_path {
                Some(path) => path,
                None => settings::default_settings_path()?,
            };
            log::info!("Settings file: {:?}", path);
            serve(JsonSettingsStore::open(path)).await
        }
    })
}

async fn serve<S: SettingsStore>(store: S) -> Result<(), String> {
    let desktop: Arc<dyn Desktop> = Arc::new(X11Desktop::connect()?);

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAPACITY);
    let capture = Arc::new(AtomicBool::new(false));

    // Start hotkey manager (evdev-based for Wayland/X11 compatibility)
    let (hotkey_manager, binding) = match HotkeyManager::start(tx.clone(), capture.clone()) {
        Ok((manager, binding)) => {
            let status = manager.status();
            log::info!(
                "Hotkey manager started (active: {}, {} device(s))",
                status.active,
                status.device_count
            );
            (Some(manager), binding)
        }
        Err(e) => {
            let status = failed_status(e);
            log::error!(
                "Failed to start hotkey manager: {}",
                status.error.as_deref().unwrap_or("unknown error")
            );
            log::error!("Pings can still be requested, but no shortcut will trigger them");
            (None, EvdevBinding::detached())
        }
    };

    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiMessage>();
    tokio::spawn(write_ui_messages(ui_rx));
    tokio::spawn(read_commands(tx.clone()));

    let tx_for_signal = tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Interrupt received");
                let _ = tx_for_signal.send(Event::Shutdown).await;
            }
            Err(e) => log::error!("Failed to listen for ctrl-c: {}", e),
        }
    });

    let runner = Arc::new(DesktopEffectRunner::new(desktop.clone(), capture, ui_tx));
    let controller = Controller::new(store, binding);

    run_state_loop(controller, desktop, rx, tx, runner.clone()).await;

    runner.shutdown();
    if let Some(manager) = hotkey_manager {
        manager.stop();
    }
    Ok(())
}

/// Forward JSON-lines commands from stdin to the state loop
async fn read_commands(tx: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match ipc::parse_command(&line) {
                Ok(Some(command)) => {
                    if tx.send(Event::Command(command)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("{}", e),
            },
            Ok(None) => {
                log::info!("stdin closed, no further commands");
                break;
            }
            Err(e) => {
                log::warn!("Failed to read command: {}", e);
                break;
            }
        }
    }
}

/// Write UI messages to stdout as JSON lines
async fn write_ui_messages(mut rx: mpsc::UnboundedReceiver<UiMessage>) {
    let mut stdout = tokio::io::stdout();
    while let Some(message) = rx.recv().await {
        let line = match ipc::encode_message(&message) {
            Ok(line) => line,
            Err(e) => {
                log::error!("{}", e);
                continue;
            }
        };
        let written = async {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await
        };
        if let Err(e) = written.await {
            log::warn!("Failed to write UI message: {}", e);
            break;
        }
    }
}
