use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};

use simulisten::audio::{CpalBackend, PlaybackCoordinator, ResourceLocator};
use simulisten::cli::{CliApp, Command, ParseError, StatusDisplay};
use simulisten::config::ConfigManager;
use simulisten::error::{ErrorSeverity, PlayerError};
use simulisten::logging::{AudioLogger, LOG_LEVEL_ENV};
use simulisten::models::{display_name, Channel, PlaybackState, PlayerSnapshot};

/// Number of events shown by the `events` command
const RECENT_EVENTS: usize = 20;

/// Main application controller that coordinates all components
pub struct AppController {
    coordinator: PlaybackCoordinator,
    config_manager: ConfigManager,
    logger: AudioLogger,
}

impl AppController {
    /// Create a new application controller. Opening the output device here
    /// is the one-time audio session activation.
    pub fn new(cli: &CliApp) -> Result<Self, PlayerError> {
        // Initialize logging first (default to 'warn' if unspecified)
        if let Some(level) = &cli.log_level {
            std::env::set_var(LOG_LEVEL_ENV, level);
        } else if std::env::var(LOG_LEVEL_ENV).is_err() {
            std::env::set_var(LOG_LEVEL_ENV, "warn");
        }
        if let Err(e) = AudioLogger::init() {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        let mut config_manager = ConfigManager::load_or_default(cli.config_path());
        if let Some(root) = cli.root_path() {
            // command line override, never written back
            config_manager.get_config_mut().resource_root = root;
        }

        let config = config_manager.get_config();
        let locator = ResourceLocator::new(config.resource_root.clone(), config.default_extension.clone());
        info!("Resource root: {}", locator.root().display());

        let backend = CpalBackend::new()?;
        info!("Output device: {}", backend.device_name());
        let logger = AudioLogger::new();
        let coordinator = PlaybackCoordinator::new(
            locator,
            Arc::new(backend),
            logger.clone(),
            config.volume(Channel::Book),
            config.volume(Channel::Music),
        );

        info!("Application controller initialized successfully");

        Ok(Self {
            coordinator,
            config_manager,
            logger,
        })
    }

    /// Start the poll task and load the configured startup tracks
    pub fn initialize(&mut self) -> Result<(), PlayerError> {
        let config = self.config_manager.get_config();
        self.coordinator.start_polling(config.poll_interval())?;

        for channel in Channel::ALL {
            if let Some(track) = config.startup_track(channel) {
                // a missing startup track leaves the channel empty
                if let Err(e) = self.coordinator.load_channel(channel, track) {
                    warn!("Startup track '{}' for {} not loaded: {}", track, channel, e);
                }
            }
        }

        Ok(())
    }

    /// Execute a single command
    pub fn execute_command(&mut self, command: Command) -> Result<(), PlayerError> {
        match command {
            Command::Load { channel, name } => {
                let duration = self.coordinator.load_channel(channel, &name)?;
                println!("{}: loaded {} ({:.1}s)", channel.label(), display_name(&name), duration);
            }
            Command::Play { channel } => {
                self.coordinator.play(channel);
                self.report(channel);
            }
            Command::Pause { channel } => {
                self.coordinator.pause(channel);
                self.report(channel);
            }
            Command::Stop { channel } => {
                self.coordinator.stop(channel);
                self.report(channel);
            }
            Command::Seek { channel, position } => {
                self.coordinator.seek(channel, position.as_secs_f64());
                self.report(channel);
            }
            Command::Volume { channel, level } => {
                self.coordinator.set_volume(channel, level);
                println!(
                    "{}: {}",
                    channel.label(),
                    StatusDisplay::format_volume(self.coordinator.volume(channel))
                );
            }
            Command::Status => {
                CliApp::display_status(&self.coordinator.snapshot());
            }
            Command::List { channel } => {
                let channels = match channel {
                    Some(channel) => vec![channel],
                    None => Channel::ALL.to_vec(),
                };
                let config = self.config_manager.get_config();
                for channel in channels {
                    let loaded = self.coordinator.status(channel).track;
                    StatusDisplay::display_catalog(channel, config.tracks(channel), loaded.as_deref());
                }
            }
            Command::Events => {
                StatusDisplay::display_events(&self.logger.get_recent_events(RECENT_EVENTS));
            }
            Command::Exit => {}
        }
        Ok(())
    }

    fn report(&self, channel: Channel) {
        let status = self.coordinator.status(channel);
        println!(
            "{}: {}  {}",
            channel.label(),
            StatusDisplay::format_playback_state(status.state),
            StatusDisplay::format_time(&status)
        );
    }

    /// Run the interactive prompt until `exit`, end of input or Ctrl-C
    pub async fn run_interactive_mode(&mut self) -> Result<(), PlayerError> {
        println!("Simulisten - type 'help' for commands");

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = Arc::clone(&shutdown_flag);
        if let Err(e) = ctrlc::set_handler(move || {
            println!("\nReceived interrupt signal. Shutting down gracefully...");
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        // Non-blocking input using a dedicated stdin thread
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(100));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut updates = self.coordinator.subscribe();
        let mut last_seen = updates.borrow_and_update().clone();
        let mut awaiting_input = false;

        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                line = rx.recv() => {
                    awaiting_input = false;
                    let Some(line) = line else {
                        // EOF
                        println!();
                        break;
                    };
                    if line.is_empty() {
                        continue;
                    }
                    match CliApp::parse_command(&line) {
                        Ok(Command::Exit) => {
                            println!("Goodbye!");
                            break;
                        }
                        Ok(command) => {
                            if let Err(e) = self.execute_command(command) {
                                self.handle_error(&e);
                            }
                        }
                        Err(ParseError::HelpRequested) => CliApp::display_help(),
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            println!("Type 'help' for available commands.");
                        }
                    }
                    // command results were printed already
                    last_seen = updates.borrow_and_update().clone();
                }

                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = updates.borrow_and_update().clone();
                    if announce_finished(&last_seen, &current) {
                        awaiting_input = false;
                    }
                    last_seen = current;
                }

                // keeps the shutdown flag checked while idle
                _ = interval.tick() => {}
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Stop polling and release both channels
    pub fn shutdown(&mut self) {
        println!("Shutting down...");
        self.coordinator.shutdown();
        for channel in Channel::ALL {
            self.coordinator.stop(channel);
        }
        println!("Shutdown complete.");
    }

    fn handle_error(&self, error: &PlayerError) {
        match error.severity() {
            ErrorSeverity::Info => info!("{}", error),
            ErrorSeverity::Warning => warn!("{}", error),
            ErrorSeverity::Error | ErrorSeverity::Critical => error!("{}", error),
        }
        StatusDisplay::display_error(error);
    }
}

/// Print a line for every channel that ran off the end of its track
fn announce_finished(previous: &PlayerSnapshot, current: &PlayerSnapshot) -> bool {
    let mut announced = false;
    for channel in Channel::ALL {
        let before = previous.channel(channel);
        let after = current.channel(channel);
        if before.state == Some(PlaybackState::Playing)
            && after.state == Some(PlaybackState::Stopped)
            && before.track == after.track
        {
            if let Some(track) = &after.track {
                println!("\n{}: finished {}", channel.label(), display_name(track));
                announced = true;
            }
        }
    }
    announced
}

#[tokio::main]
async fn main() -> Result<(), PlayerError> {
    let cli = CliApp::parse();

    let mut app = match AppController::new(&cli) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            StatusDisplay::display_simple_error(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.initialize() {
        error!("Failed to initialize application: {}", e);
        StatusDisplay::display_simple_error(&e);
        std::process::exit(1);
    }

    if let Err(e) = app.run_interactive_mode().await {
        app.handle_error(&e);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
    Ok(())
}
