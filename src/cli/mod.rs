use crate::models::{Channel, PlayerSnapshot};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub mod status;
pub use status::StatusDisplay;

/// Dual-track audiobook and music player
#[derive(Debug, Parser)]
#[command(name = "simulisten")]
#[command(about = "Listen to an audiobook and background music at the same time")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// Directory holding the bundled audio files (overrides the config file)
    #[arg(long, value_name = "DIR")]
    pub root: Option<String>,

    /// Path of the configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

/// Commands accepted by the interactive prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Load a named track into a channel
    Load { channel: Channel, name: String },
    Play { channel: Channel },
    Pause { channel: Channel },
    /// Stop and rewind
    Stop { channel: Channel },
    Seek { channel: Channel, position: Duration },
    /// Volume as given; the coordinator clamps it
    Volume { channel: Channel, level: f32 },
    Status,
    /// Track catalog, for one channel or both
    List { channel: Option<Channel> },
    /// Recent playback events
    Events,
    Exit,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(rest)
            } else {
                PathBuf::from(path)
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    pub fn root_path(&self) -> Option<PathBuf> {
        self.root.as_deref().map(Self::expand_path)
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.as_deref().map(Self::expand_path)
    }

    /// Parse command from string (for interactive mode)
    pub fn parse_command(input: &str) -> Result<Command, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        match args[0] {
            "load" => {
                let channel = Self::channel_arg(&args, "load")?;
                if args.len() > 2 {
                    Ok(Command::Load {
                        channel,
                        name: args[2..].join(" "),
                    })
                } else {
                    Err(ParseError::MissingArgument {
                        command: "load".to_string(),
                        argument: "track name".to_string(),
                    })
                }
            }
            "play" => Ok(Command::Play {
                channel: Self::channel_arg(&args, "play")?,
            }),
            "pause" => Ok(Command::Pause {
                channel: Self::channel_arg(&args, "pause")?,
            }),
            "stop" => Ok(Command::Stop {
                channel: Self::channel_arg(&args, "stop")?,
            }),
            "seek" => {
                let channel = Self::channel_arg(&args, "seek")?;
                match args.get(2) {
                    Some(position) => Ok(Command::Seek {
                        channel,
                        position: Self::parse_time(position)?,
                    }),
                    None => Err(ParseError::MissingArgument {
                        command: "seek".to_string(),
                        argument: "position".to_string(),
                    }),
                }
            }
            "volume" | "vol" => {
                let channel = Self::channel_arg(&args, "volume")?;
                match args.get(2) {
                    Some(value) => match value.parse::<f32>() {
                        Ok(level) if level.is_finite() => Ok(Command::Volume { channel, level }),
                        _ => Err(ParseError::InvalidArgument {
                            argument: "volume level".to_string(),
                            value: value.to_string(),
                            expected: "number 0.0-1.0".to_string(),
                        }),
                    },
                    None => Err(ParseError::MissingArgument {
                        command: "volume".to_string(),
                        argument: "level".to_string(),
                    }),
                }
            }
            "status" => Ok(Command::Status),
            "list" | "ls" => {
                let channel = match args.get(1) {
                    Some(value) => Some(Self::parse_channel(value)?),
                    None => None,
                };
                Ok(Command::List { channel })
            }
            "events" => Ok(Command::Events),
            "exit" | "quit" => Ok(Command::Exit),
            "help" => Err(ParseError::HelpRequested),
            _ => Err(ParseError::UnknownCommand {
                command: args[0].to_string(),
            }),
        }
    }

    fn channel_arg(args: &[&str], command: &str) -> Result<Channel, ParseError> {
        match args.get(1) {
            Some(value) => Self::parse_channel(value),
            None => Err(ParseError::MissingArgument {
                command: command.to_string(),
                argument: "channel".to_string(),
            }),
        }
    }

    pub fn parse_channel(value: &str) -> Result<Channel, ParseError> {
        value.parse::<Channel>().map_err(|_| ParseError::InvalidArgument {
            argument: "channel".to_string(),
            value: value.to_string(),
            expected: "book or music".to_string(),
        })
    }

    /// Display the status of both channels
    pub fn display_status(snapshot: &PlayerSnapshot) {
        StatusDisplay::display_full_status(snapshot);
    }

    /// Display help information
    pub fn display_help() {
        println!("Simulisten - Available Commands:");
        println!();
        println!("Tracks:");
        println!("  load <channel> <name>     - Load a track (e.g. 'load book book3')");
        println!("  list [channel]            - List available tracks");
        println!();
        println!("Playback Control:");
        println!("  play <channel>            - Start or resume playback");
        println!("  pause <channel>           - Pause playback");
        println!("  stop <channel>            - Stop playback and rewind");
        println!("  seek <channel> <time>     - Seek to position (e.g. '1:30', '90s')");
        println!("  volume <channel> <0-1>    - Set volume level");
        println!();
        println!("Information:");
        println!("  status                    - Show both channels");
        println!("  events                    - Show recent playback events");
        println!();
        println!("Channels: book (or learning), music");
        println!();
        println!("General:");
        println!("  help                      - Show this help message");
        println!("  exit, quit                - Exit the player");
    }

    /// Parse time string to Duration
    pub fn parse_time(time_str: &str) -> Result<Duration, ParseError> {
        let trimmed = time_str.trim();
        let invalid = || ParseError::InvalidTimeFormat {
            input: time_str.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        // "1:30", "1:30.5", "90", "90s", "1.5"
        let total_seconds = if trimmed.contains(':') {
            let parts: Vec<&str> = trimmed.split(':').collect();
            if parts.len() != 2 {
                return Err(invalid());
            }

            let minutes: u64 = parts[0].parse().map_err(|_| invalid())?;
            let seconds: f64 = parts[1].parse().map_err(|_| invalid())?;
            if !(0.0..60.0).contains(&seconds) {
                return Err(invalid());
            }

            minutes as f64 * 60.0 + seconds
        } else {
            let seconds: f64 = trimmed
                .strip_suffix('s')
                .unwrap_or(trimmed)
                .parse()
                .map_err(|_| invalid())?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(invalid());
            }
            seconds
        };

        Duration::try_from_secs_f64(total_seconds).map_err(|_| invalid())
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Invalid time format: {input}")]
    InvalidTimeFormat { input: String },

    #[error("Help requested")]
    HelpRequested,
}
