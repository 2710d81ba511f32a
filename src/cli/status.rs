use crate::error::{DecodeError, ErrorSeverity, PlayerError};
use crate::logging::PlaybackEvent;
use crate::models::{
    display_name, track_stem, Channel, ChannelStatus, PlaybackState, PlayerSnapshot,
};

const PROGRESS_WIDTH: usize = 30;

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display both channels, book first
    pub fn display_full_status(snapshot: &PlayerSnapshot) {
        println!("┌─ Simulisten ────────────────────────────────────────────┐");
        for (index, channel) in Channel::ALL.iter().enumerate() {
            if index > 0 {
                println!("│");
            }
            for line in Self::channel_lines(*channel, snapshot.channel(*channel)) {
                println!("│ {}", line);
            }
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Lines describing one channel
    pub fn channel_lines(channel: Channel, status: &ChannelStatus) -> Vec<String> {
        let mut lines = Vec::with_capacity(4);
        match &status.track {
            Some(track) => lines.push(format!(
                "{}: {}",
                channel.label(),
                Self::truncate(&display_name(track), 40)
            )),
            None => lines.push(format!("{}: No track loaded", channel.label())),
        }
        lines.push(format!(
            "{}  {}",
            Self::format_playback_state(status.state),
            Self::format_time(status)
        ));
        lines.push(format!("[{}]", Self::create_progress_bar(status.progress(), PROGRESS_WIDTH)));
        lines.push(Self::format_volume(status.volume));
        lines
    }

    /// Current time over duration, one decimal each
    pub fn format_time(status: &ChannelStatus) -> String {
        format!("{:.1}s / {:.1}s", status.current_time, status.duration)
    }

    pub fn format_volume(volume: f32) -> String {
        format!("Volume: {:.2}", volume)
    }

    pub fn format_playback_state(state: Option<PlaybackState>) -> String {
        match state {
            Some(PlaybackState::Playing) => "▶ Playing".to_string(),
            Some(PlaybackState::Paused) => "⏸ Paused".to_string(),
            Some(PlaybackState::Stopped) => "⏹ Stopped".to_string(),
            None => "- Empty".to_string(),
        }
    }

    /// Display the selectable tracks of a channel
    pub fn display_catalog(channel: Channel, tracks: &[String], loaded: Option<&str>) {
        println!("{} tracks:", channel.label());
        for track in tracks {
            println!("{}", Self::format_catalog_entry(track, loaded));
        }
    }

    /// One catalog line; the loaded track is starred however it was named
    pub fn format_catalog_entry(track: &str, loaded: Option<&str>) -> String {
        let is_loaded = loaded.is_some_and(|loaded| track_stem(loaded) == track_stem(track));
        let marker = if is_loaded { "*" } else { " " };
        format!("  {} {:<12} ({})", marker, display_name(track), track)
    }

    /// Display recent playback events, oldest first
    pub fn display_events(events: &[PlaybackEvent]) {
        if events.is_empty() {
            println!("No playback events yet");
            return;
        }
        for event in events {
            println!("{}", Self::format_event(event));
        }
    }

    pub fn format_event(event: &PlaybackEvent) -> String {
        format!(
            "{} {:<18} {:<6} {}",
            event.timestamp.format("%H:%M:%S%.3f"),
            event.event_type.as_str(),
            event.channel.as_str(),
            event.details
        )
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!(
            "┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon,
            severity.as_str()
        );

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        if let Some(context) = Self::error_context(error) {
            eprintln!("│");
            eprintln!("│ {}", context);
        }

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Extra hint for specific error types
    fn error_context(error: &PlayerError) -> Option<&'static str> {
        match error {
            PlayerError::Resource(_) => Some("Use 'list' to see the bundled tracks"),
            PlayerError::Decode(DecodeError::UnsupportedFormat { .. }) => {
                Some("Supported: MP3, WAV, FLAC, OGG/Vorbis, AAC/ALAC")
            }
            PlayerError::Config(_) => Some("Configuration will use default values"),
            _ => None,
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }

        lines
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &PlayerError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());

        if let Some(suggestion) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    /// Create a progress bar string
    pub fn create_progress_bar(progress: f64, width: usize) -> String {
        let filled = ((progress.clamp(0.0, 1.0) * width as f64) as usize).min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResourceError;
    use crate::logging::PlaybackEventType;

    #[test]
    fn test_catalog_marks_loaded_track_by_stem() {
        let entry = StatusDisplay::format_catalog_entry("book3.mp3", Some("book3"));
        assert!(entry.starts_with("  * Book3"));
        assert!(entry.ends_with("(book3.mp3)"));

        assert!(StatusDisplay::format_catalog_entry("book3.mp3", Some("Learning/Audiobooks/book3.mp3"))
            .starts_with("  *"));
        assert!(StatusDisplay::format_catalog_entry("book13.mp3", Some("book3")).starts_with("    "));
        assert!(StatusDisplay::format_catalog_entry("book3.mp3", None).starts_with("    "));
    }

    fn loaded_status() -> ChannelStatus {
        ChannelStatus {
            current_time: 12.34,
            duration: 95.5,
            volume: 0.5,
            state: Some(PlaybackState::Playing),
            track: Some("book3.mp3".to_string()),
        }
    }

    #[test]
    fn test_format_time() {
        assert_eq!(StatusDisplay::format_time(&loaded_status()), "12.3s / 95.5s");
        assert_eq!(StatusDisplay::format_time(&ChannelStatus::empty(1.0)), "0.0s / 0.0s");
    }

    #[test]
    fn test_format_volume() {
        assert_eq!(StatusDisplay::format_volume(0.5), "Volume: 0.50");
        assert_eq!(StatusDisplay::format_volume(1.0), "Volume: 1.00");
    }

    #[test]
    fn test_channel_lines() {
        let lines = StatusDisplay::channel_lines(Channel::Book, &loaded_status());
        assert_eq!(lines[0], "Learning: Book3");
        assert!(lines[1].contains("Playing"));
        assert!(lines[1].ends_with("12.3s / 95.5s"));
        assert_eq!(lines[3], "Volume: 0.50");

        let lines = StatusDisplay::channel_lines(Channel::Music, &ChannelStatus::empty(0.8));
        assert_eq!(lines[0], "Music: No track loaded");
        assert!(lines[1].contains("Empty"));
    }

    #[test]
    fn test_format_playback_state() {
        assert_eq!(StatusDisplay::format_playback_state(Some(PlaybackState::Paused)), "⏸ Paused");
        assert_eq!(StatusDisplay::format_playback_state(None), "- Empty");
    }

    #[test]
    fn test_create_progress_bar() {
        assert_eq!(StatusDisplay::create_progress_bar(0.0, 4), "░░░░");
        assert_eq!(StatusDisplay::create_progress_bar(0.5, 4), "██░░");
        assert_eq!(StatusDisplay::create_progress_bar(1.7, 4), "████");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(StatusDisplay::truncate("Book1", 10), "Book1");
        assert_eq!(StatusDisplay::truncate("A very long track name", 10), "A very ...");
        assert_eq!(StatusDisplay::truncate("abcdef", 3), "abcdef");
    }

    #[test]
    fn test_wrap_text() {
        let lines = StatusDisplay::wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_format_event() {
        let event = PlaybackEvent {
            timestamp: chrono::Utc::now(),
            channel: Channel::Music,
            event_type: PlaybackEventType::VolumeChanged,
            details: "Volume set to 0.30".to_string(),
        };
        let line = StatusDisplay::format_event(&event);
        assert!(line.contains("VOLUME_CHANGED"));
        assert!(line.contains("music"));
        assert!(line.ends_with("Volume set to 0.30"));
    }

    #[test]
    fn test_display_functions_dont_panic() {
        let snapshot = PlayerSnapshot {
            book: loaded_status(),
            music: ChannelStatus::empty(1.0),
        };
        StatusDisplay::display_full_status(&snapshot);
        StatusDisplay::display_catalog(
            Channel::Book,
            &["book1.mp3".to_string(), "book17".to_string()],
            Some("book1.mp3"),
        );
        StatusDisplay::display_events(&[]);

        let error = PlayerError::from(ResourceError::NotFound {
            name: "nonexistent".to_string(),
        });
        StatusDisplay::display_error(&error);
        StatusDisplay::display_simple_error(&error);
    }
}
