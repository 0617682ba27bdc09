//! Integration tests for the logging system

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_url_credentials, strip_path, LogFormat,
    LoggingConfig,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> BridgeResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// The global subscriber can only be installed once per process, so every
// assertion that depends on it lives in this one test.
#[test]
fn test_init_logging_forwards_redacted_events_to_sink() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_filter("logging_integration=debug")
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).unwrap();

    tracing::debug!(
        url = "https://music.example.com/rest/download?id=42&u=bob&t=deadbeef&s=abc123",
        "Fetching track"
    );
    tracing::trace!("filtered out");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Fetching track");
        let url = &entries[0].fields["url"];
        assert!(url.contains("id=42"));
        assert!(!url.contains("deadbeef"));
        assert!(!url.contains("abc123"));
    }

    assert!(init_logging(config).is_err());
}

#[test]
fn test_pii_redaction_credentials() {
    assert_eq!(redact_if_sensitive("password", "my_password"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("token", "26719a11"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("track_id", "12345"), "12345");
    assert_eq!(redact_if_sensitive("title", "Song Name"), "Song Name");
}

#[test]
fn test_pii_redaction_emails() {
    let redacted = redact_if_sensitive("username", "user@example.com");

    assert!(redacted.starts_with('u'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_url_credentials_are_masked() {
    let stream = "https://h/rest/stream?id=1&u=a&p=plaintext&format=mp3";
    assert_eq!(
        redact_url_credentials(stream),
        "https://h/rest/stream?id=1&u=a&p=[REDACTED]&format=mp3"
    );
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/data/offline_tracks/tr-1.flac"), "tr-1.flac");
    assert_eq!(strip_path("D:\\data\\file.txt"), "file.txt");
    assert_eq!(strip_path("filename.txt"), "filename.txt");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
