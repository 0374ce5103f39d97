// Integration tests for layered configuration loading

use anyhow::Result;
use shoplist_voice::Config;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_load_partial_file_keeps_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("voice.toml");
    fs::write(
        &path,
        r#"
[voice]
backend_url = "https://voice.example.com"
user_id = "user-42"
max_reconnect_attempts = 3
heartbeat_interval_ms = 20000

[capture]
chunk_interval_ms = 100

[http]
port = 9000
"#,
    )?;

    let cfg = Config::load(path.to_str())?;

    assert_eq!(cfg.voice.user_id, "user-42");
    assert_eq!(cfg.voice.reconnect_delay_ms, 2000, "unset fields keep defaults");
    assert_eq!(cfg.capture.chunk_interval_ms, 100);
    assert_eq!(cfg.capture.sample_rate, 16000);
    assert_eq!(cfg.http.port, 9000);
    assert_eq!(cfg.http.bind, "127.0.0.1");

    let session = cfg.session_config();
    assert_eq!(session.max_reconnect_attempts, 3);
    assert_eq!(session.heartbeat_interval, Some(Duration::from_secs(20)));
    assert_eq!(session.endpoint()?, "wss://voice.example.com/ws/user-42");

    Ok(())
}

#[test]
fn test_empty_file_is_valid() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("empty.toml");
    fs::write(&path, "")?;

    let cfg = Config::load(path.to_str())?;

    assert_eq!(cfg.voice.backend_url, "http://localhost:8000");
    assert!(cfg.voice.user_id.starts_with("user-"));
    assert!(!cfg.voice.debug);
    assert_eq!(cfg.log_level(), "info");

    Ok(())
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let result = Config::load(Some("/nonexistent/shoplist-voice.toml"));
    assert!(result.is_err());
}

#[test]
fn test_invalid_values_are_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[voice]\nmax_reconnect_attempts = \"lots\"\n")?;

    assert!(Config::load(path.to_str()).is_err());

    Ok(())
}
