//! File-backed configuration tests.

use rendergraph_config::{ConfigError, EngineConfig};
use rendergraph_core::RenderContext;
use tempfile::TempDir;

#[test]
fn save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");

    let mut config = EngineConfig::default();
    config.context.channels = 1;
    config.render.quanta = 64;
    config.graph.voices = 3;
    config.save(&path).unwrap();

    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn save_creates_missing_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("engine.toml");

    EngineConfig::default().save(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn load_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = EngineConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn loaded_config_builds_a_context() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(
        &path,
        "[context]\nsample_rate = 22050.0\nchannels = 4\nmax_channels = 8\n",
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    let options = config.to_context_options().unwrap();
    let context = RenderContext::new(options).unwrap();
    assert_eq!(context.sample_rate(), 22050.0);
    assert_eq!(context.destination().channel_count(), 4);
}

#[test]
fn invalid_file_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "[context]\nmax_channels = 64\n").unwrap();

    let config = EngineConfig::load(&path).unwrap();
    let err = config.to_context_options().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue { ref field, .. } if field == "context.max_channels"
    ));
}
