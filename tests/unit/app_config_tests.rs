/*!
 * Tests for application configuration
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stringtable_translator::app_config::{Config, TranslationProvider};
use stringtable_translator::pipeline::SchedulerSettings;

#[test]
fn test_save_thenFromFile_shouldKeepSettings() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("conf.json");

    let mut config = Config::default();
    config.target_language = "de".to_string();
    config.translation.provider = TranslationProvider::Ollama;
    config.pipeline.batch_size = 7;
    config.pipeline.glossary_path = Some(PathBuf::from("terms.csv"));
    config.save(&path)?;

    let loaded = Config::from_file(&path)?;
    assert_eq!(loaded.target_language, "de");
    assert_eq!(loaded.translation.provider, TranslationProvider::Ollama);
    assert_eq!(loaded.pipeline.batch_size, 7);
    assert_eq!(loaded.pipeline.glossary_path, Some(PathBuf::from("terms.csv")));
    Ok(())
}

#[test]
fn test_from_file_withMalformedJson_shouldFail() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("conf.json");
    fs::write(&path, "{ not json")?;

    assert!(Config::from_file(&path).is_err());
    Ok(())
}

#[test]
fn test_scheduler_settings_fromConfig_shouldPlaceOutputUnderLanguageSlot() {
    let mut config = Config::default();
    config.pipeline.language_slot = Some("it".to_string());
    config.pipeline.batch_size = 4;

    let settings = SchedulerSettings::from_config(&config, Path::new("game/text"), Path::new("mod"));

    assert_eq!(settings.input_root, PathBuf::from("game/text"));
    assert_eq!(settings.output_root, PathBuf::from("mod/localized/it/text"));
    assert_eq!(settings.file_extension, "stringtable");
    assert_eq!(settings.batch_size, 4);
}

#[test]
fn test_validate_pipeline_withSameLanguages_shouldFail() {
    let mut config = Config::default();
    config.target_language = "en".to_string();
    assert!(config.validate_pipeline().is_err());
}

#[test]
fn test_from_file_withoutNewFields_shouldUseDefaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("conf.json");
    fs::write(&path, r#"{"target_language": "de", "pipeline": {"batch_size": 3}}"#)?;

    let config = Config::from_file(&path)?;
    assert_eq!(config.pipeline.max_input_bytes, 50 * 1024 * 1024);
    assert_eq!(config.translation.get_price_per_million_tokens(), None);
    Ok(())
}

#[test]
fn test_price_per_million_tokens_shouldFollowActiveProvider() {
    let mut config = Config::default();
    for provider in config.translation.available_providers.iter_mut() {
        provider.price_per_million_tokens = Some(2.5);
    }
    assert_eq!(config.translation.get_price_per_million_tokens(), Some(2.5));
    assert!(config.validate_pipeline().is_ok());

    for provider in config.translation.available_providers.iter_mut() {
        provider.price_per_million_tokens = Some(-1.0);
    }
    assert!(config.validate_pipeline().is_err());
}
