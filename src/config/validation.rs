use super::defaults::{MAX_LABEL_BYTES, MAX_PRE_BUFFER_MS, MAX_RELEASE_BUFFER_MS, MAX_SOUND_TYPES};
use super::{AppConfig, EngineConfig};
use crate::audio::{MAX_DB, MIN_DB};
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Fold in the profile file, check every value, and normalize the label
    /// lists.
    pub fn validate(&mut self) -> Result<()> {
        if let Some(path) = self.profile.clone() {
            let profile = Profile::load(&path)?;
            profile.apply(self);
        }

        if !(MIN_DB..=MAX_DB).contains(&self.threshold_db) {
            bail!(
                "--threshold-db must be between {MIN_DB} and {MAX_DB} dBFS, got {}",
                self.threshold_db
            );
        }
        if !(100..=MAX_RELEASE_BUFFER_MS).contains(&self.release_buffer_ms) {
            bail!(
                "--release-buffer-ms must be between 100 and {MAX_RELEASE_BUFFER_MS} ms, got {}",
                self.release_buffer_ms
            );
        }
        if self.pre_buffer_ms > MAX_PRE_BUFFER_MS {
            bail!(
                "--pre-buffer-ms must be at most {MAX_PRE_BUFFER_MS} ms, got {}",
                self.pre_buffer_ms
            );
        }
        if !(20..=1_000).contains(&self.chunk_interval_ms) {
            bail!(
                "--chunk-interval-ms must be between 20 and 1000 ms, got {}",
                self.chunk_interval_ms
            );
        }
        if !(5..=120).contains(&self.frame_ms) {
            bail!(
                "--frame-ms must be between 5 and 120 ms, got {}",
                self.frame_ms
            );
        }
        if self.min_episode_ms > 10_000 {
            bail!(
                "--min-episode-ms must be at most 10000 ms, got {}",
                self.min_episode_ms
            );
        }
        if !(0.0..=1.0).contains(&self.classification_min_score) {
            bail!(
                "--classification-min-score must be between 0.0 and 1.0, got {}",
                self.classification_min_score
            );
        }
        if !(50..=10_000).contains(&self.classify_timeout_ms) {
            bail!(
                "--classify-timeout-ms must be between 50 and 10000 ms, got {}",
                self.classify_timeout_ms
            );
        }
        if !(200..=10_000).contains(&self.classify_window_ms) {
            bail!(
                "--classify-window-ms must be between 200 and 10000 ms, got {}",
                self.classify_window_ms
            );
        }
        if !(8..=1024).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between 8 and 1024, got {}",
                self.channel_capacity
            );
        }

        normalize_labels(&mut self.sound_types, "--sound-type")?;
        normalize_labels(&mut self.notification_sounds, "--notify-sound")?;

        if self.recordings_dir.as_os_str().is_empty() {
            bail!("--recordings-dir must not be empty");
        }

        if let Some(device) = &mut self.input_device {
            let trimmed = device.trim();
            if trimmed.is_empty() {
                bail!("--input-device must not be empty");
            }
            if trimmed.len() > 256 {
                bail!("--input-device must be at most 256 characters");
            }
            *device = trimmed.to_string();
        }

        Ok(())
    }

    /// Snapshot the CLI-controlled engine settings for the monitor session.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            threshold_db: self.threshold_db,
            release_buffer_ms: self.release_buffer_ms,
            pre_buffer_ms: self.pre_buffer_ms,
            chunk_interval_ms: self.chunk_interval_ms,
            frame_ms: self.frame_ms,
            min_episode_ms: self.min_episode_ms,
            sound_type_filter: self.sound_types.clone(),
            classification_min_score: self.classification_min_score,
            notification_sound_types: self.notification_sounds.clone(),
            notifications_enabled: self.notifications_enabled,
            classify_timeout_ms: self.classify_timeout_ms,
            classify_window_ms: self.classify_window_ms,
            channel_capacity: self.channel_capacity,
            input_device: self.input_device.clone(),
        }
    }
}

/// Subset of the configuration that can live in a YAML file.
///
/// Profile values override the corresponding flags: the file is the durable
/// source of truth, flags are for one-off runs. While the monitor runs the
/// CLI re-reads the file so edits take effect live.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub threshold_db: Option<f32>,
    pub release_buffer_ms: Option<u64>,
    pub pre_buffer_ms: Option<u64>,
    pub min_episode_ms: Option<u64>,
    pub sound_types: Option<Vec<String>>,
    pub classification_min_score: Option<f32>,
    pub notification_sounds: Option<Vec<String>>,
    pub notifications_enabled: Option<bool>,
    pub input_device: Option<String>,
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read profile '{}'", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse profile '{}'", path.display()))
    }

    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(value) = self.threshold_db {
            config.threshold_db = value;
        }
        if let Some(value) = self.release_buffer_ms {
            config.release_buffer_ms = value;
        }
        if let Some(value) = self.pre_buffer_ms {
            config.pre_buffer_ms = value;
        }
        if let Some(value) = self.min_episode_ms {
            config.min_episode_ms = value;
        }
        if let Some(value) = &self.sound_types {
            config.sound_types = value.clone();
        }
        if let Some(value) = self.classification_min_score {
            config.classification_min_score = value;
        }
        if let Some(value) = &self.notification_sounds {
            config.notification_sounds = value.clone();
        }
        if let Some(value) = self.notifications_enabled {
            config.notifications_enabled = value;
        }
        if let Some(value) = &self.input_device {
            config.input_device = Some(value.clone());
        }
    }
}

/// Trim, reject empties, and dedupe while preserving first-seen order so the
/// classifier-order tie-break stays meaningful.
fn normalize_labels(values: &mut Vec<String>, flag: &str) -> Result<()> {
    if values.len() > MAX_SOUND_TYPES {
        bail!(
            "{flag} repeated too many times (max {MAX_SOUND_TYPES}, got {})",
            values.len()
        );
    }
    let mut normalized: Vec<String> = Vec::with_capacity(values.len());
    for raw in values.iter() {
        let label = raw.trim();
        if label.is_empty() {
            bail!("{flag} labels must not be empty");
        }
        if label.len() > MAX_LABEL_BYTES {
            bail!("{flag} label exceeds {MAX_LABEL_BYTES} bytes: '{label}'");
        }
        if !normalized.iter().any(|seen| seen == label) {
            normalized.push(label.to_string());
        }
    }
    *values = normalized;
    Ok(())
}
