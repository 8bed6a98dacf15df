use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionConfig;
use crate::transcribe::ConnectOptions;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub transcription: TranscriptionConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub chunk_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionConfig {
    pub language: String,
    pub model: String,
    pub punctuate: bool,
    pub interim_results: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    pub timeout_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Per-session settings derived from the loaded file.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            chunk_interval: Duration::from_millis(self.audio.chunk_interval_ms),
            connect: ConnectOptions {
                language: self.transcription.language.clone(),
                model: self.transcription.model.clone(),
                punctuate: self.transcription.punctuate,
                interim_results: self.transcription.interim_results,
            },
            analysis_timeout: Duration::from_secs(self.analysis.timeout_secs),
            ..SessionConfig::default()
        }
    }
}
