//! Settings loaded from the environment.

use std::env;
use std::str::FromStr;

use crate::IndexerError;
use model_indexer_pipeline::{
    IndexerConfig, SignalProcessor, DEFAULT_BUFFER_SIZE, DEFAULT_TRACKED_FIELD,
};
use model_indexer_repository::config::DEFAULT_BACKEND_URL;
use model_indexer_repository::BackendConfig;

const DEFAULT_SIGNAL_PROCESSOR: &str = "base";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(IndexerError::config(format!("Unknown log format {}", other))),
        }
    }
}

/// Indexer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerSettings {
    pub opensearch_url: String,
    pub buffer_size: usize,
    pub signal_processor: SignalProcessor,
    pub refresh: bool,
    pub log_format: LogFormat,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            opensearch_url: DEFAULT_BACKEND_URL.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            signal_processor: SignalProcessor::Base,
            refresh: true,
            log_format: LogFormat::Text,
        }
    }
}

impl IndexerSettings {
    /// Load settings from the environment, reading `.env` first if present.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `MODEL_INDEXER_BUFFER_SIZE`: records buffered per record type (default: 100)
    /// - `MODEL_INDEXER_SIGNAL_PROCESSOR`: `base`, `has_changed` or `pre_saved` (default: base)
    /// - `MODEL_INDEXER_TRACKED_FIELD`: field watched by the change-detecting processors (default: name)
    /// - `MODEL_INDEXER_REFRESH`: refresh after hook-triggered writes (default: true)
    /// - `MODEL_INDEXER_LOG_FORMAT`: `text` or `json` (default: text)
    pub fn from_env() -> Result<Self, IndexerError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let opensearch_url =
            lookup("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let buffer_size = match lookup("MODEL_INDEXER_BUFFER_SIZE") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                IndexerError::config(format!("Invalid MODEL_INDEXER_BUFFER_SIZE {}: {}", raw, e))
            })?,
            None => DEFAULT_BUFFER_SIZE,
        };
        if buffer_size == 0 {
            return Err(IndexerError::config(
                "MODEL_INDEXER_BUFFER_SIZE must be at least 1",
            ));
        }

        let processor_name = lookup("MODEL_INDEXER_SIGNAL_PROCESSOR")
            .unwrap_or_else(|| DEFAULT_SIGNAL_PROCESSOR.to_string());
        let tracked_field = lookup("MODEL_INDEXER_TRACKED_FIELD")
            .unwrap_or_else(|| DEFAULT_TRACKED_FIELD.to_string());
        let signal_processor =
            SignalProcessor::from_name(processor_name.trim(), tracked_field.trim()).map_err(
                |_| {
                    IndexerError::config(format!(
                        "Invalid MODEL_INDEXER_SIGNAL_PROCESSOR {}",
                        processor_name
                    ))
                },
            )?;

        let refresh = match lookup("MODEL_INDEXER_REFRESH") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                IndexerError::config(format!("Invalid MODEL_INDEXER_REFRESH {}", raw))
            })?,
            None => true,
        };

        let log_format = match lookup("MODEL_INDEXER_LOG_FORMAT") {
            Some(raw) => raw.trim().parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            opensearch_url,
            buffer_size,
            signal_processor,
            refresh,
            log_format,
        })
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::with_url(self.opensearch_url.clone())
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            buffer_size: self.buffer_size,
            signal_processor: self.signal_processor.clone(),
            refresh: self.refresh,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
