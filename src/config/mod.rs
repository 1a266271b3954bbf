use std::collections::HashMap;
use std::fs;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

fn default_true() -> bool {
    true
}

/// Root of the logical configuration tree. Deserialized straight from TOML,
/// the way the teacher codebase loads its own root `Config`.
#[derive(Debug, Clone, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub target_rate: Option<u32>,
    #[serde(default = "default_true")]
    pub unused_options_warning: bool,
    #[serde(default)]
    pub processing: Vec<ProcessingGroupConfig>,
    /// Named `bands` descriptors a `BandResampler` handler can refer to
    /// through its `freqList` option instead of inlining `bands` directly
    /// (the logical `FreqList-<N>` construct).
    #[serde(default)]
    pub freq_lists: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingGroupConfig {
    pub name: String,
    pub channels: String,
    #[serde(default)]
    pub target_rate: Option<u32>,
    #[serde(default)]
    pub granularity: Option<f32>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

/// One handler entry: its user-chosen name, its type, an optional source
/// handler name, and a free-form options table whose shape depends on
/// `kind`. Kept as a raw `toml::Value` table rather than a fixed struct
/// because the handler set is closed but each member's option schema
/// differs (mirrors the teacher's `HashMap<String, serde_json::Value>`
/// catch-all fields for producer/processor configs).
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(flatten)]
    pub options: toml::value::Table,
}

impl HandlerConfig {
    /// The raw description used for handler-cache comparison: two configs
    /// with textually identical `(kind, source, options)` are treated as
    /// unchanged across a reload.
    pub fn raw_description(&self) -> String {
        format!("{}|{:?}|{:?}", self.kind, self.source, self.options)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.options
            .get(key)
            .and_then(|v| v.as_float().map(|f| f as f32).or_else(|| v.as_integer().map(|i| i as f32)))
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.options.get(key).and_then(|v| v.as_integer()).and_then(|i| u32::try_from(i).ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(|v| v.as_bool())
    }
}

pub fn load(path: &str) -> ConfigResult<RootConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| ConfigError::with_context(format!("reading config file '{path}'"), e))?;
    parse(&text)
}

pub fn parse(text: &str) -> ConfigResult<RootConfig> {
    toml::from_str(text).map_err(|e| ConfigError::with_context("parsing configuration", e))
}
