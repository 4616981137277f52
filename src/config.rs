// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::bluetooth::{LinkSettings, ServiceRecord, DEFAULT_READ_BUFFER, SPP_UUID};

const APP_DIR: &str = "bt-terminal";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link settings.
    pub link: LinkConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Name the adapter is made visible under. Left untouched when unset.
    pub device_name: Option<String>,

    /// Service name of the listening socket.
    pub service_name: String,

    /// Service UUID, Serial Port Profile by default.
    pub service_uuid: Uuid,

    /// RFCOMM channel to listen on and dial.
    pub channel: u8,

    /// Bytes requested per session read.
    pub read_buffer_size: usize,

    /// Listen for inbound connections at startup.
    pub listen_on_start: bool,

    /// Power the adapter on at startup if it is off.
    pub enable_on_start: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            service_name: "BTTerminal".to_string(),
            service_uuid: SPP_UUID,
            channel: 1,
            read_buffer_size: DEFAULT_READ_BUFFER,
            listen_on_start: true,
            enable_on_start: true,
        }
    }
}

impl LinkConfig {
    /// Settings handed to the connection manager.
    pub fn settings(&self) -> LinkSettings {
        LinkSettings {
            service: ServiceRecord {
                name: self.service_name.clone(),
                uuid: self.service_uuid,
                channel: self.channel,
            },
            read_buffer_size: self.read_buffer_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default location or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing the defaults there if the file
    /// does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
