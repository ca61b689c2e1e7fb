//! Module: keyer-settings
//!
//! Purpose: Example device crate built on confgen-generated settings.
//!
//! Architecture:
//! - schema/*.cfg: single source of truth for every settings version
//! - build.rs: runs the confgen backends into `OUT_DIR`
//! - [`settings`]: current version, full accessor layer
//! - [`v1`]: version 1 record only, read through [`conversions`]
//! - [`Device`]: runtime root owning the one shared settings cell

use confgen::codec::CodecError;
use confgen::frame::{self, DeserializeError};
use confgen::runtime::{ConfigCell, UpdateError};
use std::sync::Arc;

/// Current settings (schema `keyer_settings` version 2).
pub mod settings {
    include!(concat!(env!("OUT_DIR"), "/settings.rs"));
}

/// Settings version 1, record and wire format only.
pub mod v1 {
    include!(concat!(env!("OUT_DIR"), "/settings_v1.rs"));
}

/// `up`: version 1 to current; `down`: current to version 1.
pub mod conversions {
    include!(concat!(env!("OUT_DIR"), "/conversions.rs"));
}

/// Two-leaf schema used to check the wire format byte for byte.
pub mod minimal {
    include!(concat!(env!("OUT_DIR"), "/minimal.rs"));
}

/// Integer-only schema: no strings, so `Update` carries no lifetime.
pub mod counters {
    include!(concat!(env!("OUT_DIR"), "/counters.rs"));
}

/// Enum labels with line breaks, tabs, quotes and `*/`.
pub mod labels {
    include!(concat!(env!("OUT_DIR"), "/labels.rs"));
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("malformed update message: {0}")]
    Decode(#[from] CodecError),
    #[error("update rejected: {0}")]
    Rejected(#[from] UpdateError),
}

/// Decode a blob of any known version into current settings.
///
/// A version 1 blob is converted with [`conversions::up`].
pub fn decode_any(bytes: &[u8]) -> Result<settings::RawConfig, DeserializeError> {
    match frame::split_version(bytes)? {
        (v1::VERSION, _) => {
            let old = v1::RawConfig::deserialize(bytes)?;
            log::info!("upgrading settings from version {}", v1::VERSION);
            Ok(conversions::up(&old))
        }
        _ => settings::RawConfig::deserialize(bytes),
    }
}

/// Decode a stored blob of any known version, falling back to defaults when it
/// is missing or unreadable.
pub fn load_settings(stored: Option<&[u8]>) -> settings::RawConfig {
    let Some(bytes) = stored else {
        log::debug!("no stored settings; using defaults");
        return settings::RawConfig::default();
    };
    decode_any(bytes).unwrap_or_else(|e| {
        log::warn!("stored settings unreadable ({}); using defaults", e);
        settings::RawConfig::default()
    })
}

/// Version 1 blob to current blob.
pub fn upgrade(bytes: &[u8]) -> Result<Vec<u8>, DeserializeError> {
    let old = v1::RawConfig::deserialize(bytes)?;
    Ok(conversions::up(&old).serialize())
}

/// Current blob to version 1 blob.
pub fn downgrade(bytes: &[u8]) -> Result<Vec<u8>, DeserializeError> {
    let new = settings::RawConfig::deserialize(bytes)?;
    Ok(conversions::down(&new).serialize())
}

/// Owns the settings cell. Tasks get accessors from it or clone the shared handle.
pub struct Device {
    cell: Arc<ConfigCell<settings::RawConfig>>,
}

impl Device {
    pub fn boot(stored: Option<&[u8]>) -> Self {
        Device {
            cell: ConfigCell::shared(load_settings(stored)),
        }
    }

    pub fn settings(&self) -> settings::Accessor<'_, settings::keys::Root> {
        settings::root(&self.cell)
    }

    pub fn shared(&self) -> Arc<ConfigCell<settings::RawConfig>> {
        Arc::clone(&self.cell)
    }

    /// Decode and apply one update message from the client. Returns the leaf index.
    pub fn handle_update(&self, message: &[u8]) -> Result<usize, DeviceError> {
        let update = settings::Update::decode(message)?;
        let index = settings::apply_update(&self.cell, update).map_err(|e| {
            log::warn!("update of {} rejected: {}", settings::KEY_PATHS[update.index()], e);
            e
        })?;
        Ok(index)
    }

    /// Replace every setting from a backup blob of any known version. Every
    /// subscriber is notified. On error the current settings are kept.
    pub fn restore(&self, backup: &[u8]) -> Result<(), DeserializeError> {
        let restored = decode_any(backup)?;
        self.cell.replace(restored);
        Ok(())
    }

    /// Back to schema defaults; returns the settings that were replaced.
    pub fn factory_reset(&self) -> settings::RawConfig {
        self.cell.replace(settings::RawConfig::default())
    }

    /// Current settings as a blob for persistent storage.
    pub fn persist(&self) -> Vec<u8> {
        self.cell.with(|raw| raw.serialize())
    }
}
