// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entity configuration (the CFDP Management Information Base).
//!
//! One [`EntityConfig`] per local entity, built through a validating fluent
//! builder and held by the entity behind an atomic swap so the MIB can be
//! replaced at runtime. Per-remote overrides ([`RemoteEntityConfig`]) live in
//! a concurrent map on the entity and win over the entity defaults when a
//! transaction is started toward that peer.

use std::path::PathBuf;
use std::time::Duration;

use crate::codec::fits_width;
use crate::pdu::{ChecksumType, EntityId, TransmissionMode};
use crate::{Error, Result};

/// Default octet width for entity ids on the wire.
pub const DEFAULT_ENTITY_ID_LENGTH: u8 = 2;

/// Default octet width for transaction sequence numbers on the wire.
pub const DEFAULT_SEQUENCE_NUMBER_LENGTH: u8 = 4;

/// Default upper bound on a FileData payload.
pub const DEFAULT_SEGMENT_LENGTH: usize = 1024;

/// Hard ceiling on a FileData payload: the 16-bit data field length minus the
/// largest possible offset field.
pub const MAX_SEGMENT_CEILING: usize = u16::MAX as usize - 8;

/// Per-entity configuration table.
#[derive(Debug, Clone)]
pub struct EntityConfig {
    /// This entity's id, used as the source of every outbound transaction.
    pub entity_id: EntityId,
    /// Octet width of entity id fields on the wire (1..=8).
    pub entity_id_length: u8,
    /// Octet width of sequence number fields on the wire (1..=8).
    pub sequence_number_length: u8,
    /// Upper bound on FileData payload size.
    pub max_file_segment_length: usize,
    /// Class used when neither the request nor a remote override chooses.
    pub default_transmission_mode: TransmissionMode,
    /// Checksum used when neither the request nor a remote override chooses.
    pub default_checksum_type: ChecksumType,
    /// No-traffic ceiling before a transaction faults.
    pub inactivity_timeout: Duration,
    /// EOF re-emission period while a Class 2 sender awaits Finished.
    pub ack_timeout: Duration,
    /// NAK re-emission period while a Class 2 receiver awaits repairs.
    pub nak_timeout: Duration,
    /// EOF re-emissions tolerated before `PositiveAckLimitReached`.
    pub max_ack_retries: u32,
    /// NAK emissions tolerated before `NakLimitReached`.
    pub max_nak_retries: u32,
    /// Root directory for all filestore operations.
    pub filestore_root: PathBuf,
    /// Sets the CRC-present header bit on outbound PDUs.
    pub use_crc: bool,
}

impl EntityConfig {
    /// Start building a configuration for the given local entity id.
    #[must_use]
    pub fn builder(entity_id: EntityId) -> EntityConfigBuilder {
        EntityConfigBuilder::new(entity_id)
    }
}

/// Per-peer overrides of the entity defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteEntityConfig {
    pub max_file_segment_length: Option<usize>,
    pub transmission_mode: Option<TransmissionMode>,
    pub checksum_type: Option<ChecksumType>,
}

/// Fluent builder for [`EntityConfig`].
///
/// # Example
///
/// ```
/// use cfdp::config::EntityConfig;
///
/// let config = EntityConfig::builder(1)
///     .filestore_root("/tmp/cfdp")
///     .max_file_segment_length(512)
///     .build()
///     .unwrap();
/// assert_eq!(config.entity_id, 1);
/// ```
#[derive(Debug, Clone)]
pub struct EntityConfigBuilder {
    config: EntityConfig,
}

impl EntityConfigBuilder {
    fn new(entity_id: EntityId) -> Self {
        Self {
            config: EntityConfig {
                entity_id,
                entity_id_length: DEFAULT_ENTITY_ID_LENGTH,
                sequence_number_length: DEFAULT_SEQUENCE_NUMBER_LENGTH,
                max_file_segment_length: DEFAULT_SEGMENT_LENGTH,
                default_transmission_mode: TransmissionMode::Acknowledged,
                default_checksum_type: ChecksumType::Modular,
                inactivity_timeout: Duration::from_secs(30),
                ack_timeout: Duration::from_secs(5),
                nak_timeout: Duration::from_secs(5),
                max_ack_retries: 4,
                max_nak_retries: 4,
                filestore_root: PathBuf::from("."),
                use_crc: false,
            },
        }
    }

    #[must_use]
    pub fn entity_id_length(mut self, octets: u8) -> Self {
        self.config.entity_id_length = octets;
        self
    }

    #[must_use]
    pub fn sequence_number_length(mut self, octets: u8) -> Self {
        self.config.sequence_number_length = octets;
        self
    }

    #[must_use]
    pub fn max_file_segment_length(mut self, octets: usize) -> Self {
        self.config.max_file_segment_length = octets;
        self
    }

    #[must_use]
    pub fn default_transmission_mode(mut self, mode: TransmissionMode) -> Self {
        self.config.default_transmission_mode = mode;
        self
    }

    #[must_use]
    pub fn default_checksum_type(mut self, kind: ChecksumType) -> Self {
        self.config.default_checksum_type = kind;
        self
    }

    #[must_use]
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.config.inactivity_timeout = timeout;
        self
    }

    #[must_use]
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    #[must_use]
    pub fn nak_timeout(mut self, timeout: Duration) -> Self {
        self.config.nak_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_ack_retries(mut self, retries: u32) -> Self {
        self.config.max_ack_retries = retries;
        self
    }

    #[must_use]
    pub fn max_nak_retries(mut self, retries: u32) -> Self {
        self.config.max_nak_retries = retries;
        self
    }

    #[must_use]
    pub fn filestore_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.filestore_root = root.into();
        self
    }

    #[must_use]
    pub fn use_crc(mut self, enabled: bool) -> Self {
        self.config.use_crc = enabled;
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<EntityConfig> {
        let config = self.config;

        if !(1..=8).contains(&config.entity_id_length) {
            return Err(Error::InvalidConfig(format!(
                "entity_id_length {} outside 1..=8",
                config.entity_id_length
            )));
        }
        if !(1..=8).contains(&config.sequence_number_length) {
            return Err(Error::InvalidConfig(format!(
                "sequence_number_length {} outside 1..=8",
                config.sequence_number_length
            )));
        }
        if !fits_width(config.entity_id, usize::from(config.entity_id_length)) {
            return Err(Error::InvalidConfig(format!(
                "entity id {} does not fit in {} octets",
                config.entity_id, config.entity_id_length
            )));
        }
        if config.max_file_segment_length == 0 || config.max_file_segment_length > MAX_SEGMENT_CEILING
        {
            return Err(Error::InvalidConfig(format!(
                "max_file_segment_length {} outside 1..={}",
                config.max_file_segment_length, MAX_SEGMENT_CEILING
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EntityConfig::builder(3).build().unwrap();

        assert_eq!(config.entity_id, 3);
        assert_eq!(config.entity_id_length, DEFAULT_ENTITY_ID_LENGTH);
        assert_eq!(config.max_file_segment_length, DEFAULT_SEGMENT_LENGTH);
        assert_eq!(
            config.default_transmission_mode,
            TransmissionMode::Acknowledged
        );
    }

    #[test]
    fn test_builder_rejects_bad_widths() {
        assert!(EntityConfig::builder(1).entity_id_length(0).build().is_err());
        assert!(EntityConfig::builder(1).entity_id_length(9).build().is_err());
        assert!(EntityConfig::builder(1)
            .sequence_number_length(0)
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_rejects_oversized_entity_id() {
        assert!(EntityConfig::builder(0x1_00)
            .entity_id_length(1)
            .build()
            .is_err());
        assert!(EntityConfig::builder(0xFF)
            .entity_id_length(1)
            .build()
            .is_ok());
    }

    #[test]
    fn test_builder_rejects_bad_segment_length() {
        assert!(EntityConfig::builder(1)
            .max_file_segment_length(0)
            .build()
            .is_err());
        assert!(EntityConfig::builder(1)
            .max_file_segment_length(MAX_SEGMENT_CEILING + 1)
            .build()
            .is_err());
    }
}
