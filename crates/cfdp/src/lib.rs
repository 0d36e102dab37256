// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # CFDP - CCSDS File Delivery Protocol engine
//!
//! A pure Rust implementation of the CFDP core: bit-exact PDU codec, per-file
//! transaction state machines for both transfer classes, and a per-entity
//! engine that routes inbound PDUs and drives outbound emission through a
//! pluggable send callback.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cfdp::{Entity, EntityConfig, PutRequest, Result};
//! use cfdp::transport::udp::UdpTransport;
//!
//! fn main() -> Result<()> {
//!     let config = EntityConfig::builder(1)
//!         .filestore_root("/var/spool/cfdp")
//!         .build()?;
//!
//!     let transport = Arc::new(UdpTransport::bind("0.0.0.0:5111".parse().unwrap())?);
//!     transport.add_peer(2, "10.0.0.2:5111".parse().unwrap());
//!
//!     let entity = Arc::new(Entity::new(config, transport.clone()));
//!     transport.spawn_receiver(entity.clone());
//!
//!     let id = entity.put(PutRequest::new(2, "telemetry.bin", "downlink/telemetry.bin"))?;
//!     println!("transaction {} started", id);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Application Layer                           |
//! |        put / cancel / suspend / resume / status / events           |
//! +--------------------------------------------------------------------+
//! |                         Entity Engine                              |
//! |   Registry | Sequence numbers | Routing | Timers | Metrics         |
//! +--------------------------------------------------------------------+
//! |                     Transaction State Machines                     |
//! |   Send (Class 1/2, NAK service) | Receive (reassembly, commit)     |
//! +--------------------------------------------------------------------+
//! |                 PDU Codec | Checksums | Segment Map                |
//! +--------------------------------------------------------------------+
//! |                      Transport | Filestore                         |
//! |        UDP datagram / TCP length-prefix | OS filesystem            |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Entity`] | A CFDP endpoint: registry, routing, user operations |
//! | [`EntityConfig`] | The per-entity MIB, built with a validating builder |
//! | [`PutRequest`] | One outbound file transfer request |
//! | [`Pdu`] | Decoded wire unit, one variant per PDU format |
//! | [`PduSender`] | Send capability a transport implements |
//!
//! ## Modules Overview
//!
//! - [`entity`] - Entity engine (start here)
//! - [`pdu`] - Wire codec for the common header and every PDU variant
//! - [`transaction`] - Send/receive state machines
//! - [`transport`] - UDP and TCP transports
//! - [`filestore`] - Byte-granularity storage contract and OS implementation
//! - [`checksum`] / [`segment`] - Integrity and reassembly building blocks

pub mod checksum;
pub mod codec;
pub mod config;
pub mod entity;
pub mod events;
pub mod filestore;
pub mod metrics;
pub mod pdu;
pub mod segment;
pub mod transaction;
pub mod transport;

pub use config::{EntityConfig, EntityConfigBuilder, RemoteEntityConfig};
pub use entity::{Entity, EntityListener};
pub use metrics::{EntityMetrics, MetricsSnapshot};
pub use pdu::{
    ChecksumType, ConditionCode, EntityId, FileStatus, Pdu, PduError, PduHeader,
    TransactionStatus, TransmissionMode,
};
pub use transaction::{
    PduSender, PutRequest, TransactionId, TransactionResult, TransactionState,
};

use crate::filestore::FilestoreError;

/// Errors surfaced by the engine's public API.
///
/// Per-transaction faults never appear here: they travel through the
/// completion notification as a [`TransactionResult`]. This enum covers codec
/// rejections, configuration mistakes and transport-level I/O.
#[derive(Debug)]
pub enum Error {
    /// Inbound buffer did not decode as a PDU.
    Pdu(PduError),
    /// Filestore operation rejected.
    Filestore(FilestoreError),
    /// Configuration failed validation.
    InvalidConfig(String),
    /// Underlying socket failure.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Pdu(err) => write!(f, "PDU codec: {}", err),
            Error::Filestore(err) => write!(f, "filestore: {}", err),
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Error::Io(err) => write!(f, "i/o: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Pdu(err) => Some(err),
            Error::Filestore(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::InvalidConfig(_) => None,
        }
    }
}

impl From<PduError> for Error {
    fn from(err: PduError) -> Self {
        Error::Pdu(err)
    }
}

impl From<FilestoreError> for Error {
    fn from(err: FilestoreError) -> Self {
        Error::Filestore(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Convenient alias for API results using the public [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
