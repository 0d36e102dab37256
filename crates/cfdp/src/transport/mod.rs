// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PDU transports.
//!
//! The engine itself only consumes the [`PduSender`](crate::PduSender)
//! capability and exposes `process_pdu` for inbound buffers; everything about
//! sockets, framing and peer addressing lives here:
//!
//! - [`udp`] - one PDU per datagram
//! - [`tcp`] - length-prefix framed stream, reassembled before delivery
//!
//! Both transports run a receive loop on a background thread that feeds the
//! entity and drives its timers between reads.

pub mod tcp;
pub mod udp;

pub use tcp::{FrameCodec, TcpTransport};
pub use udp::UdpTransport;

/// Largest PDU any transport must be able to carry: the maximal header plus
/// a full 16-bit data field.
pub const MAX_PDU_SIZE: usize = 4 + 2 * 8 + 8 + u16::MAX as usize;
