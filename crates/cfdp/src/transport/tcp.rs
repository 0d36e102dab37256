// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP transport with length-prefix framing.
//!
//! TCP is a stream protocol without message boundaries; the [`FrameCodec`]
//! delimits PDUs with a 4-octet big-endian length prefix:
//!
//! ```text
//! +----------------+------------------+
//! | length (4B BE) | PDU bytes        |
//! +----------------+------------------+
//! ```
//!
//! Peers are learned lazily: the first PDU decoded on an accepted connection
//! binds that connection to the header's source entity id, so a listener
//! needs no out-of-band handshake. Outbound PDUs reuse the bound connection.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::entity::Entity;
use crate::pdu::{EntityId, PduHeader};
use crate::transaction::PduSender;

use super::MAX_PDU_SIZE;

/// Frame header size (4 octets of length).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Read poll period; also the timer tick cadence.
const POLL_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Framing
// ============================================================================

/// Length-prefix codec for PDUs over a byte stream.
pub struct FrameCodec;

impl FrameCodec {
    /// Frame a PDU: `[length: u32 BE][payload]`.
    #[must_use]
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    /// Read one frame from a blocking stream.
    ///
    /// Returns `Ok(None)` on clean end-of-stream at a frame boundary, an
    /// `UnexpectedEof` error when the stream dies mid-frame, and
    /// `InvalidData` when the length prefix exceeds `max_size`.
    ///
    /// Read timeouts surface only at a frame boundary (so a poll-driven
    /// caller can tick timers); once the first header octet has arrived the
    /// peer has committed to a frame and timeouts are retried internally.
    pub fn read_frame(stream: &mut impl Read, max_size: usize) -> io::Result<Option<Vec<u8>>> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        let mut have = 0usize;
        while have < FRAME_HEADER_SIZE {
            match stream.read(&mut header[have..]) {
                Ok(0) => {
                    if have == 0 {
                        return Ok(None);
                    }
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream closed inside frame header",
                    ));
                }
                Ok(n) => have += n,
                Err(err) if have > 0 && retryable(&err) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} octets exceeds limit {}", len, max_size),
            ));
        }

        let mut payload = vec![0u8; len];
        let mut have = 0usize;
        while have < len {
            match stream.read(&mut payload[have..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream closed inside frame body",
                    ));
                }
                Ok(n) => have += n,
                Err(err) if retryable(&err) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(Some(payload))
    }
}

/// Errors worth retrying mid-frame.
fn retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

// ============================================================================
// Transport
// ============================================================================

/// TCP transport with a connection table keyed by entity id.
pub struct TcpTransport {
    peers: Arc<DashMap<EntityId, Arc<Mutex<TcpStream>>>>,
    max_frame: usize,
    running: Arc<AtomicBool>,
}

impl TcpTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            peers: Arc::new(DashMap::new()),
            max_frame: MAX_PDU_SIZE,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Connect to a known peer and start reading PDUs from it.
    pub fn connect(
        &self,
        entity_id: EntityId,
        addr: SocketAddr,
        entity: Arc<Entity>,
    ) -> io::Result<JoinHandle<()>> {
        let stream = TcpStream::connect(addr)?;
        log::debug!("[tcp] connected to entity {} at {}", entity_id, addr);
        self.peers
            .insert(entity_id, Arc::new(Mutex::new(stream.try_clone()?)));
        self.spawn_reader(stream, entity)
    }

    /// Accept inbound connections on `addr` and read PDUs from each.
    ///
    /// Accepted connections are bound to a peer entity once their first PDU
    /// header is decoded; reverse traffic then flows over the same stream.
    pub fn listen(&self, addr: SocketAddr, entity: Arc<Entity>) -> io::Result<JoinHandle<()>> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        log::debug!("[tcp] listening on {}", listener.local_addr()?);

        let peers = self.peers.clone();
        let max_frame = self.max_frame;
        let running = self.running.clone();

        Ok(std::thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, from)) => {
                        log::debug!("[tcp] accepted connection from {}", from);
                        if let Err(err) = spawn_reader_thread(
                            stream,
                            entity.clone(),
                            peers.clone(),
                            max_frame,
                            running.clone(),
                        ) {
                            log::warn!("[tcp] failed to start reader for {}: {}", from, err);
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                        std::thread::sleep(POLL_PERIOD);
                        entity.check_timers();
                    }
                    Err(err) => {
                        log::warn!("[tcp] accept failed: {}", err);
                        std::thread::sleep(POLL_PERIOD);
                    }
                }
            }
            log::debug!("[tcp] accept loop stopped");
        }))
    }

    /// Stop the accept and reader loops at their next poll.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn spawn_reader(&self, stream: TcpStream, entity: Arc<Entity>) -> io::Result<JoinHandle<()>> {
        spawn_reader_thread(
            stream,
            entity,
            self.peers.clone(),
            self.max_frame,
            self.running.clone(),
        )
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PduSender for TcpTransport {
    fn send_pdu(&self, pdu: &[u8], destination: EntityId) {
        let Some(stream) = self.peers.get(&destination).map(|entry| entry.value().clone()) else {
            log::warn!("[tcp] no connection for entity {}, PDU dropped", destination);
            return;
        };
        let frame = FrameCodec::encode(pdu);
        let result = stream.lock().write_all(&frame);
        if let Err(err) = result {
            log::warn!("[tcp] send to entity {} failed: {}", destination, err);
        }
    }
}

/// Read frames until end-of-stream, feeding the entity and upserting the
/// peer table from each PDU's source entity id.
fn spawn_reader_thread(
    mut stream: TcpStream,
    entity: Arc<Entity>,
    peers: Arc<DashMap<EntityId, Arc<Mutex<TcpStream>>>>,
    max_frame: usize,
    running: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    stream.set_read_timeout(Some(POLL_PERIOD))?;
    let writer = Arc::new(Mutex::new(stream.try_clone()?));

    Ok(std::thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            match FrameCodec::read_frame(&mut stream, max_frame) {
                Ok(Some(pdu)) => {
                    if let Ok(header) = PduHeader::decode(&pdu) {
                        peers
                            .entry(header.source_entity_id)
                            .or_insert_with(|| writer.clone());
                    }
                    let _ = entity.process_pdu(&pdu);
                }
                Ok(None) => {
                    log::debug!("[tcp] peer closed the stream");
                    break;
                }
                Err(err)
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::TimedOut =>
                {
                    entity.check_timers();
                }
                Err(err) => {
                    log::warn!("[tcp] read failed: {}", err);
                    break;
                }
            }
        }
        log::debug!("[tcp] reader stopped");
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let payload = vec![0x20, 0x00, 0x03, 0x00, 1, 2, 3];
        let frame = FrameCodec::encode(&payload);
        assert_eq!(&frame[..4], &(payload.len() as u32).to_be_bytes());

        let mut cursor = io::Cursor::new(frame);
        let decoded = FrameCodec::read_frame(&mut cursor, MAX_PDU_SIZE).unwrap();
        assert_eq!(decoded, Some(payload));

        // Stream now at a clean boundary.
        assert_eq!(FrameCodec::read_frame(&mut cursor, MAX_PDU_SIZE).unwrap(), None);
    }

    #[test]
    fn test_frame_oversize_rejected() {
        let frame = FrameCodec::encode(&[0u8; 64]);
        let mut cursor = io::Cursor::new(frame);
        let err = FrameCodec::read_frame(&mut cursor, 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_frame_truncated_mid_header() {
        let mut cursor = io::Cursor::new(vec![0x00, 0x00]);
        let err = FrameCodec::read_frame(&mut cursor, MAX_PDU_SIZE).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_frame_truncated_mid_body() {
        let mut frame = FrameCodec::encode(&[1, 2, 3, 4]);
        frame.truncate(frame.len() - 2);
        let mut cursor = io::Cursor::new(frame);
        assert!(FrameCodec::read_frame(&mut cursor, MAX_PDU_SIZE).is_err());
    }

    #[test]
    fn test_two_frames_back_to_back() {
        let mut stream = FrameCodec::encode(&[1, 2]);
        stream.extend_from_slice(&FrameCodec::encode(&[3]));
        let mut cursor = io::Cursor::new(stream);

        assert_eq!(
            FrameCodec::read_frame(&mut cursor, MAX_PDU_SIZE).unwrap(),
            Some(vec![1, 2])
        );
        assert_eq!(
            FrameCodec::read_frame(&mut cursor, MAX_PDU_SIZE).unwrap(),
            Some(vec![3])
        );
    }
}
