// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP transport: one PDU per datagram.
//!
//! Outbound PDUs are resolved to a socket address through a peer table keyed
//! by entity id; inbound datagrams are handed to the entity as-is. The
//! receive loop wakes at a fixed cadence to drive the entity's timers even
//! when the link is quiet.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use dashmap::DashMap;
use socket2::{Domain, Protocol, Socket, Type};

use crate::entity::Entity;
use crate::pdu::EntityId;
use crate::transaction::PduSender;

/// Receive poll period; also the timer tick cadence.
const POLL_PERIOD: Duration = Duration::from_millis(100);

/// Datagram receive buffer, large enough for any PDU.
const RECV_BUFFER_SIZE: usize = 65536;

/// UDP transport with an entity-id-to-address peer table.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peers: DashMap<EntityId, SocketAddr>,
    running: Arc<AtomicBool>,
}

impl UdpTransport {
    /// Bind a reusable datagram socket to `addr`.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        let socket: UdpSocket = socket.into();
        log::debug!("[udp] transport bound to {}", socket.local_addr()?);

        Ok(Self {
            socket: Arc::new(socket),
            peers: DashMap::new(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Local socket address (useful with port 0 binds in tests).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Route PDUs for `entity_id` to `addr`.
    pub fn add_peer(&self, entity_id: EntityId, addr: SocketAddr) {
        self.peers.insert(entity_id, addr);
    }

    /// Remove the route for `entity_id`.
    pub fn remove_peer(&self, entity_id: EntityId) {
        self.peers.remove(&entity_id);
    }

    /// Spawn the receive loop feeding `entity`.
    ///
    /// The loop delivers every datagram to `Entity::process_pdu` and calls
    /// `Entity::check_timers` once per poll period. It exits after
    /// [`UdpTransport::shutdown`].
    pub fn spawn_receiver(&self, entity: Arc<Entity>) -> io::Result<JoinHandle<()>> {
        let socket = self.socket.clone();
        let running = self.running.clone();
        socket.set_read_timeout(Some(POLL_PERIOD))?;

        Ok(std::thread::spawn(move || {
            let mut buf = vec![0u8; RECV_BUFFER_SIZE];
            while running.load(Ordering::Relaxed) {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => {
                        log::debug!("[udp] {} octets from {}", len, from);
                        // Decode failures are already logged and counted.
                        let _ = entity.process_pdu(&buf[..len]);
                    }
                    Err(err)
                        if err.kind() == io::ErrorKind::WouldBlock
                            || err.kind() == io::ErrorKind::TimedOut => {}
                    Err(err) => {
                        log::warn!("[udp] receive failed: {}", err);
                    }
                }
                entity.check_timers();
            }
            log::debug!("[udp] receive loop stopped");
        }))
    }

    /// Stop the receive loop at its next poll.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl PduSender for UdpTransport {
    fn send_pdu(&self, pdu: &[u8], destination: EntityId) {
        let Some(addr) = self.peers.get(&destination).map(|entry| *entry.value()) else {
            log::warn!("[udp] no route for entity {}, PDU dropped", destination);
            return;
        };
        if let Err(err) = self.socket.send_to(pdu, addr) {
            log::warn!("[udp] send to {} failed: {}", addr, err);
        }
    }
}
