// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP port driver.
//!
//! One driver per bound datagram socket. The read path drains the socket in
//! a tight non-blocking loop, dispatches each datagram, and tries to send
//! the response immediately; a send that would block parks the response on
//! a per-port FIFO and the server widens the watcher to writability. The
//! write path drains that FIFO head-to-tail, preserving the order in which
//! the responses were generated.
//!
//! The driver is generic over [`DgramSocket`] so the backpressure machinery
//! can be unit-tested with a mock socket that injects `WouldBlock`.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use log::{debug, warn};

use crate::config::MAX_DATAGRAM_SIZE;
use crate::dispatch;
use crate::registry::HandlerRegistry;
use crate::request::Transport;

/// Minimal datagram-socket surface the driver needs.
pub(crate) trait DgramSocket {
    /// Receive one datagram; non-blocking.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Send one datagram; non-blocking.
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;
}

impl DgramSocket for mio::net::UdpSocket {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        mio::net::UdpSocket::recv_from(self, buf)
    }

    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        mio::net::UdpSocket::send_to(self, buf, target)
    }
}

/// A response whose immediate send would have blocked.
struct PendingResponse {
    peer: SocketAddr,
    wire: Vec<u8>,
}

/// Result of one read-path invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// The pending FIFO state did not change from empty to non-empty.
    Quiet,
    /// The FIFO went from empty to non-empty; the watcher must start
    /// observing writability.
    BackpressureStarted,
}

/// Per-port state machine for a datagram socket.
pub(crate) struct UdpDriver<D> {
    socket: D,
    pending: VecDeque<PendingResponse>,
    recv_buf: Vec<u8>,
}

impl<D: DgramSocket> UdpDriver<D> {
    pub(crate) fn new(socket: D) -> Self {
        Self {
            socket,
            pending: VecDeque::new(),
            recv_buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drain the socket, dispatching every datagram.
    ///
    /// Datagrams received while the FIFO is non-empty still get their own
    /// immediate send attempt; only sends that would block join the tail.
    /// Receive errors other than `WouldBlock` drop the offending datagram
    /// and leave the port alive.
    pub(crate) fn on_readable(&mut self, registry: &HandlerRegistry) -> ReadOutcome {
        let was_empty = self.pending.is_empty();

        loop {
            let (len, peer) = match self.socket.recv_from(&mut self.recv_buf) {
                Ok(received) => received,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("[udp] recv error: {e}");
                    break;
                }
            };

            let Some(wire) =
                dispatch::process_message(registry, peer, Transport::Udp, &self.recv_buf[..len])
            else {
                continue;
            };

            match self.socket.send_to(&wire, peer) {
                Ok(_) => {}
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    debug!("[udp] send to {peer} would block, queueing {} bytes", wire.len());
                    self.pending.push_back(PendingResponse { peer, wire });
                }
                Err(e) => {
                    warn!("[udp] send to {peer} failed, dropping response: {e}");
                }
            }
        }

        if was_empty && !self.pending.is_empty() {
            ReadOutcome::BackpressureStarted
        } else {
            ReadOutcome::Quiet
        }
    }

    /// Drain the pending FIFO in order. Returns `true` when the FIFO is
    /// empty afterwards (the watcher can fall back to read-only interest).
    pub(crate) fn on_writable(&mut self) -> bool {
        while let Some(front) = self.pending.front() {
            match self.socket.send_to(&front.wire, front.peer) {
                Ok(_) => {
                    self.pending.pop_front();
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let peer = front.peer;
                    warn!("[udp] queued send to {peer} failed, dropping response: {e}");
                    self.pending.pop_front();
                }
            }
        }
        true
    }

    /// Drop every queued response without sending. Used at port teardown.
    pub(crate) fn discard_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!("[udp] discarding {} undeliverable responses", self.pending.len());
            self.pending.clear();
        }
    }
}
