// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server context: ports, connections, and the event loop.
//!
//! A [`Server`] owns a [`Reactor`], a handler registry, and any number of
//! ports. Ports are added from already-bound non-blocking sockets; the
//! transport is autodetected from the socket type. UDP ports are driven by
//! [`UdpDriver`]; TCP ports accept connections that each get their own
//! watcher and [`TcpConn`] state machine.
//!
//! # Port lifetime
//!
//! A port lives as long as anything still needs it: the server's watcher
//! entry holds one strong handle, and every accepted TCP connection holds
//! another, so closing a listening port stops new accepts while established
//! connections keep the socket's state alive until they finish. For UDP,
//! queued responses are owned by the port's own FIFO; closing masks
//! readability and the port is destroyed once the queue drains.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::net::Shutdown;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::error::ProtoError;
use hickory_proto::rr::{DNSClass, RecordType};
use log::{debug, info, warn};
use mio::{Interest, Token};

use crate::config::TCP_IDLE_TIMEOUT;
use crate::net;
use crate::reactor::{IoEvent, Reactor};
use crate::registry::{Handler, HandlerRegistry};
use crate::tcp::{ConnStatus, TcpConn};
use crate::udp::{ReadOutcome, UdpDriver};

/// Opaque handle to a port added to a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(Token);

struct Port {
    token: Token,
    fd: RawFd,
    closing: Cell<bool>,
    kind: PortKind,
}

enum PortKind {
    Udp(RefCell<UdpDriver<mio::net::UdpSocket>>),
    Tcp(mio::net::TcpListener),
}

impl Port {
    fn kind_name(&self) -> &'static str {
        match self.kind {
            PortKind::Udp(_) => "udp",
            PortKind::Tcp(_) => "tcp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Armed {
    Read,
    Write,
}

struct ConnEntry {
    conn: TcpConn<mio::net::TcpStream>,
    /// Strong handle keeping the listening port alive while this
    /// connection exists.
    #[allow(dead_code)]
    port: Rc<Port>,
    armed: Armed,
}

/// Single-threaded DNS server driving UDP and TCP ports from one reactor.
pub struct Server {
    reactor: Reactor,
    registry: Arc<HandlerRegistry>,
    ports: HashMap<Token, Rc<Port>>,
    conns: HashMap<Token, ConnEntry>,
    events: Vec<IoEvent>,
}

impl Server {
    /// Create a server over a supplied reactor. The handler registry and
    /// port set start empty.
    pub fn new(reactor: Reactor) -> Self {
        Self {
            reactor,
            registry: Arc::new(HandlerRegistry::new()),
            ports: HashMap::new(),
            conns: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// The server's handler registry. Clone the `Arc` to register handlers
    /// from handler code (changes become visible on the next request).
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Append a handler entry to the registry.
    ///
    /// `pattern` is canonicalized once here; `DNSClass::ANY` and
    /// `RecordType::ANY` act as match-all filters.
    pub fn register_handler(
        &self,
        pattern: Option<&str>,
        class: DNSClass,
        rtype: RecordType,
        handler: Arc<dyn Handler>,
    ) -> Result<(), ProtoError> {
        self.registry.add(pattern, class, rtype, handler)
    }

    /// Add a port from an already-bound, non-blocking socket (already
    /// listening, for TCP). The transport is autodetected from the socket
    /// type: stream sockets accept connections, datagram sockets serve
    /// queries directly.
    ///
    /// Ownership of the descriptor transfers to the server; it is closed
    /// when the port is destroyed.
    pub fn add_port(&mut self, fd: OwnedFd) -> io::Result<PortId> {
        let is_stream = net::socket_is_stream(&fd)?;
        let raw = fd.as_raw_fd();
        let token = self.reactor.alloc_token();

        let kind = if is_stream {
            PortKind::Tcp(mio::net::TcpListener::from_std(std::net::TcpListener::from(fd)))
        } else {
            let socket = mio::net::UdpSocket::from_std(std::net::UdpSocket::from(fd));
            PortKind::Udp(RefCell::new(UdpDriver::new(socket)))
        };

        self.reactor.register(raw, token, Interest::READABLE)?;

        let port = Rc::new(Port {
            token,
            fd: raw,
            closing: Cell::new(false),
            kind,
        });
        info!("[server] added {} port fd#{raw}", port.kind_name());
        self.ports.insert(token, port);
        Ok(PortId(token))
    }

    /// Request closure of a port.
    ///
    /// The watcher stops observing readability immediately. A TCP port's
    /// established connections continue until they finish on their own; a
    /// UDP port with queued responses keeps draining them and is destroyed
    /// once the queue empties.
    pub fn close_port(&mut self, id: PortId) {
        let Some(port) = self.ports.get(&id.0).map(Rc::clone) else {
            warn!("[server] close_port on unknown port");
            return;
        };
        port.closing.set(true);

        match &port.kind {
            PortKind::Tcp(_) => {
                if let Err(e) = self.reactor.deregister(port.fd, port.token) {
                    warn!("[server] failed to deregister listener: {e}");
                }
                self.ports.remove(&id.0);
                debug!("[server] tcp port closing, watcher released");
            }
            PortKind::Udp(driver) => {
                let has_pending = driver.borrow().has_pending();
                if has_pending {
                    // Mask readability; pending responses still drain.
                    if let Err(e) =
                        self.reactor.reregister(port.fd, port.token, Interest::WRITABLE)
                    {
                        warn!("[server] failed to mask readability, destroying port: {e}");
                        self.destroy_port(id.0);
                    }
                } else {
                    self.destroy_port(id.0);
                }
            }
        }
    }

    /// Number of ports currently tracked by watchers.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Number of live TCP connections.
    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    /// Run one reactor iteration: wait up to `timeout` for readiness or
    /// deadline expiry and process every resulting event. Returns the
    /// number of events processed.
    pub fn turn(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        let mut events = std::mem::take(&mut self.events);
        events.clear();
        self.reactor.poll(&mut events, timeout)?;

        let processed = events.len();
        for event in &events {
            match *event {
                IoEvent::Ready {
                    token,
                    readable,
                    writable,
                } => self.handle_ready(token, readable, writable),
                IoEvent::Timeout { token } => self.handle_timeout(token),
            }
        }

        self.events = events;
        Ok(processed)
    }

    /// Drive the event loop until the process exits.
    pub fn run(&mut self) -> io::Result<()> {
        info!("[server] entering event loop");
        loop {
            self.turn(None)?;
        }
    }

    fn handle_ready(&mut self, token: Token, readable: bool, writable: bool) {
        if let Some(port) = self.ports.get(&token).map(Rc::clone) {
            match &port.kind {
                PortKind::Udp(_) => self.drive_udp_port(&port, readable, writable),
                PortKind::Tcp(_) => {
                    if readable {
                        self.accept_connections(&port);
                    }
                }
            }
        } else if self.conns.contains_key(&token) {
            self.drive_conn(token);
        }
        // Events for tokens removed earlier in the same batch are stale;
        // ignore them.
    }

    fn handle_timeout(&mut self, token: Token) {
        if let Some(entry) = self.conns.get(&token) {
            debug!("[tcp] idle timeout for {}", entry.conn.peer());
            self.teardown_conn(token);
        }
    }

    // ------------------------------------------------------------------
    // UDP
    // ------------------------------------------------------------------

    fn drive_udp_port(&mut self, port: &Rc<Port>, readable: bool, writable: bool) {
        let PortKind::Udp(driver) = &port.kind else {
            return;
        };

        if readable {
            let outcome = driver.borrow_mut().on_readable(&self.registry);
            if outcome == ReadOutcome::BackpressureStarted {
                let interest = if port.closing.get() {
                    Interest::WRITABLE
                } else {
                    Interest::READABLE | Interest::WRITABLE
                };
                if let Err(e) = self.reactor.reregister(port.fd, port.token, interest) {
                    warn!("[udp] failed to watch writability: {e}");
                }
            }
        }

        if writable {
            let drained = driver.borrow_mut().on_writable();
            if drained {
                if port.closing.get() {
                    self.destroy_port(port.token);
                } else if let Err(e) =
                    self.reactor.reregister(port.fd, port.token, Interest::READABLE)
                {
                    warn!("[udp] failed to restore read interest: {e}");
                }
            }
        }
    }

    fn destroy_port(&mut self, token: Token) {
        if let Some(port) = self.ports.remove(&token) {
            if let Err(e) = self.reactor.deregister(port.fd, token) {
                debug!("[server] deregister during destroy: {e}");
            }
            if let PortKind::Udp(driver) = &port.kind {
                driver.borrow_mut().discard_pending();
            }
            debug!("[server] destroyed {} port fd#{}", port.kind_name(), port.fd);
        }
    }

    // ------------------------------------------------------------------
    // TCP
    // ------------------------------------------------------------------

    fn accept_connections(&mut self, port: &Rc<Port>) {
        let PortKind::Tcp(listener) = &port.kind else {
            return;
        };

        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    // mio's accept leaves the stream non-blocking.
                    let token = self.reactor.alloc_token();
                    let raw = stream.as_raw_fd();
                    if let Err(e) = self.reactor.register(raw, token, Interest::READABLE) {
                        warn!("[tcp] failed to watch connection from {peer}: {e}");
                        continue;
                    }
                    self.reactor.set_deadline(token, TCP_IDLE_TIMEOUT);
                    debug!("[tcp] accepted connection from {peer}");
                    self.conns.insert(
                        token,
                        ConnEntry {
                            conn: TcpConn::new(stream, peer),
                            port: Rc::clone(port),
                            armed: Armed::Read,
                        },
                    );
                    // The client may have sent its request already.
                    self.drive_conn(token);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("[tcp] accept error: {e}");
                    break;
                }
            }
        }
    }

    fn drive_conn(&mut self, token: Token) {
        let registry = Arc::clone(&self.registry);
        let (status, raw) = match self.conns.get_mut(&token) {
            Some(entry) => (
                entry.conn.drive(&registry),
                entry.conn.stream().as_raw_fd(),
            ),
            None => return,
        };

        match status {
            ConnStatus::KeepReading => self.arm_conn(token, raw, Armed::Read),
            ConnStatus::KeepWriting => self.arm_conn(token, raw, Armed::Write),
            ConnStatus::Closed => self.teardown_conn(token),
        }
    }

    /// Ensure the connection watcher observes exactly the requested
    /// direction and refresh its idle deadline.
    fn arm_conn(&mut self, token: Token, raw: RawFd, want: Armed) {
        let rearm_failed = match self.conns.get_mut(&token) {
            Some(entry) if entry.armed != want => {
                entry.armed = want;
                let interest = match want {
                    Armed::Read => Interest::READABLE,
                    Armed::Write => Interest::WRITABLE,
                };
                self.reactor.reregister(raw, token, interest).is_err()
            }
            Some(_) => false,
            None => return,
        };

        if rearm_failed {
            warn!("[tcp] failed to re-arm connection watcher");
            self.teardown_conn(token);
            return;
        }
        self.reactor.set_deadline(token, TCP_IDLE_TIMEOUT);
    }

    fn teardown_conn(&mut self, token: Token) {
        if let Some(entry) = self.conns.remove(&token) {
            let raw = entry.conn.stream().as_raw_fd();
            if let Err(e) = self.reactor.deregister(raw, token) {
                debug!("[tcp] deregister during teardown: {e}");
            }
            let _ = entry.conn.stream().shutdown(Shutdown::Both);
            debug!("[tcp] closed connection from {}", entry.conn.peer());
            // Dropping the entry closes the socket and releases its hold
            // on the listening port.
        }
    }

    #[cfg(test)]
    fn port_strong_count(&self, id: PortId) -> Option<usize> {
        self.ports.get(&id.0).map(Rc::strong_count)
    }
}
