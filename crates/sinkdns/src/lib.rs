// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sinkdns: event-driven authoritative DNS responder framework
//!
//! A single-threaded DNS server engine for operators who answer queries
//! with custom logic (AS112 sink zones, CHAOS-class identification,
//! client introspection, fault injection) without writing the transport,
//! readiness handling, or wire plumbing themselves. The framework owns the
//! sockets and the protocol mechanics; callers supply handlers matched on
//! query name, type, and class.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sinkdns::hickory_proto::rr::{DNSClass, RecordType};
//! use sinkdns::{handlers, net, Reactor, Server};
//!
//! fn main() -> std::io::Result<()> {
//!     let mut server = Server::new(Reactor::new()?);
//!     server.add_port(net::bind_udp4_port(5053)?)?;
//!     server.add_port(net::bind_tcp4_port(5053)?)?;
//!
//!     server
//!         .register_handler(None, DNSClass::ANY, RecordType::ANY, Arc::new(handlers::QueryOnly))
//!         .expect("register guard");
//!     server
//!         .register_handler(None, DNSClass::ANY, RecordType::ANY, Arc::new(handlers::As112))
//!         .expect("register responder");
//!
//!     server.run()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                          Server                              |
//! |  +--------------------------------------------------------+  |
//! |  |                       Reactor                          |  |
//! |  |  mio::Poll + per-token idle deadlines                  |  |
//! |  +--------------------------------------------------------+  |
//! |          |                  |                    |           |
//! |          v                  v                    v           |
//! |  +-------------+    +-------------+     +---------------+    |
//! |  |  UDP port   |    | TCP accept  |     | TCP conn      |    |
//! |  |  driver     |    | path        |     | state machine |    |
//! |  +-------------+    +-------------+     +---------------+    |
//! |          |                                      |            |
//! |          +-------------------+------------------+            |
//! |                              v                               |
//! |  +--------------------------------------------------------+  |
//! |  |          Dispatch -> ordered handler registry          |  |
//! |  +--------------------------------------------------------+  |
//! +--------------------------------------------------------------+
//! ```
//!
//! DNS message parsing and serialization are delegated to `hickory-proto`
//! (re-exported as [`hickory_proto`] so handler code shares the same
//! types). The engine itself only handles the RFC 1035 section 4.2.2
//! two-byte length framing on TCP.
//!
//! ## Concurrency model
//!
//! Everything runs on one thread, driven by one readiness multiplexer.
//! Handlers execute synchronously during dispatch and must not block; they
//! mutate the request to attach a response and return. UDP backpressure is
//! absorbed by a per-port FIFO; TCP backpressure by flipping each
//! connection's watcher between read and write interest.

pub use hickory_proto;

/// Compile-time constants (buffer ceilings, timeouts, backlog).
pub mod config;

/// DNS codec glue: parse, serialize, canonical names, wildcard matching.
pub mod codec;

/// Named function table for handler discovery by string name.
pub mod functions;

/// Sample handlers: static records, AS112, client introspection, guards,
/// fault injection.
pub mod handlers;

/// Socket-binding helpers producing server-ready descriptors.
pub mod net;

/// Readiness-multiplexer binding with idle deadlines.
pub mod reactor;

/// Handler trait and the ordered handler registry.
pub mod registry;

/// The request object handlers mutate.
pub mod request;

mod dispatch;
mod server;
mod tcp;
mod udp;

pub use dispatch::process_message;
pub use reactor::{IoEvent, Reactor};
pub use registry::{Handler, HandlerEntry, HandlerRegistry};
pub use request::{Request, Transport};
pub use server::{PortId, Server};
