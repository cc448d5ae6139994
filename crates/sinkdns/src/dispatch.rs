// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The dispatch pipeline.
//!
//! Takes the raw bytes of one inbound message, walks the handler registry,
//! and produces the wire bytes of exactly one response, or nothing when
//! the message must be dropped (unparseable, or itself a response). The
//! transport drivers feed this from their read paths and send whatever
//! comes back.

use std::net::SocketAddr;

use hickory_proto::op::{MessageType, ResponseCode};
use log::{debug, warn};

use crate::codec;
use crate::registry::HandlerRegistry;
use crate::request::{Request, Transport};

/// Run one message through the handler chain.
///
/// Returns the serialized response to send, or `None` when the message is
/// dropped: parse failures and inbound responses (QR=1) get no reply, per
/// responder convention. A query no handler answers is refused rather than
/// dropped.
pub fn process_message(
    registry: &HandlerRegistry,
    peer: SocketAddr,
    transport: Transport,
    buf: &[u8],
) -> Option<Vec<u8>> {
    let message = match codec::parse(buf) {
        Ok(message) => message,
        Err(e) => {
            debug!("[dispatch] dropping unparseable {transport} message from {peer}: {e}");
            return None;
        }
    };

    // A responder must not reply to replies.
    if message.message_type() == MessageType::Response {
        debug!("[dispatch] dropping inbound response (QR=1) from {peer}");
        return None;
    }

    let mut request = Request::new(peer, transport, message);

    if let Some(query) = request.message().queries().first().cloned() {
        let qname = codec::canonical_name(query.name());
        let qtype = query.query_type();
        let qclass = query.query_class();

        // Snapshot: entries registered by a running handler take effect on
        // the next request, and the walk is never restarted.
        for entry in registry.snapshot() {
            if !entry.matches(&qname, qtype, qclass) {
                continue;
            }
            entry.handler().handle(&mut request, &qname, qtype, qclass);
            if request.has_response() {
                break;
            }
        }
    }

    finish(request)
}

/// Turn a dispatched request into wire bytes, synthesizing the default
/// REFUSED response when no handler attached one.
fn finish(request: Request) -> Option<Vec<u8>> {
    let peer = request.peer();
    let (message, response, wire_response) = request.into_parts();

    if let Some(wire) = wire_response {
        return Some(wire);
    }

    let response = response.unwrap_or_else(|| codec::build_response(&message, ResponseCode::Refused));
    match codec::serialize(&response) {
        Ok(wire) => Some(wire),
        Err(e) => {
            warn!("[dispatch] failed to serialize response for {peer}: {e}");
            None
        }
    }
}
