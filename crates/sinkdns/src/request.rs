// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The request object handlers operate on.
//!
//! Handlers communicate solely by mutating a [`Request`]: attaching a
//! structured response message, or attaching pre-serialized wire bytes
//! directly (the escape hatch fault-injection handlers use to bypass the
//! codec). The transport drivers own the surrounding buffers; a `Request`
//! carries only the transport-neutral state.

use std::net::SocketAddr;

use hickory_proto::op::Message;

/// Transport a request arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Connectionless datagram transport.
    Udp,
    /// Stream transport with two-byte length framing.
    Tcp,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Udp => write!(f, "udp"),
            Transport::Tcp => write!(f, "tcp"),
        }
    }
}

/// A parsed inbound query being driven through the handler chain.
pub struct Request {
    peer: SocketAddr,
    transport: Transport,
    request: Message,
    response: Option<Message>,
    wire_response: Option<Vec<u8>>,
}

impl Request {
    pub(crate) fn new(peer: SocketAddr, transport: Transport, request: Message) -> Self {
        Self {
            peer,
            transport,
            request,
            response: None,
            wire_response: None,
        }
    }

    /// Address of the client that sent the query.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Transport the query arrived over.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The parsed request message.
    pub fn message(&self) -> &Message {
        &self.request
    }

    /// The structured response, if a handler has attached one.
    pub fn response(&self) -> Option<&Message> {
        self.response.as_ref()
    }

    /// Mutable access to an attached structured response.
    pub fn response_mut(&mut self) -> Option<&mut Message> {
        self.response.as_mut()
    }

    /// Attach a structured response. Dispatch stops after the current
    /// handler returns.
    pub fn set_response(&mut self, response: Message) {
        self.response = Some(response);
    }

    /// Remove and return the structured response.
    pub fn take_response(&mut self) -> Option<Message> {
        self.response.take()
    }

    /// The serialized response bytes, if attached.
    pub fn wire_response(&self) -> Option<&[u8]> {
        self.wire_response.as_deref()
    }

    /// Attach serialized response bytes directly, bypassing the codec.
    /// Dispatch stops after the current handler returns.
    pub fn set_wire_response(&mut self, wire: Vec<u8>) {
        self.wire_response = Some(wire);
    }

    /// Mutable access to attached wire bytes (used by response manglers).
    pub fn wire_response_mut(&mut self) -> Option<&mut Vec<u8>> {
        self.wire_response.as_mut()
    }

    /// True once either a structured or a serialized response is attached;
    /// this is the handler-chain termination condition.
    pub fn has_response(&self) -> bool {
        self.response.is_some() || self.wire_response.is_some()
    }

    pub(crate) fn into_parts(self) -> (Message, Option<Message>, Option<Vec<u8>>) {
        (self.request, self.response, self.wire_response)
    }
}
