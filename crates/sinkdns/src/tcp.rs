// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP per-connection state machine.
//!
//! DNS over TCP frames every message with a 16-bit big-endian length
//! (RFC 1035 section 4.2.2). Each accepted connection cycles through:
//!
//! ```text
//!      +---------+       +----------+      +----------+
//!      | ReadLen | ----> | ReadBody | ---> | dispatch |
//!      +---------+       +----------+      +----------+
//!           ^                                    |
//!           |        +-----------+      +----------+
//!           +------- | WriteBody | <--- | WriteLen |
//!                    +-----------+      +----------+
//! ```
//!
//! The first send after dispatch is a two-segment gather of the remaining
//! prefix bytes and the body, so small responses leave in one syscall and
//! each message carries exactly one framing header. Successive requests on
//! one connection are handled strictly in order.
//!
//! The machine is generic over any `Read + Write` stream; the server plugs
//! in a `mio` stream, the tests a scriptable mock.

use std::io::{self, IoSlice, Read, Write};
use std::net::SocketAddr;

use log::{debug, warn};

use crate::config::TCP_PREFIX_SIZE;
use crate::dispatch;
use crate::registry::HandlerRegistry;
use crate::request::Transport;

/// What the connection needs from the event loop next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnStatus {
    /// Waiting for more inbound bytes; arm read interest.
    KeepReading,
    /// A response is partially written; arm write interest.
    KeepWriting,
    /// The connection is finished (EOF, error, parse failure, or oversized
    /// response); tear it down.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    ReadLen,
    ReadBody,
    WriteLen,
    WriteBody,
}

/// State for one accepted connection.
pub(crate) struct TcpConn<S> {
    stream: S,
    peer: SocketAddr,
    phase: Phase,

    // Inbound message being assembled.
    len_buf: [u8; TCP_PREFIX_SIZE],
    len_got: usize,
    body: Vec<u8>,
    body_got: usize,

    // Outbound message being emitted.
    prefix: [u8; TCP_PREFIX_SIZE],
    prefix_sent: usize,
    wire: Vec<u8>,
    body_sent: usize,
}

impl<S: Read + Write> TcpConn<S> {
    pub(crate) fn new(stream: S, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            phase: Phase::ReadLen,
            len_buf: [0; TCP_PREFIX_SIZE],
            len_got: 0,
            body: Vec::new(),
            body_got: 0,
            prefix: [0; TCP_PREFIX_SIZE],
            prefix_sent: 0,
            wire: Vec::new(),
            body_sent: 0,
        }
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub(crate) fn stream(&self) -> &S {
        &self.stream
    }

    #[cfg(test)]
    pub(crate) fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Advance the state machine as far as the socket allows.
    ///
    /// Safe to call on any readiness event; the machine simply retries the
    /// operation its current phase needs and stops on `WouldBlock`.
    pub(crate) fn drive(&mut self, registry: &HandlerRegistry) -> ConnStatus {
        loop {
            match self.phase {
                Phase::ReadLen => match self.read_len() {
                    Step::Progress => {}
                    Step::Blocked => return ConnStatus::KeepReading,
                    Step::Finished => return ConnStatus::Closed,
                },
                Phase::ReadBody => match self.read_body(registry) {
                    Step::Progress => {}
                    Step::Blocked => return ConnStatus::KeepReading,
                    Step::Finished => return ConnStatus::Closed,
                },
                Phase::WriteLen => match self.write_gather() {
                    Step::Progress => {}
                    Step::Blocked => return ConnStatus::KeepWriting,
                    Step::Finished => return ConnStatus::Closed,
                },
                Phase::WriteBody => {
                    if self.body_sent >= self.wire.len() {
                        // Message fully sent: drop its buffers and go back
                        // to reading so pipelined requests keep flowing.
                        self.reset_message_state();
                        continue;
                    }
                    match self.write_body() {
                        Step::Progress => {}
                        Step::Blocked => return ConnStatus::KeepWriting,
                        Step::Finished => return ConnStatus::Closed,
                    }
                }
            }
        }
    }

    fn read_len(&mut self) -> Step {
        match self.stream.read(&mut self.len_buf[self.len_got..]) {
            Ok(0) => {
                if self.len_got == 0 {
                    debug!("[tcp] {} closed the connection", self.peer);
                } else {
                    warn!("[tcp] {} closed mid length prefix", self.peer);
                }
                Step::Finished
            }
            Ok(n) => {
                self.len_got += n;
                if self.len_got == TCP_PREFIX_SIZE {
                    let len = u16::from_be_bytes(self.len_buf) as usize;
                    if len == 0 {
                        // Zero-length frame: nothing to dispatch, keep the
                        // connection open for the next prefix.
                        self.len_got = 0;
                        return Step::Progress;
                    }
                    self.body = vec![0u8; len];
                    self.body_got = 0;
                    self.phase = Phase::ReadBody;
                }
                Step::Progress
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Step::Blocked,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Step::Progress,
            Err(e) => {
                warn!("[tcp] read error from {}: {e}", self.peer);
                Step::Finished
            }
        }
    }

    fn read_body(&mut self, registry: &HandlerRegistry) -> Step {
        match self.stream.read(&mut self.body[self.body_got..]) {
            Ok(0) => {
                warn!("[tcp] {} closed mid message", self.peer);
                Step::Finished
            }
            Ok(n) => {
                self.body_got += n;
                if self.body_got == self.body.len() {
                    return self.dispatch_message(registry);
                }
                Step::Progress
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Step::Blocked,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Step::Progress,
            Err(e) => {
                warn!("[tcp] read error from {}: {e}", self.peer);
                Step::Finished
            }
        }
    }

    fn dispatch_message(&mut self, registry: &HandlerRegistry) -> Step {
        let Some(wire) =
            dispatch::process_message(registry, self.peer, Transport::Tcp, &self.body)
        else {
            // Unparseable traffic on a stream is fatal for the connection.
            return Step::Finished;
        };

        if wire.len() > u16::MAX as usize {
            warn!(
                "[tcp] response for {} exceeds the 16-bit frame limit ({} bytes)",
                self.peer,
                wire.len()
            );
            return Step::Finished;
        }

        self.prefix = (wire.len() as u16).to_be_bytes();
        self.prefix_sent = 0;
        self.body_sent = 0;
        self.wire = wire;
        self.phase = Phase::WriteLen;
        Step::Progress
    }

    /// First write(s) of a response: a two-segment gather of the remaining
    /// prefix bytes and the body. Transferred bytes are credited against
    /// the prefix first, the remainder against the body.
    fn write_gather(&mut self) -> Step {
        let bufs = [
            IoSlice::new(&self.prefix[self.prefix_sent..]),
            IoSlice::new(&self.wire[self.body_sent..]),
        ];
        match self.stream.write_vectored(&bufs) {
            Ok(0) => {
                warn!("[tcp] zero-length write to {}", self.peer);
                Step::Finished
            }
            Ok(n) => {
                let prefix_credit = n.min(TCP_PREFIX_SIZE - self.prefix_sent);
                self.prefix_sent += prefix_credit;
                self.body_sent += n - prefix_credit;
                if self.prefix_sent == TCP_PREFIX_SIZE {
                    self.phase = Phase::WriteBody;
                }
                Step::Progress
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Step::Blocked,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Step::Progress,
            Err(e) => {
                warn!("[tcp] write error to {}: {e}", self.peer);
                Step::Finished
            }
        }
    }

    fn write_body(&mut self) -> Step {
        match self.stream.write(&self.wire[self.body_sent..]) {
            Ok(0) => {
                warn!("[tcp] zero-length write to {}", self.peer);
                Step::Finished
            }
            Ok(n) => {
                self.body_sent += n;
                Step::Progress
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Step::Blocked,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Step::Progress,
            Err(e) => {
                warn!("[tcp] write error to {}: {e}", self.peer);
                Step::Finished
            }
        }
    }

    fn reset_message_state(&mut self) {
        self.len_got = 0;
        self.body = Vec::new();
        self.body_got = 0;
        self.prefix_sent = 0;
        self.wire = Vec::new();
        self.body_sent = 0;
        self.phase = Phase::ReadLen;
    }
}

enum Step {
    Progress,
    Blocked,
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
    use hickory_proto::rr::{Name, RecordType};
    use std::collections::VecDeque;

    /// Scriptable stream: queued inbound bytes, captured outbound bytes,
    /// optional per-call write cap, and injectable errors.
    struct MockStream {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        eof: bool,
        read_limit: Option<usize>,
        write_limit: Option<usize>,
        write_errors: VecDeque<io::ErrorKind>,
    }

    impl MockStream {
        fn new() -> Self {
            Self {
                rx: VecDeque::new(),
                tx: Vec::new(),
                eof: false,
                read_limit: None,
                write_limit: None,
                write_errors: VecDeque::new(),
            }
        }

        fn feed(&mut self, data: &[u8]) {
            self.rx.extend(data);
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.rx.is_empty() {
                if self.eof {
                    return Ok(0);
                }
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"));
            }
            let mut limit = buf.len().min(self.rx.len());
            if let Some(cap) = self.read_limit {
                limit = limit.min(cap);
            }
            for slot in buf.iter_mut().take(limit) {
                *slot = self.rx.pop_front().expect("non-empty");
            }
            Ok(limit)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.write_errors.pop_front() {
                return Err(io::Error::new(kind, "injected write error"));
            }
            let n = match self.write_limit {
                Some(cap) => buf.len().min(cap),
                None => buf.len(),
            };
            self.tx.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
            if let Some(kind) = self.write_errors.pop_front() {
                return Err(io::Error::new(kind, "injected write error"));
            }
            let mut remaining = self.write_limit.unwrap_or(usize::MAX);
            let mut written = 0;
            for buf in bufs {
                if remaining == 0 {
                    break;
                }
                let n = buf.len().min(remaining);
                self.tx.extend_from_slice(&buf[..n]);
                written += n;
                remaining -= n;
            }
            Ok(written)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn peer() -> SocketAddr {
        "192.0.2.5:5353".parse().expect("addr")
    }

    fn query_bytes(id: u16) -> Vec<u8> {
        let mut message = Message::new();
        message
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true);
        message.add_query(Query::query(
            Name::from_ascii("example.com.").expect("name"),
            RecordType::A,
        ));
        codec::serialize(&message).expect("serialize")
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u16).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    /// Split `tx` into framed messages, asserting consistent framing.
    fn deframe(mut tx: &[u8]) -> Vec<Vec<u8>> {
        let mut messages = Vec::new();
        while !tx.is_empty() {
            assert!(tx.len() >= 2, "truncated frame header");
            let len = u16::from_be_bytes([tx[0], tx[1]]) as usize;
            assert!(tx.len() >= 2 + len, "truncated frame body");
            messages.push(tx[2..2 + len].to_vec());
            tx = &tx[2 + len..];
        }
        messages
    }

    #[test]
    fn test_single_request_gets_framed_response() {
        let mut stream = MockStream::new();
        stream.feed(&framed(&query_bytes(0x1d1d)));

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());

        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);

        let messages = deframe(&conn.stream().tx);
        assert_eq!(messages.len(), 1);
        let response = codec::parse(&messages[0]).expect("parse response");
        assert_eq!(response.id(), 0x1d1d);
        assert_eq!(response.message_type(), MessageType::Response);
        assert_eq!(response.response_code(), ResponseCode::Refused);
    }

    #[test]
    fn test_pipelined_requests_answered_in_order() {
        let mut stream = MockStream::new();
        stream.feed(&framed(&query_bytes(1)));
        stream.feed(&framed(&query_bytes(2)));

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());

        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);

        let messages = deframe(&conn.stream().tx);
        assert_eq!(messages.len(), 2);
        assert_eq!(codec::parse(&messages[0]).expect("parse").id(), 1);
        assert_eq!(codec::parse(&messages[1]).expect("parse").id(), 2);
    }

    #[test]
    fn test_zero_length_frame_keeps_connection_open() {
        let mut stream = MockStream::new();
        stream.feed(&[0x00, 0x00]);

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());

        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);
        assert!(conn.stream().tx.is_empty());

        // A real request afterwards is still served.
        conn.stream_mut().feed(&framed(&query_bytes(3)));
        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);
        assert_eq!(deframe(&conn.stream().tx).len(), 1);
    }

    #[test]
    fn test_clean_eof_between_messages_closes() {
        let mut stream = MockStream::new();
        stream.eof = true;

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());
        assert_eq!(conn.drive(&registry), ConnStatus::Closed);
    }

    #[test]
    fn test_eof_mid_message_closes() {
        let mut stream = MockStream::new();
        let query = query_bytes(4);
        let frame = framed(&query);
        stream.feed(&frame[..frame.len() - 3]);
        stream.eof = true;

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());
        assert_eq!(conn.drive(&registry), ConnStatus::Closed);
    }

    #[test]
    fn test_split_length_prefix() {
        let frame = framed(&query_bytes(5));

        let mut stream = MockStream::new();
        stream.feed(&frame[..1]);

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());
        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);
        assert!(conn.stream().tx.is_empty());

        conn.stream_mut().feed(&frame[1..]);
        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);
        assert_eq!(deframe(&conn.stream().tx).len(), 1);
    }

    #[test]
    fn test_trickled_body_reads() {
        let mut stream = MockStream::new();
        stream.read_limit = Some(1);
        stream.feed(&framed(&query_bytes(6)));

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());
        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);
        assert_eq!(deframe(&conn.stream().tx).len(), 1);
    }

    #[test]
    fn test_unparseable_body_closes_connection() {
        let mut stream = MockStream::new();
        stream.feed(&framed(&[0xba, 0xad, 0xf0, 0x0d]));

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());
        assert_eq!(conn.drive(&registry), ConnStatus::Closed);
        assert!(conn.stream().tx.is_empty());
    }

    #[test]
    fn test_gather_write_partial_accounting() {
        // Cap every write at one byte: the prefix dribbles out over two
        // calls, then the body byte-by-byte. The result on the wire must
        // still be one header followed by the exact response bytes.
        let mut stream = MockStream::new();
        stream.write_limit = Some(1);
        stream.feed(&framed(&query_bytes(7)));

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());
        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);

        let messages = deframe(&conn.stream().tx);
        assert_eq!(messages.len(), 1);
        assert_eq!(codec::parse(&messages[0]).expect("parse").id(), 7);
    }

    #[test]
    fn test_gather_write_partial_body_credit() {
        // First gather transfers the whole prefix plus three body bytes;
        // the remainder must pick up exactly where the gather stopped.
        let mut stream = MockStream::new();
        stream.write_limit = Some(5);
        stream.feed(&framed(&query_bytes(8)));

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());
        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);

        let messages = deframe(&conn.stream().tx);
        assert_eq!(messages.len(), 1);
        let response = codec::parse(&messages[0]).expect("parse");
        assert_eq!(response.id(), 8);
        assert_eq!(response.response_code(), ResponseCode::Refused);
    }

    #[test]
    fn test_would_block_during_write_then_resume() {
        let mut stream = MockStream::new();
        stream.feed(&framed(&query_bytes(9)));
        stream.write_errors.push_back(io::ErrorKind::WouldBlock);

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());

        // Dispatch succeeds but the first write blocks.
        assert_eq!(conn.drive(&registry), ConnStatus::KeepWriting);
        assert!(conn.stream().tx.is_empty());

        // Writability returns: the response goes out and the machine goes
        // back to reading.
        assert_eq!(conn.drive(&registry), ConnStatus::KeepReading);
        let messages = deframe(&conn.stream().tx);
        assert_eq!(messages.len(), 1);
        assert_eq!(codec::parse(&messages[0]).expect("parse").id(), 9);
    }

    #[test]
    fn test_hard_write_error_closes() {
        let mut stream = MockStream::new();
        stream.feed(&framed(&query_bytes(10)));
        stream.write_errors.push_back(io::ErrorKind::BrokenPipe);

        let registry = HandlerRegistry::new();
        let mut conn = TcpConn::new(stream, peer());
        assert_eq!(conn.drive(&registry), ConnStatus::Closed);
    }
}
