// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readiness-multiplexer binding.
//!
//! Wraps [`mio::Poll`] behind a watcher-oriented interface: file descriptors
//! are registered with a [`Token`] and an [`Interest`] mask, the mask can be
//! changed in place without reallocating any watcher state, and each token
//! may carry one idle deadline. A single [`Reactor::poll`] call surfaces both
//! kinds of wakeup through the [`IoEvent`] enum, so the caller drives
//! readiness and timeouts from one loop.
//!
//! mio exposes edge-triggered readiness on every platform this crate targets,
//! so consumers must drain sockets until `WouldBlock` after each `Ready`
//! event.

use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::config::MAX_POLL_EVENTS;

/// A single wakeup delivered by [`Reactor::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoEvent {
    /// The watched descriptor became ready.
    Ready {
        /// Token the descriptor was registered with.
        token: Token,
        /// Readable readiness was signalled.
        readable: bool,
        /// Writable readiness was signalled.
        writable: bool,
    },

    /// The token's idle deadline expired. Deadlines are one-shot: a fired
    /// deadline is removed and must be re-armed explicitly.
    Timeout {
        /// Token whose deadline fired.
        token: Token,
    },
}

/// Single-threaded readiness reactor with per-token idle deadlines.
pub struct Reactor {
    poll: Poll,
    events: Events,
    deadlines: HashMap<Token, Instant>,
    next_token: usize,
}

impl Reactor {
    /// Create a reactor with the default event capacity.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(MAX_POLL_EVENTS),
            deadlines: HashMap::new(),
            next_token: 0,
        })
    }

    /// Allocate a fresh token. Tokens are never reused within one reactor.
    pub fn alloc_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Start watching `fd` with the given interest mask.
    pub fn register(&mut self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), token, interest)
    }

    /// Change the interest mask of an already-registered descriptor.
    pub fn reregister(&mut self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        self.poll
            .registry()
            .reregister(&mut SourceFd(&fd), token, interest)
    }

    /// Stop watching `fd` and drop any pending deadline for `token`.
    pub fn deregister(&mut self, fd: RawFd, token: Token) -> io::Result<()> {
        self.deadlines.remove(&token);
        self.poll.registry().deregister(&mut SourceFd(&fd))
    }

    /// Arm (or re-arm) the idle deadline for `token`.
    pub fn set_deadline(&mut self, token: Token, after: Duration) {
        self.deadlines.insert(token, Instant::now() + after);
    }

    /// Disarm the idle deadline for `token`, if any.
    pub fn clear_deadline(&mut self, token: Token) {
        self.deadlines.remove(&token);
    }

    /// Nearest pending deadline, if any.
    fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Wait for readiness or deadline expiry and append the resulting events
    /// to `out`.
    ///
    /// `timeout` bounds the wait; `None` blocks until something happens. The
    /// effective wait is shortened so the nearest deadline fires on time.
    /// Returns the number of events appended.
    pub fn poll(&mut self, out: &mut Vec<IoEvent>, timeout: Option<Duration>) -> io::Result<usize> {
        let now = Instant::now();
        let wait = match (timeout, self.next_deadline()) {
            (None, None) => None,
            (Some(t), None) => Some(t),
            (None, Some(dl)) => Some(dl.saturating_duration_since(now)),
            (Some(t), Some(dl)) => Some(t.min(dl.saturating_duration_since(now))),
        };

        match self.poll.poll(&mut self.events, wait) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }

        let before = out.len();
        for event in self.events.iter() {
            out.push(IoEvent::Ready {
                token: event.token(),
                readable: event.is_readable(),
                writable: event.is_writable(),
            });
        }

        // Expired deadlines are reported after readiness so that a socket
        // which became ready at the same instant gets a chance to make
        // progress before its watcher is torn down.
        let now = Instant::now();
        let expired: Vec<Token> = self
            .deadlines
            .iter()
            .filter(|(_, dl)| **dl <= now)
            .map(|(t, _)| *t)
            .collect();
        for token in expired {
            self.deadlines.remove(&token);
            out.push(IoEvent::Timeout { token });
        }

        Ok(out.len() - before)
    }
}
