// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compile-time constants shared across the server engine.

use std::time::Duration;

/// Largest datagram the UDP driver will receive.
///
/// DNS over UDP is capped at 64 KiB by the 16-bit length arithmetic of the
/// protocol; the effective payload is usually far smaller.
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Size of the RFC 1035 4.2.2 TCP message length prefix.
pub const TCP_PREFIX_SIZE: usize = 2;

/// Idle deadline for TCP connections.
///
/// A connection that completes no read or write activity within this window
/// is torn down regardless of its state.
pub const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default listen backlog used by the TCP bind helpers.
pub const DEFAULT_TCP_BACKLOG: i32 = 10;

/// Maximum readiness events drained per poll iteration.
pub const MAX_POLL_EVENTS: usize = 128;
