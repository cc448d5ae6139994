// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fault-injection handler that corrupts an already-built response.
//!
//! Register this *behind* a producer. It never terminates the chain by
//! itself: it only acts once some earlier handler has attached a response,
//! which it serializes (if needed) and damages in place. Useful for
//! testing resolver behavior against corrupt authoritative data.

use hickory_proto::rr::{DNSClass, Name, RecordType};
use log::warn;
use parking_lot::Mutex;

use crate::codec;
use crate::registry::Handler;
use crate::request::Request;

/// Flips a configured number of random bits in the serialized response.
///
/// Uses a small deterministic PRNG seeded at construction, so test runs
/// are reproducible.
pub struct BitFlip {
    bits: u32,
    state: Mutex<u64>,
}

impl BitFlip {
    /// Flip `bits` random bits per response (at least one).
    pub fn new(bits: u32, seed: u64) -> Self {
        Self {
            bits: bits.max(1),
            // xorshift must not start at zero.
            state: Mutex::new(seed | 1),
        }
    }

    fn next(&self) -> u64 {
        let mut state = self.state.lock();
        let mut x = *state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        *state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }
}

impl Handler for BitFlip {
    fn handle(&self, request: &mut Request, _qname: &Name, _qtype: RecordType, _qclass: DNSClass) {
        // Nothing to mangle yet.
        if !request.has_response() {
            return;
        }

        if request.wire_response().is_none() {
            let Some(response) = request.response() else {
                return;
            };
            match codec::serialize(response) {
                Ok(wire) => request.set_wire_response(wire),
                Err(e) => {
                    warn!("[bitflip] cannot serialize response to mangle it: {e}");
                    return;
                }
            }
        }

        let Some(wire) = request.wire_response_mut() else {
            return;
        };
        if wire.is_empty() {
            return;
        }

        for _ in 0..self.bits {
            let r = self.next();
            let offset = (r >> 8) as usize % wire.len();
            wire[offset] ^= 1 << (r & 7);
        }
    }
}
