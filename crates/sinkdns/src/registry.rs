// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ordered handler registry.
//!
//! Handlers are matched on (class filter, type filter, optional qname
//! pattern) in registration order. Registration order is load-bearing:
//! earlier entries can act as guards that attach an error response and
//! thereby short-circuit later producers.

use std::sync::Arc;

use hickory_proto::error::ProtoError;
use hickory_proto::rr::{DNSClass, Name, RecordType};
use parking_lot::RwLock;

use crate::codec;
use crate::request::Request;

/// A registered query handler.
///
/// Implementations carry their own state (the idiomatic replacement for an
/// opaque `user_data` pointer). Plain closures with the right signature
/// implement this trait automatically.
///
/// A handler responds by mutating the request: [`Request::set_response`] or
/// [`Request::set_wire_response`]. Dispatch stops at the first handler that
/// leaves either attached, so a guard that sets a tentative error response
/// prevents every later entry from running. Returning without attaching
/// anything passes the query on to the next matching entry.
pub trait Handler: Send + Sync {
    /// Process one query. `qname` is the canonical (lowercased) name of the
    /// first question; `qtype` and `qclass` are taken from the same record.
    fn handle(&self, request: &mut Request, qname: &Name, qtype: RecordType, qclass: DNSClass);
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &Name, RecordType, DNSClass) + Send + Sync,
{
    fn handle(&self, request: &mut Request, qname: &Name, qtype: RecordType, qclass: DNSClass) {
        self(request, qname, qtype, qclass)
    }
}

/// One registry entry: filters plus the handler they guard.
#[derive(Clone)]
pub struct HandlerEntry {
    pattern: Option<Name>,
    class: DNSClass,
    rtype: RecordType,
    handler: Arc<dyn Handler>,
}

impl HandlerEntry {
    /// Whether this entry is eligible for a query with the given
    /// (canonical) name, type, and class.
    pub fn matches(&self, qname: &Name, qtype: RecordType, qclass: DNSClass) -> bool {
        if self.class != DNSClass::ANY && self.class != qclass {
            return false;
        }
        if self.rtype != RecordType::ANY && self.rtype != qtype {
            return false;
        }
        match &self.pattern {
            Some(pattern) => codec::wildcard_match(pattern, qname),
            None => true,
        }
    }

    /// The handler callable.
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

/// Append-only ordered list of handler entries.
///
/// Reads take a snapshot, so a handler that registers further handlers
/// while dispatch is running does not affect the walk in progress; the new
/// entries become visible on the next request.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: RwLock<Vec<HandlerEntry>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler entry.
    ///
    /// `pattern`, when given, is parsed and canonicalized once here.
    /// `DNSClass::ANY` and `RecordType::ANY` act as match-all filters.
    pub fn add(
        &self,
        pattern: Option<&str>,
        class: DNSClass,
        rtype: RecordType,
        handler: Arc<dyn Handler>,
    ) -> Result<(), ProtoError> {
        let pattern = match pattern {
            Some(p) => Some(codec::canonical_pattern(p)?),
            None => None,
        };
        self.entries.write().push(HandlerEntry {
            pattern,
            class,
            rtype,
            handler,
        });
        Ok(())
    }

    /// Snapshot of the entries in registration order.
    pub fn snapshot(&self) -> Vec<HandlerEntry> {
        self.entries.read().clone()
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
