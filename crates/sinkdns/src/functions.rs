// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide named function table.
//!
//! Handler modules register their callables here under a string name at
//! initialization time; driver code looks them up by name when wiring the
//! server's handler chain. All registration must complete before the event
//! loop starts dispatching; the loop itself never writes the table, so
//! reads during dispatch see a stable view.

use std::sync::Arc;
use std::sync::LazyLock;

use parking_lot::RwLock;

use crate::registry::Handler;

static FUNCTIONS: LazyLock<RwLock<Vec<(String, Arc<dyn Handler>)>>> =
    LazyLock::new(|| RwLock::new(Vec::new()));

/// Register `handler` under `name`. Names are not deduplicated; lookup
/// returns the earliest registration.
pub fn add_function(name: &str, handler: Arc<dyn Handler>) {
    FUNCTIONS.write().push((name.to_string(), handler));
}

/// Look up a handler by name. Returns the first match.
pub fn get_function(name: &str) -> Option<Arc<dyn Handler>> {
    FUNCTIONS
        .read()
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, h)| Arc::clone(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use hickory_proto::rr::{DNSClass, Name, RecordType};

    fn noop() -> Arc<dyn Handler> {
        Arc::new(
            |_req: &mut Request, _qname: &Name, _qtype: RecordType, _qclass: DNSClass| {},
        )
    }

    #[test]
    fn test_lookup_missing_returns_none() {
        assert!(get_function("functions-test-no-such-name").is_none());
    }

    #[test]
    fn test_add_then_lookup() {
        add_function("functions-test-present", noop());
        assert!(get_function("functions-test-present").is_some());
    }

    #[test]
    fn test_first_registration_wins() {
        let first = noop();
        let second = noop();
        add_function("functions-test-dup", Arc::clone(&first));
        add_function("functions-test-dup", second);

        let looked_up = get_function("functions-test-dup").expect("registered");
        assert!(Arc::ptr_eq(&looked_up, &first));
    }
}
