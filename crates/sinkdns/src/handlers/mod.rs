// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sample handlers.
//!
//! Small, composable handlers covering the classic responder patterns:
//! fixed records, client introspection, AS112 sink zones, CHAOS-class
//! identification, opcode guards, and fault injection. They double as
//! worked examples of the [`Handler`](crate::registry::Handler) contract.
//!
//! Handlers that need per-site configuration (a fixed address, a TXT
//! string) take it through their constructors; the stateless ones are also
//! entered into the named function table by [`register_builtins`] so driver
//! code can look them up by name.

mod as112;
mod bit_flip;
mod guard;
mod my_ip;
mod static_record;

pub use as112::As112;
pub use bit_flip::BitFlip;
pub use guard::{Nxdomain, QueryOnly};
pub use my_ip::MyIp;
pub use static_record::{StaticA, StaticTxt};

use std::sync::{Arc, Once};

use hickory_proto::error::ProtoError;
use hickory_proto::rr::{DNSClass, RecordType};

use crate::functions;
use crate::server::Server;

static BUILTINS: Once = Once::new();

/// Enter the configuration-free sample handlers into the named function
/// table. Call before the event loop starts; repeated calls are no-ops.
pub fn register_builtins() {
    BUILTINS.call_once(|| {
        functions::add_function("query_only", Arc::new(QueryOnly));
        functions::add_function("myip", Arc::new(MyIp));
        functions::add_function("as112", Arc::new(As112));
        functions::add_function("nxdomain", Arc::new(Nxdomain));
    });
}

/// Register CHAOS-class TXT identification records (`version.bind`,
/// `author.bind`) on `server`.
pub fn register_identification(
    server: &Server,
    version: &str,
    author: &str,
) -> Result<(), ProtoError> {
    server.register_handler(
        Some("version.bind"),
        DNSClass::CH,
        RecordType::TXT,
        Arc::new(StaticTxt::new(version)),
    )?;
    server.register_handler(
        Some("author.bind"),
        DNSClass::CH,
        RecordType::TXT,
        Arc::new(StaticTxt::new(author)),
    )?;
    Ok(())
}
