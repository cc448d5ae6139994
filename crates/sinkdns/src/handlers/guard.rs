// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Guard handlers meant to run ahead of producers in the chain.

use hickory_proto::op::{OpCode, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RecordType};

use crate::codec;
use crate::registry::Handler;
use crate::request::Request;

/// Rejects anything that is not an ordinary single-question query:
/// OPCODE ≠ QUERY yields NOTIMPL, QDCOUNT ≠ 1 yields FORMERR.
///
/// Register this ahead of producers with match-all filters; attaching a
/// rejection response short-circuits the rest of the chain.
pub struct QueryOnly;

impl Handler for QueryOnly {
    fn handle(&self, request: &mut Request, _qname: &Name, _qtype: RecordType, _qclass: DNSClass) {
        if request.message().op_code() != OpCode::Query {
            let response = codec::build_response(request.message(), ResponseCode::NotImp);
            request.set_response(response);
        }
        if request.message().queries().len() != 1 {
            let response = codec::build_response(request.message(), ResponseCode::FormErr);
            request.set_response(response);
        }
    }
}

/// Answers everything with NXDOMAIN. Useful as a terminal catch-all behind
/// more specific handlers.
pub struct Nxdomain;

impl Handler for Nxdomain {
    fn handle(&self, request: &mut Request, _qname: &Name, _qtype: RecordType, _qclass: DNSClass) {
        let response = codec::build_response(request.message(), ResponseCode::NXDomain);
        request.set_response(response);
    }
}
