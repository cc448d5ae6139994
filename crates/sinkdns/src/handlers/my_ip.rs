// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client-introspection handler: answers with the address the query came
//! from.

use std::net::SocketAddr;

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, AAAA, TXT};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

use crate::codec;
use crate::registry::Handler;
use crate::request::Request;

/// Tells the client what address it asked from.
///
/// - `TXT` (IN or CH class) answers carry the printable peer address.
/// - `A` (IN) answers carry the peer address when the query arrived over
///   IPv4; `AAAA` (IN) likewise for IPv6.
/// - `ANY` queries collect every applicable record.
///
/// Records use TTL 0: the answer is specific to the asking socket and must
/// not be cached.
pub struct MyIp;

impl Handler for MyIp {
    fn handle(&self, request: &mut Request, qname: &Name, qtype: RecordType, qclass: DNSClass) {
        let peer = request.peer();
        let mut response = codec::build_response(request.message(), ResponseCode::NoError);

        if (qclass == DNSClass::IN || qclass == DNSClass::CH)
            && (qtype == RecordType::TXT || qtype == RecordType::ANY)
        {
            let mut record = Record::from_rdata(
                qname.clone(),
                0,
                RData::TXT(TXT::new(vec![peer.ip().to_string()])),
            );
            record.set_dns_class(qclass);
            response.add_answer(record);
        }

        if qclass == DNSClass::IN && (qtype == RecordType::A || qtype == RecordType::ANY) {
            if let SocketAddr::V4(v4) = peer {
                response.add_answer(Record::from_rdata(
                    qname.clone(),
                    0,
                    RData::A(A::from(*v4.ip())),
                ));
            }
        }

        if qclass == DNSClass::IN && (qtype == RecordType::AAAA || qtype == RecordType::ANY) {
            if let SocketAddr::V6(v6) = peer {
                response.add_answer(Record::from_rdata(
                    qname.clone(),
                    0,
                    RData::AAAA(AAAA::from(*v6.ip())),
                ));
            }
        }

        request.set_response(response);
    }
}
