// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AS112 sink-zone handler.
//!
//! Serves the synthetic apex records of an AS112 anycast sink: SOA and NS
//! owned by whatever name was asked, NOERROR when the query type matches
//! one of them, NXDOMAIN with the SOA in the authority section otherwise.
//! Responses are authoritative.

use std::sync::LazyLock;

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{NS, SOA};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

use crate::codec;
use crate::registry::Handler;
use crate::request::Request;

const APEX_TTL: u32 = 300;

static SOA_MNAME: LazyLock<Name> =
    LazyLock::new(|| Name::from_ascii("a.as112.net.").expect("literal name"));
static SOA_RNAME: LazyLock<Name> =
    LazyLock::new(|| Name::from_ascii("hostmaster.root-servers.org.").expect("literal name"));
static NS_1: LazyLock<Name> =
    LazyLock::new(|| Name::from_ascii("b.as112.net.").expect("literal name"));
static NS_2: LazyLock<Name> =
    LazyLock::new(|| Name::from_ascii("c.as112.net.").expect("literal name"));

/// Sink-zone responder for the AS112 reverse zones.
pub struct As112;

impl As112 {
    fn soa(qname: &Name) -> Record {
        Record::from_rdata(
            qname.clone(),
            APEX_TTL,
            RData::SOA(SOA::new(
                SOA_MNAME.clone(),
                SOA_RNAME.clone(),
                2002040800,
                1800,
                900,
                604800,
                604800,
            )),
        )
    }
}

impl Handler for As112 {
    fn handle(&self, request: &mut Request, qname: &Name, qtype: RecordType, _qclass: DNSClass) {
        let mut response = codec::build_response(request.message(), ResponseCode::NoError);

        if qtype == RecordType::ANY || qtype == RecordType::SOA {
            response.add_answer(Self::soa(qname));
        }
        if qtype == RecordType::ANY || qtype == RecordType::NS {
            response.add_answer(Record::from_rdata(
                qname.clone(),
                APEX_TTL,
                RData::NS(NS(NS_1.clone())),
            ));
            response.add_answer(Record::from_rdata(
                qname.clone(),
                APEX_TTL,
                RData::NS(NS(NS_2.clone())),
            ));
        }

        if response.answers().is_empty() {
            // NODATA/NXDOMAIN: SOA moves to the authority section.
            response.set_response_code(ResponseCode::NXDomain);
            response.add_name_server(Self::soa(qname));
        }

        response.set_authoritative(true);
        request.set_response(response);
    }
}
