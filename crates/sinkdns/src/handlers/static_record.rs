// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-record handlers: answer every matching query with one configured
//! record owned by the query name.

use std::net::Ipv4Addr;

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, TXT};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

use crate::codec;
use crate::registry::Handler;
use crate::request::Request;

/// Answers with a single A record carrying a configured address.
pub struct StaticA {
    addr: Ipv4Addr,
    ttl: u32,
}

impl StaticA {
    /// A-record responder with the conventional one-hour TTL.
    pub fn new(addr: Ipv4Addr) -> Self {
        Self { addr, ttl: 3600 }
    }

    pub fn with_ttl(addr: Ipv4Addr, ttl: u32) -> Self {
        Self { addr, ttl }
    }
}

impl Handler for StaticA {
    fn handle(&self, request: &mut Request, qname: &Name, _qtype: RecordType, _qclass: DNSClass) {
        let mut response = codec::build_response(request.message(), ResponseCode::NoError);
        response.add_answer(Record::from_rdata(
            qname.clone(),
            self.ttl,
            RData::A(A::from(self.addr)),
        ));
        request.set_response(response);
    }
}

/// Answers with a single TXT record carrying a configured string.
///
/// The answer's class follows the question's, so the same handler serves
/// both IN data and CHAOS identification records.
pub struct StaticTxt {
    text: String,
    ttl: u32,
}

impl StaticTxt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ttl: 0,
        }
    }

    pub fn with_ttl(text: impl Into<String>, ttl: u32) -> Self {
        Self {
            text: text.into(),
            ttl,
        }
    }
}

impl Handler for StaticTxt {
    fn handle(&self, request: &mut Request, qname: &Name, _qtype: RecordType, qclass: DNSClass) {
        let mut response = codec::build_response(request.message(), ResponseCode::NoError);
        let mut record = Record::from_rdata(
            qname.clone(),
            self.ttl,
            RData::TXT(TXT::new(vec![self.text.clone()])),
        );
        record.set_dns_class(qclass);
        response.add_answer(record);
        request.set_response(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Transport;
    use hickory_proto::op::{Message, MessageType, OpCode, Query};

    fn request_for(qname: &str, rtype: RecordType, class: DNSClass) -> (Request, Name) {
        let name = Name::from_ascii(qname).expect("name");
        let mut query = Query::query(name.clone(), rtype);
        query.set_query_class(class);
        let mut message = Message::new();
        message
            .set_id(77)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query);
        message.add_query(query);
        (
            Request::new(
                "198.51.100.3:5353".parse().expect("addr"),
                Transport::Udp,
                message,
            ),
            name,
        )
    }

    #[test]
    fn test_static_a_answers_query_name() {
        let (mut request, qname) = request_for("foo.bar.", RecordType::A, DNSClass::IN);
        StaticA::new(Ipv4Addr::new(192, 168, 1, 1)).handle(
            &mut request,
            &qname,
            RecordType::A,
            DNSClass::IN,
        );

        let response = request.response().expect("response attached");
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert_eq!(response.answers().len(), 1);
        let answer = &response.answers()[0];
        assert_eq!(answer.name(), &qname);
        assert_eq!(answer.ttl(), 3600);
        assert_eq!(
            answer.data(),
            Some(&RData::A(A::new(192, 168, 1, 1)))
        );
    }

    #[test]
    fn test_static_txt_follows_question_class() {
        let (mut request, qname) =
            request_for("version.bind.", RecordType::TXT, DNSClass::CH);
        StaticTxt::new("sinkdns-0.3").handle(
            &mut request,
            &qname,
            RecordType::TXT,
            DNSClass::CH,
        );

        let response = request.response().expect("response attached");
        assert_eq!(response.answers().len(), 1);
        let answer = &response.answers()[0];
        assert_eq!(answer.dns_class(), DNSClass::CH);
        assert_eq!(answer.ttl(), 0);
        assert_eq!(
            answer.data(),
            Some(&RData::TXT(TXT::new(vec!["sinkdns-0.3".to_string()])))
        );
    }
}
