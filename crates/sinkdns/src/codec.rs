// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Glue over the external DNS message codec.
//!
//! All wire-format knowledge lives in `hickory-proto`; this module only
//! narrows its API to the handful of operations the engine needs: parsing,
//! serialization, canonical (lowercase) names, wildcard matching, and the
//! standard response skeleton handlers build on.

use hickory_proto::error::ProtoError;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::Name;

/// Parse a wire-format DNS message.
pub fn parse(buf: &[u8]) -> Result<Message, ProtoError> {
    Message::from_vec(buf)
}

/// Serialize a DNS message to wire format. Section counts in the emitted
/// header are derived from the sections themselves.
pub fn serialize(message: &Message) -> Result<Vec<u8>, ProtoError> {
    message.to_vec()
}

/// Lowercase a name label-by-label.
pub fn canonical_name(name: &Name) -> Name {
    name.to_lowercase()
}

/// Parse a handler registration pattern (e.g. `"*"`, `"*.example.com"`,
/// `"version.bind"`) into its canonical form. Done once at registration.
pub fn canonical_pattern(pattern: &str) -> Result<Name, ProtoError> {
    Ok(Name::from_ascii(pattern)?.to_lowercase())
}

/// Match `qname` against a registration pattern.
///
/// A pattern whose leftmost label is `*` matches any name strictly below the
/// pattern's parent, so the bare pattern `*` matches every non-root name.
/// Patterns without a wildcard compare for case-insensitive equality.
pub fn wildcard_match(pattern: &Name, qname: &Name) -> bool {
    if pattern.is_wildcard() {
        let parent = pattern.base_name();
        parent.zone_of(qname) && *qname != parent
    } else {
        pattern == qname
    }
}

/// Build the standard response skeleton for `request`.
///
/// The ID, CD, and RD fields are copied from the request, QR is set, the
/// opcode is forced to QUERY, and the question section is cloned. All other
/// sections start empty.
pub fn build_response(request: &Message, rcode: ResponseCode) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(request.recursion_desired())
        .set_checking_disabled(request.checking_disabled())
        .set_response_code(rcode);
    for query in request.queries() {
        response.add_query(query.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::Query;
    use hickory_proto::rr::RecordType;

    fn name(s: &str) -> Name {
        Name::from_ascii(s).expect("valid name")
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let pattern = canonical_pattern("Version.Bind").expect("pattern");
        assert!(wildcard_match(&pattern, &name("version.bind")));
        assert!(wildcard_match(&pattern, &name("VERSION.BIND")));
        assert!(!wildcard_match(&pattern, &name("author.bind")));
    }

    #[test]
    fn test_bare_star_matches_everything_but_root() {
        let pattern = canonical_pattern("*").expect("pattern");
        assert!(wildcard_match(&pattern, &name("foo.bar.")));
        assert!(wildcard_match(&pattern, &name("x.")));
        assert!(wildcard_match(&pattern, &name("a.b.c.example.com.")));
        assert!(!wildcard_match(&pattern, &Name::root()));
    }

    #[test]
    fn test_scoped_wildcard() {
        let pattern = canonical_pattern("*.example.com.").expect("pattern");
        assert!(wildcard_match(&pattern, &name("www.example.com.")));
        assert!(wildcard_match(&pattern, &name("a.b.example.com.")));
        assert!(wildcard_match(&pattern, &name("WWW.EXAMPLE.COM.")));
        // The parent itself is not below the wildcard.
        assert!(!wildcard_match(&pattern, &name("example.com.")));
        assert!(!wildcard_match(&pattern, &name("example.org.")));
    }

    #[test]
    fn test_build_response_copies_header_bits() {
        let mut request = Message::new();
        request
            .set_id(0x1234)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .set_checking_disabled(true);
        request.add_query(Query::query(name("example.com."), RecordType::A));

        let response = build_response(&request, ResponseCode::Refused);

        assert_eq!(response.id(), 0x1234);
        assert_eq!(response.message_type(), MessageType::Response);
        assert_eq!(response.op_code(), OpCode::Query);
        assert_eq!(response.response_code(), ResponseCode::Refused);
        assert!(response.recursion_desired());
        assert!(response.checking_disabled());
        assert_eq!(response.queries().len(), 1);
        assert_eq!(response.queries()[0].name(), &name("example.com."));
        assert!(response.answers().is_empty());
        assert!(response.name_servers().is_empty());
        assert!(response.additionals().is_empty());
    }

    #[test]
    fn test_refused_response_roundtrip() {
        let mut request = Message::new();
        request
            .set_id(0xbeef)
            .set_message_type(MessageType::Query)
            .set_recursion_desired(true);
        request.add_query(Query::query(name("example.com."), RecordType::A));

        let response = build_response(&request, ResponseCode::Refused);
        let wire = serialize(&response).expect("serialize");
        let decoded = parse(&wire).expect("parse");

        assert_eq!(decoded.id(), response.id());
        assert_eq!(decoded.message_type(), MessageType::Response);
        assert_eq!(decoded.op_code(), OpCode::Query);
        assert_eq!(decoded.response_code(), ResponseCode::Refused);
        assert_eq!(decoded.recursion_desired(), response.recursion_desired());
        assert_eq!(decoded.queries().len(), 1);
        assert_eq!(decoded.answers().len(), 0);
    }

    #[test]
    fn test_canonical_name_lowercases() {
        assert_eq!(
            canonical_name(&name("FoO.BaR.")),
            name("foo.bar.")
        );
    }
}
