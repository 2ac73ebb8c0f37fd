//! DNS message encoding and reply correlation.
//!
//! Every upstream send re-encodes the inbound request under a fresh random
//! transaction id; replies are accepted only when they parse, carry the
//! Response bit, match that id, and echo the question section. Anything
//! else is a protocol error, never a candidate for selection.

use fanout_dns_domain::FanoutError;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::str::FromStr;

/// Re-encode an inbound request for one upstream send.
///
/// Returns the fresh transaction id for reply correlation alongside the
/// wire bytes.
pub fn encode_query(request: &Message) -> Result<(u16, Vec<u8>), FanoutError> {
    let id = fastrand::u16(..);
    let mut outbound = request.clone();
    let mut header = *outbound.header();
    header.set_id(id);
    outbound.set_header(header);
    let bytes = serialize(&outbound)?;
    Ok((id, bytes))
}

/// Lightweight NS query against `domain`, used by the health prober.
pub fn build_probe_query(domain: &str) -> Result<(Message, Vec<u8>), FanoutError> {
    let name = Name::from_str(domain).map_err(|e| {
        FanoutError::InvalidMessage(format!("invalid probe domain '{}': {}", domain, e))
    })?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(RecordType::NS);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);

    let bytes = serialize(&message)?;
    Ok((message, bytes))
}

/// Serialize a message to wire format bytes.
pub fn serialize(message: &Message) -> Result<Vec<u8>, FanoutError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);

    message.emit(&mut encoder).map_err(|e| {
        FanoutError::InvalidMessage(format!("failed to serialize DNS message: {}", e))
    })?;

    Ok(buf)
}

/// Parse and correlate a raw upstream reply.
pub fn decode_reply(
    bytes: &[u8],
    expected_id: u16,
    request: &Message,
) -> Result<Message, FanoutError> {
    let reply = Message::from_vec(bytes)
        .map_err(|e| FanoutError::Protocol(format!("failed to parse DNS reply: {}", e)))?;

    if reply.message_type() != MessageType::Response {
        return Err(FanoutError::Protocol(
            "upstream sent a non-response message".to_string(),
        ));
    }

    if reply.id() != expected_id {
        return Err(FanoutError::Protocol(format!(
            "transaction id mismatch: sent {}, got {}",
            expected_id,
            reply.id()
        )));
    }

    if !queries_match(request, &reply) {
        return Err(FanoutError::Protocol(
            "reply question section does not echo the query".to_string(),
        ));
    }

    Ok(reply)
}

fn queries_match(request: &Message, reply: &Message) -> bool {
    match request.queries().first() {
        Some(sent) => reply.queries().first().is_some_and(|echoed| {
            echoed.name() == sent.name()
                && echoed.query_type() == sent.query_type()
                && echoed.query_class() == sent.query_class()
        }),
        // questionless requests (probes against broken middleboxes) accept
        // any echo
        None => true,
    }
}
