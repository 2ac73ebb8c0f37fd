#![allow(dead_code)]
pub mod mock_upstream;

use async_trait::async_trait;
use fanout_dns_engine::{DnsHandler, ResponseWriter};
use fanout_dns_domain::FanoutError;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Build an A-record question the way a resolver client would.
pub fn question(name: &str) -> Message {
    let mut query = Query::new();
    query.set_name(Name::from_str(name).unwrap());
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(0x1234, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);
    message
}

/// Success reply carrying a single A record for `name`.
pub fn success_reply(name: &str, ip: Ipv4Addr) -> Message {
    let mut reply = Message::new(0, MessageType::Response, OpCode::Query);
    reply.set_response_code(ResponseCode::NoError);
    reply.add_answer(Record::from_rdata(
        Name::from_str(name).unwrap(),
        3600,
        RData::A(A(ip)),
    ));
    reply
}

/// Answerless reply with the given non-success rcode.
pub fn negative_reply(rcode: ResponseCode) -> Message {
    let mut reply = Message::new(0, MessageType::Response, OpCode::Query);
    reply.set_response_code(rcode);
    reply
}

/// First question name of a request, for handler matching.
pub fn question_name(request: &Message) -> String {
    request
        .queries()
        .first()
        .map(|q| q.name().to_utf8())
        .unwrap_or_default()
}

/// Writer that records every message the dispatcher emits.
#[derive(Default)]
pub struct CachingWriter {
    answers: Mutex<Vec<Message>>,
}

impl CachingWriter {
    pub fn answers(&self) -> Vec<Message> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseWriter for CachingWriter {
    async fn write_msg(&self, response: &Message) -> Result<(), FanoutError> {
        self.answers.lock().unwrap().push(response.clone());
        Ok(())
    }
}

/// Writer that always fails, for error-propagation tests.
pub struct FailingWriter;

#[async_trait]
impl ResponseWriter for FailingWriter {
    async fn write_msg(&self, _response: &Message) -> Result<(), FanoutError> {
        Err(FanoutError::Io("sink closed".to_string()))
    }
}

/// Chain terminator standing in for the next plugin: counts hits and
/// answers everything with success.
#[derive(Default)]
pub struct NextHandlerStub {
    hits: AtomicU64,
}

impl NextHandlerStub {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DnsHandler for NextHandlerStub {
    async fn serve(
        &self,
        _cancel: &CancellationToken,
        writer: &dyn ResponseWriter,
        request: &Message,
    ) -> Result<ResponseCode, FanoutError> {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let mut reply = negative_reply(ResponseCode::NoError);
        let mut header = *reply.header();
        header.set_id(request.id());
        reply.set_header(header);
        writer.write_msg(&reply).await?;
        Ok(ResponseCode::NoError)
    }
}
