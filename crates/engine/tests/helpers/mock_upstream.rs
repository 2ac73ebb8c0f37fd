#![allow(dead_code)]
use fanout_dns_domain::UpstreamProtocol;
use fanout_dns_engine::message;
use hickory_proto::op::{Message, MessageType};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

/// Programmable mock upstream DNS server.
///
/// The handler decides per request whether to reply (`Some`) or stay
/// silent (`None`, forcing the client into its send timeout). Transaction
/// id and question echo are filled in automatically so handlers only
/// build the interesting part of the reply.
pub struct MockUpstream {
    addr: SocketAddr,
    requests: Arc<AtomicU64>,
    replies: Arc<AtomicU64>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockUpstream {
    pub async fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    {
        let socket = UdpSocket::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = socket.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let requests = Arc::new(AtomicU64::new(0));
        let replies = Arc::new(AtomicU64::new(0));

        let requests_task = Arc::clone(&requests);
        let replies_task = Arc::clone(&replies);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    received = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = received else { break };
                        let Ok(request) = Message::from_vec(&buf[..len]) else { continue };
                        requests_task.fetch_add(1, Ordering::Relaxed);

                        if let Some(mut reply) = handler(&request) {
                            let mut header = *reply.header();
                            header.set_id(request.id());
                            header.set_message_type(MessageType::Response);
                            reply.set_header(header);
                            if reply.queries().is_empty() {
                                for query in request.queries() {
                                    reply.add_query(query.clone());
                                }
                            }
                            if let Ok(bytes) = message::serialize(&reply) {
                                replies_task.fetch_add(1, Ordering::Relaxed);
                                let _ = socket.send_to(&bytes, peer).await;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            addr,
            requests,
            replies,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn protocol(&self) -> UpstreamProtocol {
        UpstreamProtocol::Udp { addr: self.addr }
    }

    /// Queries received, whether or not they were answered.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Replies actually sent back.
    pub fn replies(&self) -> u64 {
        self.replies.load(Ordering::Relaxed)
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
