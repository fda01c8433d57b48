//! Capturing transport
//!
//! Records every outgoing request synchronously, at the moment
//! `send_request` is called, and parks the response future until the
//! owner answers it with `handle_response`, `handle_error` or
//! `handle_disconnect`. Dropping the transport resolves every parked
//! request as disconnected.

use std::collections::HashMap;
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{oneshot, watch};

use super::codec::{decode, encode};
use super::errors::{TransportError, TransportResult};
use super::Transport;
use crate::cluster::NodeId;

/// A request recorded by `CapturingTransport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub request_id: u64,
    pub node: NodeId,
    pub action: String,
    pub payload: Vec<u8>,
}

impl CapturedRequest {
    /// Decode the payload as `T`
    pub fn decode<T: DeserializeOwned>(&self) -> TransportResult<T> {
        decode(&self.payload)
    }
}

type ResponseSender = oneshot::Sender<TransportResult<Vec<u8>>>;

#[derive(Default)]
struct Inner {
    next_request_id: u64,
    captured: Vec<CapturedRequest>,
    pending: HashMap<u64, (NodeId, ResponseSender)>,
}

/// Transport that records requests instead of sending them
pub struct CapturingTransport {
    inner: Mutex<Inner>,
    captured_count: watch::Sender<usize>,
}

impl Default for CapturingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturingTransport {
    pub fn new() -> Self {
        let (captured_count, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner::default()),
            captured_count,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Requests captured since the last clear
    pub fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.lock().captured.clone()
    }

    /// Take the captured requests, leaving the list empty.
    ///
    /// Requests stay pending until answered.
    pub fn captured_requests_and_clear(&self) -> Vec<CapturedRequest> {
        let taken = std::mem::take(&mut self.lock().captured);
        self.captured_count.send_replace(0);
        taken
    }

    /// Number of requests still waiting for an answer
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Wait until at least `count` requests have been captured since the
    /// last clear.
    pub async fn wait_for_requests(&self, count: usize) {
        let mut receiver = self.captured_count.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = receiver.wait_for(|captured| *captured >= count).await;
    }

    /// Answer a pending request. Returns false if it was not pending.
    pub fn handle_response<T: Serialize>(&self, request_id: u64, response: &T) -> TransportResult<bool> {
        let payload = encode(response)?;
        Ok(self.complete(request_id, Ok(payload)))
    }

    /// Fail a pending request with the given error
    pub fn handle_error(&self, request_id: u64, error: TransportError) -> bool {
        self.complete(request_id, Err(error))
    }

    /// Fail a pending request as if its node disconnected
    pub fn handle_disconnect(&self, request_id: u64) -> bool {
        let node = self.lock().pending.get(&request_id).map(|(node, _)| node.clone());
        match node {
            Some(node) => self.complete(request_id, Err(TransportError::Disconnected(node))),
            None => false,
        }
    }

    fn complete(&self, request_id: u64, outcome: TransportResult<Vec<u8>>) -> bool {
        let sender = self.lock().pending.remove(&request_id);
        match sender {
            // receiver may already be gone after a timeout
            Some((_, sender)) => {
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }
}

impl Transport for CapturingTransport {
    fn send_request(
        &self,
        node: &NodeId,
        action: &str,
        payload: Vec<u8>,
    ) -> BoxFuture<'static, TransportResult<Vec<u8>>> {
        let (sender, receiver) = oneshot::channel();
        let captured_len = {
            let mut inner = self.lock();
            let request_id = inner.next_request_id;
            inner.next_request_id += 1;
            inner.captured.push(CapturedRequest {
                request_id,
                node: node.clone(),
                action: action.to_string(),
                payload,
            });
            inner.pending.insert(request_id, (node.clone(), sender));
            inner.captured.len()
        };
        self.captured_count.send_replace(captured_len);

        let node = node.clone();
        async move {
            match receiver.await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Disconnected(node)),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_is_captured_before_polling() {
        let transport = CapturingTransport::new();
        let future = transport.send_request(&NodeId::new("n1"), "action", b"1".to_vec());

        let captured = transport.captured_requests();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].action, "action");
        assert_eq!(transport.pending_count(), 1);

        assert!(transport.handle_response(captured[0].request_id, &7u64).unwrap());
        let response: u64 = decode(&future.await.unwrap()).unwrap();
        assert_eq!(response, 7);
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_resolves_with_node() {
        let transport = CapturingTransport::new();
        let future = transport.send_request(&NodeId::new("n2"), "action", Vec::new());
        let id = transport.captured_requests_and_clear()[0].request_id;

        assert!(transport.captured_requests().is_empty());
        assert!(transport.handle_disconnect(id));
        assert!(!transport.handle_disconnect(id));
        assert_eq!(future.await, Err(TransportError::Disconnected(NodeId::new("n2"))));
    }

    #[tokio::test]
    async fn test_dropped_transport_disconnects() {
        let transport = CapturingTransport::new();
        let future = transport.send_request(&NodeId::new("n3"), "action", Vec::new());
        drop(transport);
        assert!(matches!(future.await, Err(TransportError::Disconnected(_))));
    }

    #[tokio::test]
    async fn test_wait_for_requests() {
        let transport = std::sync::Arc::new(CapturingTransport::new());
        let sender = std::sync::Arc::clone(&transport);
        let task = tokio::spawn(async move {
            let _a = sender.send_request(&NodeId::new("n"), "a", Vec::new());
            let _b = sender.send_request(&NodeId::new("n"), "b", Vec::new());
        });

        transport.wait_for_requests(2).await;
        task.await.unwrap();
        assert_eq!(transport.captured_requests().len(), 2);
    }
}
