//! Pending Call Queue
//!
//! While remote configuration is loading, the adapter does not know its final
//! metadata root or debug mode, so nothing is sent. Calls and managed
//! requests are parked here in issuance order, each with the sender half of a
//! oneshot channel. The caller awaits the receiver; the adapter replays the
//! queue front to back once the configuration arrives and completes every
//! channel exactly once.

use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::oneshot;

use crate::config::AdapterConfig;
use crate::error::AdapterResult;
use crate::request::{CallRequest, ManagedRequest};
use crate::transport::TransportResponse;

/// A parked request and where its result goes
#[derive(Debug)]
pub enum PendingKind {
    Program {
        request: CallRequest,
        reply: oneshot::Sender<AdapterResult<Value>>,
    },
    Managed {
        request: ManagedRequest,
        reply: oneshot::Sender<AdapterResult<TransportResponse>>,
    },
}

#[derive(Debug)]
pub struct PendingCall {
    /// Issuance order, starting at 0 for the adapter's lifetime
    pub position: u64,
    pub kind: PendingKind,
}

impl PendingCall {
    /// Bring the parked parameters up to date with `config`.
    pub fn repatch(&mut self, config: &AdapterConfig) {
        match &mut self.kind {
            PendingKind::Program { request, .. } => request.repatch(config),
            PendingKind::Managed { request, .. } => request.repatch(config),
        }
    }

    /// The caller stopped waiting, so there is nobody to deliver a result to.
    pub fn is_abandoned(&self) -> bool {
        match &self.kind {
            PendingKind::Program { reply, .. } => reply.is_closed(),
            PendingKind::Managed { reply, .. } => reply.is_closed(),
        }
    }

    /// Complete the call with an error without sending anything.
    pub fn fail(self, error: crate::error::AdapterError) {
        // A dropped receiver means the caller stopped waiting
        match self.kind {
            PendingKind::Program { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            PendingKind::Managed { reply, .. } => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

/// FIFO of calls issued while configuration is outstanding
#[derive(Debug, Default)]
pub struct PendingCallQueue {
    calls: VecDeque<PendingCall>,
    next_position: u64,
}

impl PendingCallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_program(&mut self, request: CallRequest) -> oneshot::Receiver<AdapterResult<Value>> {
        let (reply, rx) = oneshot::channel();
        self.push(PendingKind::Program { request, reply });
        rx
    }

    pub fn push_managed(
        &mut self,
        request: ManagedRequest,
    ) -> oneshot::Receiver<AdapterResult<TransportResponse>> {
        let (reply, rx) = oneshot::channel();
        self.push(PendingKind::Managed { request, reply });
        rx
    }

    fn push(&mut self, kind: PendingKind) {
        let position = self.next_position;
        self.next_position += 1;
        tracing::debug!(position, queued = self.calls.len() + 1, "call_queued");
        self.calls.push_back(PendingCall { position, kind });
    }

    pub fn pop_front(&mut self) -> Option<PendingCall> {
        self.calls.pop_front()
    }

    /// Take every parked call, oldest first
    pub fn drain(&mut self) -> Vec<PendingCall> {
        self.calls.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use crate::request::RequestBuilder;
    use crate::transport::Method;

    fn request(program: &str) -> CallRequest {
        RequestBuilder::build(program, &[], &AdapterConfig::default()).unwrap()
    }

    #[test]
    fn test_fifo_positions() {
        let mut queue = PendingCallQueue::new();
        let _a = queue.push_program(request("/a"));
        let _b = queue.push_managed(ManagedRequest::new(Method::Get, "/x", vec![]));
        let _c = queue.push_program(request("/c"));
        assert_eq!(queue.len(), 3);

        let positions: Vec<u64> = std::iter::from_fn(|| queue.pop_front())
            .map(|c| c.position)
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_repatch_program() {
        let mut queue = PendingCallQueue::new();
        let _rx = queue.push_program(request("/a"));
        let mut call = queue.pop_front().unwrap();
        call.repatch(&AdapterConfig {
            metadata_root: "/Root".to_string(),
            debug: true,
            ..AdapterConfig::default()
        });
        match call.kind {
            PendingKind::Program { request, .. } => {
                assert_eq!(request.program, "/Root/a");
                assert_eq!(request.debug, 131);
            }
            PendingKind::Managed { .. } => panic!("expected program call"),
        }
    }

    #[test]
    fn test_dropped_receiver_marks_abandoned() {
        let mut queue = PendingCallQueue::new();
        let rx = queue.push_program(request("/a"));
        let _kept = queue.push_program(request("/b"));
        drop(rx);
        assert!(queue.pop_front().unwrap().is_abandoned());
        assert!(!queue.pop_front().unwrap().is_abandoned());
    }

    #[tokio::test]
    async fn test_fail_completes_receiver() {
        let mut queue = PendingCallQueue::new();
        let rx = queue.push_program(request("/a"));
        for call in queue.drain() {
            call.fail(AdapterError::RemoteConfig("boom".to_string()));
        }
        let result = rx.await.unwrap();
        assert!(matches!(result, Err(AdapterError::RemoteConfig(_))));
    }
}
