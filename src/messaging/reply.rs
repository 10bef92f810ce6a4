use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::error::{DetectionError, DetectionResult};

/// Observable state of an outstanding request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Pending,
    Resolved(T),
    Rejected(DetectionError),
}

/// Answering half of a request. Answering a requester that already went away is silent.
pub struct Responder<T> {
    tx: oneshot::Sender<DetectionResult<T>>,
}

impl<T> Responder<T> {
    pub fn resolve(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }

    pub fn reject(self, error: DetectionError) {
        let _ = self.tx.send(Err(error));
    }

    pub fn settle(self, result: DetectionResult<T>) {
        let _ = self.tx.send(result);
    }
}

/// Waiting half of a request. Every command in the crate answers through one of these.
pub struct PendingReply<T> {
    rx: Option<oneshot::Receiver<DetectionResult<T>>>,
    dropped_error: DetectionError,
}

impl<T> PendingReply<T> {
    pub fn channel() -> (Responder<T>, PendingReply<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Responder { tx },
            PendingReply {
                rx: Some(rx),
                dropped_error: DetectionError::NoResponse,
            },
        )
    }

    pub fn rejected(error: DetectionError) -> Self {
        let (responder, reply) = Self::channel();
        responder.reject(error);
        reply
    }

    /// Error reported if the responder is dropped without answering.
    pub fn on_dropped(mut self, error: DetectionError) -> Self {
        self.dropped_error = error;
        self
    }

    /// Non-blocking check. A settled reply is handed out once; later polls see `Rejected(NoResponse)`.
    pub fn poll_reply(&mut self) -> Reply<T> {
        let Some(rx) = self.rx.as_mut() else {
            return Reply::Rejected(DetectionError::NoResponse);
        };
        match rx.try_recv() {
            Err(TryRecvError::Empty) => Reply::Pending,
            Err(TryRecvError::Closed) => {
                self.rx = None;
                Reply::Rejected(self.dropped_error.clone())
            }
            Ok(result) => {
                self.rx = None;
                match result {
                    Ok(value) => Reply::Resolved(value),
                    Err(err) => Reply::Rejected(err),
                }
            }
        }
    }

    pub async fn settle(self) -> DetectionResult<T> {
        let Some(rx) = self.rx else {
            return Err(DetectionError::NoResponse);
        };
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(self.dropped_error),
        }
    }
}
