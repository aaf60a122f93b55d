//! Cancellable request future.
//!
//! # Design
//! A `CancellableRequest` pairs the boxed request pipeline with a
//! `CancelHandle`. The handle owns the settlement state
//! (`Pending → Fulfilled | Rejected | Cancelled`) and the cancellation token
//! the pipeline listens to. Whichever side moves the state out of `Pending`
//! first wins; every later transition is ignored, so a response that arrives
//! after `cancel()` resolves to `ClientError::Aborted` and a `cancel()` after
//! settlement does nothing.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::debug;

use crate::error::ClientError;

const PENDING: u8 = 0;
const FULFILLED: u8 = 1;
const REJECTED: u8 = 2;
const CANCELLED: u8 = 3;

type BoxedOperation<T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send>>;

/// Settlement state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Fulfilled,
    Rejected,
    Cancelled,
}

/// Cancels the request it was taken from. Cheap to clone and `Send`, so it
/// can be moved into another task while the request is being awaited.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    state: Arc<AtomicU8>,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    /// Abort the request if it has not settled yet; otherwise a no-op.
    pub fn cancel(&self) {
        if self.transition(CANCELLED) {
            debug!("request cancelled");
            self.token.cancel();
        }
    }

    pub fn state(&self) -> RequestState {
        match self.state.load(Ordering::Acquire) {
            PENDING => RequestState::Pending,
            FULFILLED => RequestState::Fulfilled,
            REJECTED => RequestState::Rejected,
            _ => RequestState::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == RequestState::Cancelled
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A future for one in-flight call that can be cancelled until it settles.
///
/// Resolves to the call's outcome, or to `ClientError::Aborted` once
/// cancelled. The operation does not start until the future is first polled.
#[must_use = "requests do nothing unless awaited"]
pub struct CancellableRequest<T> {
    operation: BoxedOperation<T>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    handle: CancelHandle,
}

impl<T> CancellableRequest<T> {
    /// Wrap an operation. The closure receives the token the operation must
    /// observe at each of its suspension points.
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let handle = CancelHandle::new();
        let operation = Box::pin(operation(handle.token.clone()));
        let cancelled = Box::pin(handle.token.clone().cancelled_owned());
        Self {
            operation,
            cancelled,
            handle,
        }
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> RequestState {
        self.handle.state()
    }

    /// Transform the successful value. Cancellation state is shared with
    /// the returned request.
    pub fn map<U, F>(self, f: F) -> CancellableRequest<U>
    where
        T: Send + 'static,
        U: 'static,
        F: FnOnce(T) -> Result<U, ClientError> + Send + 'static,
    {
        let operation = self.operation;
        CancellableRequest {
            operation: Box::pin(async move { operation.await.and_then(f) }),
            cancelled: self.cancelled,
            handle: self.handle,
        }
    }
}

impl<T> Future for CancellableRequest<T> {
    type Output = Result<T, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Registers the waker so `cancel()` wakes us even if the operation
        // never looks at its token.
        if self.cancelled.as_mut().poll(cx).is_ready() || self.handle.is_cancelled() {
            return Poll::Ready(Err(ClientError::Aborted));
        }

        let outcome = ready!(self.operation.as_mut().poll(cx));
        let settled = if outcome.is_ok() { FULFILLED } else { REJECTED };
        if self.handle.transition(settled) {
            Poll::Ready(outcome)
        } else {
            Poll::Ready(Err(ClientError::Aborted))
        }
    }
}
