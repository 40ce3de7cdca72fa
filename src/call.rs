//! The per-exchange token passed from the transport into the dispatcher.

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::warn;

use crate::http::request::Request;
use crate::http::response::Response;

pub type Completion = Box<dyn FnOnce(Response) + Send + 'static>;

/// One in-flight request/response exchange.
///
/// The completion callback fires exactly once: [`CallInfo::complete`] consumes
/// the token, and a token dropped without completing fires a 500 instead so
/// the transport never waits on a lost exchange.
pub struct CallInfo {
    request: Arc<Request>,
    on_complete: Option<Completion>,
}

impl CallInfo {
    pub fn new<F>(request: Arc<Request>, on_complete: F) -> Self
    where
        F: FnOnce(Response) + Send + 'static,
    {
        Self {
            request,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    /// A call whose completion is delivered on the returned receiver.
    pub fn channel(request: Arc<Request>) -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let call = Self::new(request, move |response| {
            // The transport may have gone away (client disconnect); nothing to do then.
            let _ = tx.send(response);
        });
        (call, rx)
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Hands `response` back to the transport.
    pub fn complete(mut self, response: Response) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(response);
        }
    }
}

impl Drop for CallInfo {
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            warn!(
                method = %self.request.method,
                uri = %self.request.uri,
                "Call dropped before completion"
            );
            on_complete(Response::internal_error("request dropped before completion"));
        }
    }
}

impl fmt::Debug for CallInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallInfo")
            .field("method", &self.request.method)
            .field("uri", &self.request.uri)
            .field("completed", &self.on_complete.is_none())
            .finish()
    }
}
