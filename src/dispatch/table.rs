use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::error::RegistrationError;
use crate::http::request::Request;
use crate::http::response::Response;

pub type SyncHandler = Arc<dyn Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync>;

/// Builds the handler future on the scheduler thread, so the future itself
/// does not need to be `Send`.
pub type SuspendableHandler = Arc<
    dyn Fn(Arc<Request>, Response) -> LocalBoxFuture<'static, anyhow::Result<Response>>
        + Send
        + Sync,
>;

/// A handler as supplied at registration time.
#[derive(Clone)]
pub enum Handler {
    Sync(SyncHandler),
    Suspendable(SuspendableHandler),
}

impl Handler {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Handler::Sync(Arc::new(f))
    }

    /// A handler that may suspend. It owns the response and returns it when done.
    pub fn suspendable<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Request>, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + 'static,
    {
        Handler::Suspendable(Arc::new(move |req: Arc<Request>, resp: Response| {
            f(req, resp).boxed_local()
        }))
    }

    pub fn is_suspendable(&self) -> bool {
        matches!(self, Handler::Suspendable(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Sync(_) => f.write_str("Handler::Sync"),
            Handler::Suspendable(_) => f.write_str("Handler::Suspendable"),
        }
    }
}

/// How a target runs. Blocking + suspendable has no variant.
#[derive(Clone)]
pub enum Strategy {
    /// Inline on the thread that called `dispatch`.
    Blocking(SyncHandler),
    /// On a freshly spawned thread.
    Background(SyncHandler),
    /// As a task on the shared cooperative scheduler.
    Cooperative(SuspendableHandler),
}

#[derive(Clone)]
pub struct DispatchTarget {
    strategy: Strategy,
}

impl DispatchTarget {
    pub fn new(handler: Handler, blocking: bool) -> Result<Self, RegistrationError> {
        let strategy = match (handler, blocking) {
            (Handler::Sync(h), true) => Strategy::Blocking(h),
            (Handler::Sync(h), false) => Strategy::Background(h),
            (Handler::Suspendable(h), false) => Strategy::Cooperative(h),
            (Handler::Suspendable(_), true) => return Err(RegistrationError::BlockingSuspendable),
        };
        Ok(Self { strategy })
    }

    pub fn not_found() -> Self {
        Self {
            strategy: Strategy::Blocking(Arc::new(|_: &Request, resp: &mut Response| {
                *resp = Response::not_found();
                Ok(())
            })),
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self.strategy, Strategy::Blocking(_))
    }

    pub fn strategy_name(&self) -> &'static str {
        match self.strategy {
            Strategy::Blocking(_) => "blocking",
            Strategy::Background(_) => "background",
            Strategy::Cooperative(_) => "cooperative",
        }
    }
}

impl fmt::Debug for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTarget")
            .field("strategy", &self.strategy_name())
            .finish()
    }
}

/// Endpoint id to target, indexed directly by id.
///
/// Written only during registration, before the server starts serving, so
/// lookups take no lock.
#[derive(Debug, Default, Clone)]
pub struct DispatchTable {
    targets: Vec<Option<DispatchTarget>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: usize, target: DispatchTarget) {
        if id >= self.targets.len() {
            self.targets.resize(id + 1, None);
        }
        self.targets[id] = Some(target);
    }

    /// `None` for negative or unknown ids.
    pub fn get(&self, id: isize) -> Option<&DispatchTarget> {
        let index = usize::try_from(id).ok()?;
        self.targets.get(index)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.targets.iter().filter(|t| t.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
