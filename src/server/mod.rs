//! Registration surface and serving.
//!
//! Endpoints are registered on a [`Server`] before it starts serving.
//! [`Server::into_engine`] (called by `bind`/`listen`) freezes the router and
//! dispatch table, so no lookup on the request path takes a lock.

pub mod engine;
pub mod listener;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::FutureExt;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::dispatch::{DispatchTable, DispatchTarget, Handler};
use crate::error::RegistrationError;
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::router::{Endpoint, EndpointFlags, Router};
use crate::session::SessionStore;

pub use engine::Engine;

/// Options for [`Server::route`].
#[derive(Debug, Clone)]
pub struct RouteOptions {
    pub methods: Vec<Method>,
    pub blocking: bool,
    pub init_session: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            methods: vec![Method::GET],
            blocking: false,
            init_session: false,
        }
    }
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn methods(mut self, methods: &[Method]) -> Self {
        self.methods = methods.to_vec();
        self
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn init_session(mut self) -> Self {
        self.init_session = true;
        self
    }
}

pub struct Server {
    config: Config,
    router: Router,
    table: DispatchTable,
    sessions: Arc<SessionStore>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session.timeout()));
        Self {
            config,
            router: Router::new(),
            table: DispatchTable::new(),
            sessions,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn set_session_timeout_ms(&mut self, ms: u64) {
        self.config.session.timeout_ms = ms;
        self.sessions.set_timeout(Duration::from_millis(ms));
    }

    pub fn set_session_cookie_name(&mut self, name: impl Into<String>) {
        self.config.session.cookie_name = name.into();
    }

    pub fn set_max_request_body_size(&mut self, size: usize) {
        self.config.server.max_request_body_size = size;
    }

    /// Registers `handler` at `pattern`. `flags.blocking` picks the
    /// blocking strategy and is rejected for suspendable handlers.
    pub fn add_endpoint(
        &mut self,
        pattern: &str,
        flags: EndpointFlags,
        handler: Handler,
    ) -> Result<Endpoint, RegistrationError> {
        let target = DispatchTarget::new(handler, flags.blocking).inspect_err(|e| {
            error!(path = %pattern, error = %e, "Endpoint registration rejected");
        })?;
        let endpoint = self.router.add_endpoint(pattern, flags).inspect_err(|e| {
            error!(path = %pattern, error = %e, "Endpoint registration rejected");
        })?;
        self.table.set(endpoint.id, target);
        Ok(endpoint)
    }

    /// Registers `handler` behind a method check.
    ///
    /// Requests with a method outside `options.methods` get `405` and never
    /// reach the handler. Allowing POST turns on `read_body`.
    pub fn route(
        &mut self,
        pattern: &str,
        options: RouteOptions,
        handler: Handler,
    ) -> Result<Endpoint, RegistrationError> {
        let flags = EndpointFlags {
            read_body: options.methods.contains(&Method::POST),
            blocking: options.blocking,
            init_session: options.init_session,
        };
        self.add_endpoint(pattern, flags, with_method_check(options.methods, handler))
    }

    /// Ends registration and starts the dispatcher and session sweeper.
    ///
    /// Must be called from within a tokio runtime; the sweeper runs as a task on it.
    pub fn into_engine(self) -> std::io::Result<Engine> {
        Engine::start(self.config, self.router, self.table, self.sessions)
    }

    /// Resolves and binds `addr` (`host:port`, host names allowed).
    /// Malformed addresses and bind failures surface here, before any
    /// request is served.
    pub async fn bind(self, addr: &str) -> anyhow::Result<BoundServer> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listen address {addr:?}"))?;
        let addr = listener.local_addr()?;
        let engine = self
            .into_engine()
            .context("failed to start dispatch engine")?;

        info!(
            addr = %addr,
            endpoints = engine.router().len(),
            "Server bound"
        );
        Ok(BoundServer {
            listener,
            engine: Arc::new(engine),
        })
    }

    pub async fn listen(self, addr: &str) -> anyhow::Result<()> {
        self.bind(addr).await?.serve().await
    }
}

pub struct BoundServer {
    listener: TcpListener,
    engine: Arc<Engine>,
}

impl BoundServer {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        listener::run(self.listener, self.engine).await
    }
}

fn with_method_check(methods: Vec<Method>, handler: Handler) -> Handler {
    let allowed: Arc<[Method]> = methods.into();

    match handler {
        Handler::Sync(inner) => Handler::sync(move |req, resp| {
            if !allowed.contains(&req.method) {
                return method_not_allowed(&allowed, resp);
            }
            inner(req, resp)
        }),
        Handler::Suspendable(inner) => {
            Handler::Suspendable(Arc::new(move |req: Arc<Request>, mut resp: Response| {
                if !allowed.contains(&req.method) {
                    let outcome = method_not_allowed(&allowed, &mut resp);
                    return async move { outcome.map(|()| resp) }.boxed_local();
                }
                inner(req, resp)
            }))
        }
    }
}

fn method_not_allowed(allowed: &[Method], resp: &mut Response) -> anyhow::Result<()> {
    resp.set_status(405)?;
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    resp.add_header("Allow", allow);
    Ok(())
}
