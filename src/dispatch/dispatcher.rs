use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error};

use crate::call::CallInfo;
use crate::dispatch::scheduler::{CooperativeScheduler, Job};
use crate::dispatch::table::{
    DispatchTable, DispatchTarget, Strategy, SuspendableHandler, SyncHandler,
};
use crate::http::request::Request;
use crate::http::response::Response;

/// Endpoint id the transport passes when no route matched.
pub const NO_ROUTE: isize = -1;

/// Runs each call under its target's strategy and completes it exactly once.
///
/// Every strategy starts the handler with a fresh `200` response. A handler
/// that returns an error or panics has its response replaced by a `500` with
/// a diagnostic body; the failure never escapes to the calling thread.
pub struct Dispatcher {
    table: DispatchTable,
    not_found: DispatchTarget,
    scheduler: CooperativeScheduler,
    worker_seq: AtomicU64,
}

impl Dispatcher {
    /// Freezes `table` and starts the cooperative scheduler thread.
    pub fn new(table: DispatchTable) -> std::io::Result<Self> {
        Ok(Self {
            table,
            not_found: DispatchTarget::not_found(),
            scheduler: CooperativeScheduler::start()?,
            worker_seq: AtomicU64::new(0),
        })
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn dispatch(&self, endpoint_id: isize, call: CallInfo) {
        let target = self.table.get(endpoint_id).unwrap_or(&self.not_found);
        debug!(
            endpoint_id,
            strategy = target.strategy_name(),
            method = %call.request().method,
            uri = %call.request().uri,
            "Dispatching request"
        );

        match target.strategy() {
            Strategy::Blocking(handler) => run_sync(endpoint_id, handler, call),
            Strategy::Background(handler) => {
                self.spawn_background(endpoint_id, Arc::clone(handler), call)
            }
            Strategy::Cooperative(handler) => {
                let handler = Arc::clone(handler);
                let job: Job =
                    Box::new(move || run_suspendable(endpoint_id, handler, call).boxed_local());
                self.scheduler.schedule(job);
            }
        }
    }

    fn spawn_background(&self, endpoint_id: isize, handler: SyncHandler, call: CallInfo) {
        let seq = self.worker_seq.fetch_add(1, Ordering::Relaxed);
        let spawned = thread::Builder::new()
            .name(format!("ice-worker-{seq}"))
            .spawn(move || run_sync(endpoint_id, &handler, call));

        // On failure the closure, and the call with it, is dropped; the
        // call's drop path completes it with a 500.
        if let Err(e) = spawned {
            error!(endpoint_id, error = %e, "Failed to spawn worker thread");
        }
    }
}

fn run_sync(endpoint_id: isize, handler: &SyncHandler, call: CallInfo) {
    let started = Instant::now();
    let mut response = Response::new();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler(call.request().as_ref(), &mut response)
    }));

    let response = match outcome {
        Ok(Ok(())) => response,
        Ok(Err(e)) => handler_failure(endpoint_id, call.request(), format!("{e:#}")),
        Err(payload) => handler_failure(endpoint_id, call.request(), panic_message(&*payload)),
    };

    debug!(
        endpoint_id,
        status = response.status(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Handler finished"
    );
    call.complete(response);
}

async fn run_suspendable(endpoint_id: isize, handler: SuspendableHandler, call: CallInfo) {
    let started = Instant::now();
    let request = Arc::clone(call.request());

    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
        handler(Arc::clone(&request), Response::new())
    })) {
        Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
        Err(payload) => Err(payload),
    };

    let response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => handler_failure(endpoint_id, &request, format!("{e:#}")),
        Err(payload) => handler_failure(endpoint_id, &request, panic_message(&*payload)),
    };

    debug!(
        endpoint_id,
        status = response.status(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Suspendable handler finished"
    );
    call.complete(response);
}

fn handler_failure(endpoint_id: isize, request: &Request, diagnostic: impl Display) -> Response {
    error!(
        endpoint_id,
        method = %request.method,
        uri = %request.uri,
        error = %diagnostic,
        "Handler failed"
    );
    Response::internal_error(diagnostic)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("handler panicked: {msg}")
    } else {
        "handler panicked".to_string()
    }
}
