//! Endpoint dispatch.
//!
//! - **`table`**: endpoint id to [`DispatchTarget`], plus the handler types
//! - **`dispatcher`**: runs a call under its target's execution strategy
//! - **`scheduler`**: the single-threaded cooperative scheduler behind
//!   suspendable handlers
//!
//! ```text
//!  transport ──dispatch(id, call)──▶ Dispatcher
//!                                      │ table.get(id) or NotFound
//!             ┌────────────────────────┼──────────────────────────┐
//!             ▼                        ▼                          ▼
//!       Blocking (inline)     Background (new thread)   Cooperative (enqueue)
//!             └────────────────────────┴──────────────────────────┘
//!                                      │ call.complete(response)
//!                                      ▼
//!                                  transport
//! ```

pub mod dispatcher;
pub mod scheduler;
pub mod table;

pub use dispatcher::{Dispatcher, NO_ROUTE};
pub use scheduler::CooperativeScheduler;
pub use table::{DispatchTable, DispatchTarget, Handler, Strategy};
