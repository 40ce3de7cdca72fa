//! Ice - embeddable HTTP application server
//!
//! Core library: routing, per-endpoint dispatch strategies, sessions and the
//! HTTP/1.1 transport that drives them.

pub mod call;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod router;
pub mod server;
pub mod session;

pub use call::CallInfo;
pub use config::Config;
pub use dispatch::{Dispatcher, Handler, NO_ROUTE};
pub use error::{RegistrationError, ResponseError};
pub use http::request::{Method, Request};
pub use http::response::Response;
pub use router::{Endpoint, EndpointFlags, Router};
pub use server::{RouteOptions, Server};
pub use session::SessionStore;
