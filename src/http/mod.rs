//! HTTP protocol layer.
//!
//! The handler-facing [`request::Request`] and [`response::Response`] types,
//! plus the HTTP/1.1 transport that feeds the dispatch engine:
//!
//! - **`connection`**: per-connection request/response state machine
//! - **`parser`**: parses incoming HTTP requests from byte buffers
//! - **`request`**: request view with header, cookie and session access
//! - **`response`**: mutable response builder
//! - **`writer`**: serializes and writes responses to the client
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received (or rejected: 400/413/431)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Engine routes, dispatches, awaits completion
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
