//! Wire shapes for the core's typed call surface (§6 of the design).
//!
//! Frontends (HTTP/REST, RPC, WebSocket, an MCP tool server — out of scope
//! here) marshal their own transport framing into these types before
//! calling the core, and marshal `ActionResult`/`ErrorShape` back out.
//! Nothing in this crate talks to a browser, a store, or a socket: it is
//! pure data plus the taxonomy both sides agree on.

pub mod action;
pub mod error;
pub mod permission;
pub mod session;

pub use {
    action::{ActionRequest, ActionResult, ResultMetadata},
    error::{ErrorKind, ErrorShape},
    permission::Permission,
    session::{ContextRecord, ContextStatus, SessionRecord},
};
