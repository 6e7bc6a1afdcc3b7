//! Agent server API
//!
//! Two collaborators live here: the request/response [`client`] (health,
//! session listing, history) and the long-lived [`sse`] event stream. Both
//! speak to the same server; neither interprets event payloads.

pub mod client;
pub mod sse;

pub use client::{expand_history_message, ApiClient, SessionInfo, SessionTime};
pub use sse::{ConnectionStatus, EventStream};
