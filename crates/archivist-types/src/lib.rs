//! Shared data types for the archivist workspace: the persisted record,
//! the feed wire format, and the status API payloads.

pub mod api;
pub mod events;
pub mod models;
