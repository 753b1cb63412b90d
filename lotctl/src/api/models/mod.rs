//! Request/response data structures for the HTTP API.

pub mod capacity;
pub mod directory;
pub mod reservations;
pub mod sessions;
