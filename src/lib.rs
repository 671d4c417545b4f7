//! Browse and edit any relational table over HTTP.
//!
//! Nothing here knows about a particular table: each request reads the live
//! catalog, checks the requested table and columns against it, and builds a
//! parameterised statement from what it found.

pub mod libs;

pub use libs::*;
