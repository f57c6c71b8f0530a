//! Domain logic for docrelay: staging uploads on disk, discovering
//! processor scripts, and running them as subprocesses.
//!
//! Nothing in this crate knows about HTTP. The `docrelay-api` crate wires
//! these pieces into request handlers.

pub mod error;
pub mod registry;
pub mod scripting;
pub mod staging;
