//! hirestats - days-to-hire statistics over job postings
//!
//! See [`statistics`] for the engine, store and read side.

pub mod config;
pub mod sqlite_pragma;
pub mod statistics;
