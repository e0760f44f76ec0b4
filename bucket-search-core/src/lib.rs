#![doc = "bucket-search-core: core logic for indexing a storage bucket into Cloud Search."]

//! This crate holds the document builder, the paginated storage and index
//! clients, and the two run orchestrators (ingest and purge). Transport lives
//! behind the traits in [`contract`]; the CLI crate supplies the HTTP
//! implementations.

pub mod config;
pub mod contract;
pub mod error;
pub mod item_body;
pub mod items;
pub mod purge;
pub mod storage;
pub mod synchronise;

pub use error::{Result, SyncError};
