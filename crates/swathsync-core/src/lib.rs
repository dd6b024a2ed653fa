//! swathsync core: resumable, concurrent mirroring of a daily file archive.
//!
//! Pipeline, leaves first:
//!
//! - [`catalog`] lists the files a bucket (product, day) should contain
//! - [`integrity`] decides whether a local file already satisfies an entry
//! - [`fetch`] downloads one file with bounded retries and size verification
//! - [`orchestrator`] fans one bucket's pending files out to a bounded pool
//! - [`driver`] walks products × dates, one bucket at a time

pub mod config;
pub mod logging;

pub mod bucket;
pub mod catalog;
pub mod driver;
pub mod fetch;
pub mod http;
pub mod integrity;
pub mod orchestrator;
pub mod retry;
