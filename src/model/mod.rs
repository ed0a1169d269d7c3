//! §3 DATA MODEL.

pub mod link;
pub mod timestamp;
pub mod url_record;
pub mod wire;

pub use link::Link;
pub use url_record::{QueueItem, Redirect, Report, UrlRecord};
