//! `crawlmesh` — a distributed web crawler: a URL-owning manager service
//! and one or more fetch-scheduling worker services.

pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod pooling;
pub mod worker;
