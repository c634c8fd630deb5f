//! Sweep every repository owned by a GitHub user: switch off issues,
//! projects and wiki, then merge, force-merge or close each open pull request.

pub mod bounded;
pub mod client;
pub mod config;
pub mod context;
pub mod pr;
pub mod repo;
pub mod sweep;
