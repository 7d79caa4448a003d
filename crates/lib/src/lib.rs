//! embedfix core library: link rewrite rules, the per-channel rewrite pipeline,
//! and the Discord adapter used by the CLI.

pub mod bot;
pub mod channels;
pub mod config;
pub mod dedup;
pub mod init;
pub mod rewrite;
pub mod rules;
pub mod serializer;
