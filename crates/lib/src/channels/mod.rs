//! Chat channels: inbound message types, the platform client trait, and the Discord adapter.
//!
//! The Discord gateway pushes `InboundMessage`s into an mpsc channel; the rewrite pipeline
//! consumes them and talks back through the `Platform` trait.

pub mod discord;
mod inbound;
mod platform;

pub use inbound::{Attachment, ChannelId, InboundMessage, MessageId};
pub use platform::{FileUpload, OutboundMessage, Platform, PlatformError};
