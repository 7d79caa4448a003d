//! Discord adapter: REST client (implements `Platform`) and gateway connector.

mod gateway;
pub mod permissions;
mod rest;

pub use gateway::{DiscordGateway, GatewayError, GATEWAY_INTENTS};
pub use rest::{message_payload, CurrentUser, DiscordClient, DEFAULT_API_BASE};
