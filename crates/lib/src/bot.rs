//! Bot runtime: connect to Discord, feed the rewrite pipeline, and stop on Ctrl+C / SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::channels::discord::{DiscordClient, DiscordGateway};
use crate::config::{self, Config};
use crate::dedup::DedupGuard;
use crate::rewrite::Rewriter;
use crate::rules::RuleRegistry;
use crate::serializer::ChannelSerializer;

const INBOUND_BUFFER: usize = 256;

/// Run the bot until a shutdown signal arrives or the gateway gives up.
pub async fn run_bot(config: Config) -> Result<()> {
    let token = config::resolve_discord_token(&config).context(
        "no Discord bot token configured (set DISCORD_BOT_TOKEN or discord.botToken in the config)",
    )?;
    let rules = RuleRegistry::builtin().context("compiling link rules")?;
    log::info!("loaded {} rule(s): {}", rules.names().len(), rules.names().join(", "));

    let client = DiscordClient::new(token.clone(), Some(config.discord.api_base.clone()));
    let me = client
        .current_user()
        .await
        .context("fetching bot identity from Discord")?;
    log::info!("bot user {} ({})", me.username, me.id);
    let client = client.with_user_id(me.id);

    let rewriter = Arc::new(
        Rewriter::new(
            Arc::new(client.clone()),
            rules,
            DedupGuard::new(config.rewrite.dedup_capacity),
            ChannelSerializer::new(),
        )
        .with_max_message_len(config.rewrite.max_message_length),
    );

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
    let processor = tokio::spawn(rewriter.run(inbound_rx));
    let gateway = Arc::new(DiscordGateway::new(client, token));
    let mut gateway_task = gateway.clone().start(inbound_tx);

    tokio::select! {
        _ = shutdown_signal() => {
            log::info!("shutdown signal received, stopping gateway");
            gateway.stop();
            // The gateway notices the flag at its next frame or heartbeat.
            gateway_task.abort();
        }
        _ = &mut gateway_task => {
            log::warn!("discord gateway stopped on its own");
        }
    }

    let _ = processor.await;
    log::info!("bot stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
