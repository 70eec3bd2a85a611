//! Commands shipped with the binary: `ping`, `echo` and `help`.

use std::sync::Arc;

use super::binder::BoundArguments;
use super::command::{CommandDefinition, ParameterDescriptor};
use super::context::CommandContext;
use crate::error::RestError;

/// Reply to the invoking message, or log the reply if no REST client is set.
async fn respond(ctx: &CommandContext, content: &str) -> anyhow::Result<()> {
    match ctx.reply(content).await {
        Ok(message) => {
            tracing::debug!(message_id = %message.id, "Reply posted");
            Ok(())
        }
        Err(RestError::Unavailable) => {
            tracing::info!(command = %ctx.command, reply = %content, "No REST client, reply not sent");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn ping(ctx: CommandContext, _args: BoundArguments) -> anyhow::Result<()> {
    respond(&ctx, "pong").await
}

async fn echo(ctx: CommandContext, args: BoundArguments) -> anyhow::Result<()> {
    let text = args.rest(0)?.join(" ");
    if text.is_empty() {
        return Ok(());
    }
    respond(&ctx, &text).await
}

/// Definitions for every built-in command.
pub fn definitions() -> Vec<CommandDefinition> {
    let mut defs = vec![
        CommandDefinition::new("ping", ping).description("Check that the bot is alive"),
        CommandDefinition::new("echo", echo)
            .alias("say")
            .param(ParameterDescriptor::rest("text"))
            .description("Repeat the given text")
            .example("echo hello there"),
    ];

    let mut lines: Vec<String> = defs
        .iter()
        .map(|def| format!("{} - {}", def.usage(), def.summary().unwrap_or_default()))
        .collect();
    lines.push("help - List available commands".to_string());
    let listing: Arc<str> = lines.join("\n").into();

    defs.push(
        CommandDefinition::new("help", move |ctx: CommandContext, _args: BoundArguments| {
            let listing = Arc::clone(&listing);
            async move { respond(&ctx, &listing).await }
        })
        .description("List available commands"),
    );
    defs
}
