use std::sync::Arc;

use serenity::async_trait;
use serenity::model::prelude::*;
use serenity::prelude::*;
use tracing::Instrument;
use tracing::Level;

use crate::commands;
use crate::directory::PostSnapshot;
use crate::utils::interaction_reply_ephemeral;
use crate::{Services, ServicesKey};

pub struct Handler;

impl Handler {
    async fn services(ctx: &Context) -> Option<Arc<Services>> {
        let services = ctx.data.read().await.get::<ServicesKey>().cloned();
        if services.is_none() {
            error!("services not initialised, dropping event");
        }
        services
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = ?ready.user.name, guilds = ready.guilds.len(), "bot is connected");

        for guild in ready.guilds {
            let commands =
                GuildId::set_application_commands(&guild.id, &ctx, commands::register_all).await;

            if let Err(why) = commands {
                error!(error = %why, guild_id = %guild.id, "failed to register commands");
            }
        }
    }

    /// Fires both on startup and when a guild comes back after an outage, so
    /// the index is rebuilt from the directory either way.
    async fn guild_create(&self, ctx: Context, guild: Guild) {
        let commands =
            GuildId::set_application_commands(&guild.id, &ctx, commands::register_all).await;
        if let Err(why) = commands {
            error!(error = %why, guild_id = %guild.id, "failed to register commands");
        }

        let Some(services) = Self::services(&ctx).await else {
            return;
        };
        if let Err(why) = services.reactor.guild_available(guild.id).await {
            warn!(error = %why, guild_id = %guild.id, "failed to rebuild index for guild");
        }
    }

    async fn guild_delete(&self, ctx: Context, incomplete: UnavailableGuild) {
        let Some(services) = Self::services(&ctx).await else {
            return;
        };
        services.reactor.guild_removed(incomplete.id).await;
    }

    async fn thread_create(&self, ctx: Context, thread: GuildChannel) {
        let Some(services) = Self::services(&ctx).await else {
            return;
        };
        if let Some(post) = PostSnapshot::from_channel(&thread) {
            services.reactor.thread_created(thread.guild_id, &post).await;
        }
    }

    async fn thread_update(&self, ctx: Context, thread: GuildChannel) {
        let Some(services) = Self::services(&ctx).await else {
            return;
        };
        if let Some(post) = PostSnapshot::from_channel(&thread) {
            services.reactor.thread_updated(thread.guild_id, &post).await;
        }
    }

    async fn thread_delete(&self, ctx: Context, thread: PartialGuildChannel) {
        let Some(services) = Self::services(&ctx).await else {
            return;
        };
        services.reactor.thread_deleted(thread.guild_id, thread.id).await;
    }

    async fn guild_member_removal(&self, ctx: Context, guild_id: GuildId, user: User) {
        let Some(services) = Self::services(&ctx).await else {
            return;
        };
        services.reactor.member_left(guild_id, user.id).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::ApplicationCommand(command) = interaction {
            let span = span!(
                Level::DEBUG,
                "application_command",
                interaction_id = command.id.0,
                guild_id = %command.guild_id.unwrap_or_default(),
                channel_id = %command.channel_id,
                user = %command.user,
                command_name = %command.data.name
            );

            async {
                trace!(command = ?command, "received command interaction");
                let res = match command.data.name.as_str() {
                    "posts" => commands::posts::run(&command, &ctx).await,
                    commands::posts::MENU_NAME => commands::posts::run_menu(&command, &ctx).await,
                    "close" => commands::close::run(&command, &ctx).await,
                    "lock" => commands::lock::run(&command, &ctx).await,
                    _ => {
                        warn!(command_name = %command.data.name, "unknown command received");
                        interaction_reply_ephemeral(&command, &ctx, "Unknown command").await
                    }
                };

                if let Err(why) = res {
                    warn!(error = %why, "cannot respond to slash command");
                    interaction_reply_ephemeral(
                        &command,
                        &ctx,
                        "There was an error processing this command.",
                    )
                    .await
                    .ok();
                }
            }
            .instrument(span)
            .await;
        }
    }
}
