use std::sync::Arc;

use serenity::builder::CreateApplicationCommand;
use serenity::model::prelude::application_command::ApplicationCommandInteraction;
use serenity::model::prelude::command::{CommandOptionType, CommandType};
use serenity::model::prelude::*;
use serenity::prelude::*;

use crate::query::RECENT_POSTS_LIMIT;
use crate::utils::{interaction_reply, interaction_reply_ephemeral};
use crate::{Services, ServicesKey};

pub const MENU_NAME: &str = "Recent Help Posts";

/// `/posts [user]`. Without an argument, shows the caller's own history
/// privately; with one, shows the named user's history to the channel.
pub async fn run(
    command: &ApplicationCommandInteraction,
    ctx: &Context,
) -> Result<(), anyhow::Error> {
    let queried = command
        .data
        .options
        .first()
        .and_then(|option| option.value.as_ref())
        .and_then(|value| value.as_str())
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(UserId);

    match queried {
        Some(user) => respond_with_history(command, ctx, user, false).await,
        None => respond_with_history(command, ctx, command.user.id, true).await,
    }
}

/// The user context-menu variant; private only when users look themselves up.
pub async fn run_menu(
    command: &ApplicationCommandInteraction,
    ctx: &Context,
) -> Result<(), anyhow::Error> {
    let target = command
        .data
        .target_id
        .ok_or_else(|| anyhow::anyhow!("user command without a target"))?
        .to_user_id();
    respond_with_history(command, ctx, target, target == command.user.id).await
}

async fn respond_with_history(
    command: &ApplicationCommandInteraction,
    ctx: &Context,
    user: UserId,
    ephemeral: bool,
) -> Result<(), anyhow::Error> {
    let Some(guild) = command.guild_id else {
        return interaction_reply_ephemeral(command, ctx, "This command only works in a server.")
            .await;
    };
    let services = services(ctx).await?;

    let (posts, has_any) = services
        .query
        .recent_posts(guild, user, RECENT_POSTS_LIMIT)
        .await;

    let message = if has_any {
        let listing: Vec<String> = posts.iter().map(|post| format!("<#{post}>")).collect();
        format!(
            "<@!{user}> has recently opened these help posts:\n- {}",
            listing.join("\n- ")
        )
    } else {
        format!(
            "<@!{user}> has no recent help posts in <#{}>.",
            services.forum_id
        )
    };

    if ephemeral {
        interaction_reply_ephemeral(command, ctx, message).await
    } else {
        interaction_reply(command, ctx, message).await
    }
}

async fn services(ctx: &Context) -> Result<Arc<Services>, anyhow::Error> {
    ctx.data
        .read()
        .await
        .get::<ServicesKey>()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("services not initialised"))
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("posts")
        .description("Shows a user's recent help post history")
        .create_option(|option| {
            option
                .name("user")
                .description("The user to get the post history for")
                .kind(CommandOptionType::User)
                .required(false)
        })
}

pub fn register_menu(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command.name(MENU_NAME).kind(CommandType::User)
}
