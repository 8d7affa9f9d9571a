use serenity::builder::CreateApplicationCommand;
use serenity::model::prelude::application_command::ApplicationCommandInteraction;
use serenity::model::Permissions;
use serenity::prelude::*;

use super::close::{help_post, is_forum_mod};
use crate::utils::{interaction_reply, interaction_reply_ephemeral};

/// `/lock`. Moderators archive and lock a help post so it cannot be
/// reopened by replying.
pub async fn run(
    command: &ApplicationCommandInteraction,
    ctx: &Context,
) -> Result<(), anyhow::Error> {
    let Some(post) = help_post(command, ctx).await? else {
        return interaction_reply_ephemeral(command, ctx, "This command only works in a help post.")
            .await;
    };

    if !is_forum_mod(command) {
        return interaction_reply_ephemeral(command, ctx, "You cannot lock posts.").await;
    }

    let owner_mention = post
        .owner_id
        .map(|owner| format!("<@!{owner}> this"))
        .unwrap_or_else(|| "This".to_string());
    interaction_reply(
        command,
        ctx,
        format!("{owner_mention} post has been locked by <@!{}>.", command.user.id),
    )
    .await?;
    command
        .channel_id
        .edit_thread(&ctx, |thread| thread.archived(true).locked(true))
        .await?;
    Ok(())
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("lock")
        .description("Locks a help post")
        .default_member_permissions(Permissions::MANAGE_THREADS)
}
