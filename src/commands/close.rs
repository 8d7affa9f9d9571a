use serenity::builder::CreateApplicationCommand;
use serenity::model::prelude::application_command::ApplicationCommandInteraction;
use serenity::model::prelude::*;
use serenity::prelude::*;

use crate::utils::{interaction_reply, interaction_reply_ephemeral};
use crate::ServicesKey;

/// `/close`. The post owner (or a moderator with MANAGE_THREADS) archives
/// the help post they are standing in.
pub async fn run(
    command: &ApplicationCommandInteraction,
    ctx: &Context,
) -> Result<(), anyhow::Error> {
    let Some(post) = help_post(command, ctx).await? else {
        return interaction_reply_ephemeral(command, ctx, "This command only works in a help post.")
            .await;
    };
    let Some(owner) = post.owner_id else {
        return interaction_reply_ephemeral(command, ctx, "This command only works in a help post.")
            .await;
    };

    if command.user.id != owner && !is_forum_mod(command) {
        return interaction_reply_ephemeral(command, ctx, "This is not your help post.").await;
    }

    interaction_reply(
        command,
        ctx,
        format!(
            "<@!{owner}> this post has been closed. Feel free to reopen it if you have any further questions."
        ),
    )
    .await?;
    command
        .channel_id
        .edit_thread(&ctx, |thread| thread.archived(true))
        .await?;
    Ok(())
}

/// The invoking channel, if it is a thread under the configured help forum.
pub(super) async fn help_post(
    command: &ApplicationCommandInteraction,
    ctx: &Context,
) -> Result<Option<GuildChannel>, anyhow::Error> {
    let forum_id = {
        let data = ctx.data.read().await;
        data.get::<ServicesKey>()
            .ok_or_else(|| anyhow::anyhow!("services not initialised"))?
            .forum_id
    };
    let channel = match command.channel_id.to_channel(&ctx).await? {
        Channel::Guild(channel) => channel,
        _ => return Ok(None),
    };
    if channel.thread_metadata.is_none() || channel.parent_id != Some(forum_id) {
        return Ok(None);
    }
    Ok(Some(channel))
}

pub(super) fn is_forum_mod(command: &ApplicationCommandInteraction) -> bool {
    command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .map(|permissions| permissions.manage_threads())
        .unwrap_or(false)
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command.name("close").description("Close your help post")
}
