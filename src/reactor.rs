use std::sync::Arc;

use serenity::model::prelude::*;
use tokio::sync::Mutex;

use crate::directory::{Directory, PostSnapshot};
use crate::index::IndexStore;
use crate::scheduler::ArchiveScheduler;

/// Translates gateway lifecycle events into index mutations and, where the
/// open set changed wholesale, a scheduler recomputation.
///
/// Events whose thread does not belong to the configured help forum are
/// ignored.
pub struct EventReactor {
    forum_id: ChannelId,
    index: Arc<Mutex<IndexStore>>,
    scheduler: Arc<ArchiveScheduler>,
    directory: Arc<dyn Directory>,
}

impl EventReactor {
    pub fn new(
        forum_id: ChannelId,
        index: Arc<Mutex<IndexStore>>,
        scheduler: Arc<ArchiveScheduler>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            forum_id,
            index,
            scheduler,
            directory,
        }
    }

    pub async fn thread_created(&self, guild: GuildId, post: &PostSnapshot) {
        if post.parent != Some(self.forum_id) {
            return;
        }
        debug!(guild_id = %guild, post_id = %post.id, owner = %post.owner, "tracking new help post");
        self.index.lock().await.insert(guild, post.owner, post.id);
    }

    /// Archived posts leave the index, unarchived ones come back. An update
    /// that changes neither is a no-op.
    pub async fn thread_updated(&self, guild: GuildId, post: &PostSnapshot) {
        if post.parent != Some(self.forum_id) {
            return;
        }
        let mut index = self.index.lock().await;
        let tracked = index.get(guild).map(|g| g.contains(post.id)).unwrap_or(false);
        if tracked && post.archived {
            debug!(guild_id = %guild, post_id = %post.id, "help post archived, dropping from index");
            // Remove by post id, not payload owner, so a payload that
            // disagrees with the tracked owner still clears the entry.
            index.remove_post(guild, post.id);
        } else if !tracked && !post.archived {
            debug!(guild_id = %guild, post_id = %post.id, "help post reopened, tracking again");
            index.insert(guild, post.owner, post.id);
        }
    }

    pub async fn thread_deleted(&self, guild: GuildId, post: ChannelId) {
        if self.index.lock().await.remove_post(guild, post).is_some() {
            debug!(guild_id = %guild, post_id = %post, "tracked help post deleted");
        }
    }

    /// Closes every open post of the departed member, then clears their
    /// entry. The closes go out concurrently and are awaited together.
    pub async fn member_left(&self, guild: GuildId, user: UserId) {
        let posts = self.index.lock().await.posts_of(guild, user);
        if posts.is_empty() {
            return;
        }
        info!(guild_id = %guild, user_id = %user, count = posts.len(), "member left, closing their help posts");
        futures::future::join_all(
            posts
                .iter()
                .map(|post| self.scheduler.close_post(*post, user)),
        )
        .await;
        self.index.lock().await.remove_all_for_user(guild, user);
    }

    /// The bot may have missed events while the guild was unavailable, so
    /// the index is rebuilt wholesale and the scheduler re-armed from the
    /// same snapshot set.
    pub async fn guild_available(&self, guild: GuildId) -> Result<(), anyhow::Error> {
        let threads = self.directory.fetch_active_threads(guild).await?;
        let posts: Vec<PostSnapshot> = threads
            .into_iter()
            .filter(|post| post.parent == Some(self.forum_id) && !post.archived)
            .collect();
        info!(guild_id = %guild, count = posts.len(), "rebuilding help post index");
        self.index
            .lock()
            .await
            .rebuild(guild, posts.iter().map(|post| (post.owner, post.id)));
        self.scheduler.schedule_next(guild, posts).await;
        Ok(())
    }

    pub async fn guild_removed(&self, guild: GuildId) {
        info!(guild_id = %guild, "guild gone, discarding index and timer");
        self.index.lock().await.drop_guild(guild);
        self.scheduler.cancel(guild).await;
    }
}
