use std::sync::Arc;

use serenity::model::prelude::*;
use tokio::sync::Mutex;

use crate::index::IndexStore;

/// Default number of posts returned to the command layer.
pub const RECENT_POSTS_LIMIT: usize = 10;

/// Read path over the index for the `/posts` command. Never mutates.
pub struct QueryService {
    index: Arc<Mutex<IndexStore>>,
}

impl QueryService {
    pub fn new(index: Arc<Mutex<IndexStore>>) -> Self {
        Self { index }
    }

    /// Up to `limit` of the user's open posts, newest first. Post ids are
    /// monotonically increasing at creation time, so descending id order
    /// approximates recency.
    pub async fn recent_posts(
        &self,
        guild: GuildId,
        user: UserId,
        limit: usize,
    ) -> (Vec<ChannelId>, bool) {
        let posts: Vec<ChannelId> = self
            .index
            .lock()
            .await
            .posts_of(guild, user)
            .into_iter()
            .rev()
            .take(limit)
            .collect();
        let has_any = !posts.is_empty();
        (posts, has_any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId(1);
    const U1: UserId = UserId(11);

    fn service_with(posts: &[u64]) -> QueryService {
        let mut store = IndexStore::new();
        for &post in posts {
            store.insert(GUILD, U1, ChannelId(post));
        }
        QueryService::new(Arc::new(Mutex::new(store)))
    }

    #[tokio::test]
    async fn posts_come_back_in_descending_id_order() {
        let service = service_with(&[101, 305, 200]);
        let (posts, has_any) = service.recent_posts(GUILD, U1, RECENT_POSTS_LIMIT).await;
        assert!(has_any);
        assert_eq!(posts, vec![ChannelId(305), ChannelId(200), ChannelId(101)]);
    }

    #[tokio::test]
    async fn limit_keeps_the_newest_posts() {
        let service = service_with(&[1, 2, 3, 4, 5]);
        let (posts, _) = service.recent_posts(GUILD, U1, 2).await;
        assert_eq!(posts, vec![ChannelId(5), ChannelId(4)]);
    }

    #[tokio::test]
    async fn unknown_user_or_guild_is_empty() {
        let service = service_with(&[101]);
        let (posts, has_any) = service.recent_posts(GUILD, UserId(99), RECENT_POSTS_LIMIT).await;
        assert!(!has_any);
        assert!(posts.is_empty());

        let (posts, has_any) = service
            .recent_posts(GuildId(2), U1, RECENT_POSTS_LIMIT)
            .await;
        assert!(!has_any);
        assert!(posts.is_empty());
    }
}
