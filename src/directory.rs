use std::sync::Arc;

use serenity::async_trait;
use serenity::http::{error::ErrorResponse, Http, HttpError};
use serenity::model::prelude::*;
use time::OffsetDateTime;

/// What the core needs to know about one forum thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostSnapshot {
    pub id: ChannelId,
    pub owner: UserId,
    pub parent: Option<ChannelId>,
    pub archived: bool,
    pub created_at: OffsetDateTime,
}

impl PostSnapshot {
    /// Builds a snapshot from a gateway thread payload. `None` for channels
    /// that are not threads or have no recorded owner.
    pub fn from_channel(channel: &GuildChannel) -> Option<Self> {
        let metadata = channel.thread_metadata.as_ref()?;
        Some(Self {
            id: channel.id,
            owner: channel.owner_id?,
            parent: channel.parent_id,
            archived: metadata.archived,
            created_at: *channel.id.created_at(),
        })
    }
}

/// Remote read/write operations on channels, threads and messages.
///
/// The core only ever talks to Discord through this trait, so tests can run
/// against an in-memory implementation.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn fetch_active_threads(&self, guild: GuildId) -> Result<Vec<PostSnapshot>, anyhow::Error>;

    async fn fetch_channel(&self, channel: ChannelId) -> Result<Channel, anyhow::Error>;

    /// Timestamp of the newest message in the post, or `None` when the post
    /// has no messages left to fetch.
    async fn fetch_last_message(
        &self,
        post: ChannelId,
    ) -> Result<Option<OffsetDateTime>, anyhow::Error>;

    async fn send_message(&self, post: ChannelId, text: &str) -> Result<(), anyhow::Error>;

    async fn archive_channel(&self, post: ChannelId, locked: bool) -> Result<(), anyhow::Error>;
}

pub struct HttpDirectory {
    http: Arc<Http>,
}

impl HttpDirectory {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn fetch_active_threads(&self, guild: GuildId) -> Result<Vec<PostSnapshot>, anyhow::Error> {
        let threads = guild.get_active_threads(&self.http).await?;
        Ok(threads
            .threads
            .iter()
            .filter_map(PostSnapshot::from_channel)
            .collect())
    }

    async fn fetch_channel(&self, channel: ChannelId) -> Result<Channel, anyhow::Error> {
        Ok(self.http.get_channel(channel.0).await?)
    }

    async fn fetch_last_message(
        &self,
        post: ChannelId,
    ) -> Result<Option<OffsetDateTime>, anyhow::Error> {
        match post.messages(&self.http, |retriever| retriever.limit(1)).await {
            Ok(messages) => Ok(messages.first().map(|m| *m.timestamp)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn send_message(&self, post: ChannelId, text: &str) -> Result<(), anyhow::Error> {
        post.say(&self.http, text).await?;
        Ok(())
    }

    async fn archive_channel(&self, post: ChannelId, locked: bool) -> Result<(), anyhow::Error> {
        post.edit_thread(&self.http, |thread| thread.archived(true).locked(locked))
            .await?;
        Ok(())
    }
}


fn is_not_found(err: &serenity::Error) -> bool {
    matches!(
        err,
        serenity::Error::Http(boxed)
            if matches!(
                **boxed,
                HttpError::UnsuccessfulRequest(ErrorResponse { status_code, .. })
                    if status_code.as_u16() == 404
            )
    )
}
