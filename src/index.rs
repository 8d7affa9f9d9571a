use std::collections::{BTreeSet, HashMap};

use serenity::model::prelude::*;

/// Per-guild mapping from a user to the set of their open help posts.
///
/// A post id belongs to at most one owner within a guild; `insert` enforces
/// this by moving an id that shows up under a second owner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildIndex {
    by_owner: HashMap<UserId, BTreeSet<ChannelId>>,
}

impl GuildIndex {
    pub fn insert(&mut self, owner: UserId, post: ChannelId) {
        if let Some(current) = self.owner_of(post) {
            if current == owner {
                return;
            }
            warn!(post_id = %post, old_owner = %current, new_owner = %owner,
                "post tracked under two owners, reassigning");
            self.remove(current, post);
        }
        self.by_owner.entry(owner).or_default().insert(post);
    }

    pub fn remove(&mut self, owner: UserId, post: ChannelId) {
        if let Some(posts) = self.by_owner.get_mut(&owner) {
            posts.remove(&post);
            if posts.is_empty() {
                self.by_owner.remove(&owner);
            }
        }
    }

    /// Removes a post without knowing its owner, returning the owner it was
    /// tracked under. Thread-delete events carry no owner id.
    pub fn remove_post(&mut self, post: ChannelId) -> Option<UserId> {
        let owner = self.owner_of(post)?;
        self.remove(owner, post);
        Some(owner)
    }

    pub fn owner_of(&self, post: ChannelId) -> Option<UserId> {
        self.by_owner
            .iter()
            .find(|(_, posts)| posts.contains(&post))
            .map(|(owner, _)| *owner)
    }

    pub fn contains(&self, post: ChannelId) -> bool {
        self.owner_of(post).is_some()
    }

    pub fn posts_of(&self, user: UserId) -> BTreeSet<ChannelId> {
        self.by_owner.get(&user).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }
}

/// Owns one [`GuildIndex`] per guild the bot serves.
///
/// Plain synchronous state; callers share it behind a single
/// `tokio::sync::Mutex` and never hold the lock across an await.
#[derive(Debug, Default)]
pub struct IndexStore {
    guilds: HashMap<GuildId, GuildIndex>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the guild's index, creating an empty one if absent.
    pub fn ensure(&mut self, guild: GuildId) -> &mut GuildIndex {
        self.guilds.entry(guild).or_default()
    }

    pub fn get(&self, guild: GuildId) -> Option<&GuildIndex> {
        self.guilds.get(&guild)
    }

    /// Replaces the guild's entire index with one built from (owner, post)
    /// pairs. Used on guild-available, when events may have been missed.
    pub fn rebuild(&mut self, guild: GuildId, posts: impl IntoIterator<Item = (UserId, ChannelId)>) {
        let mut index = GuildIndex::default();
        for (owner, post) in posts {
            index.insert(owner, post);
        }
        self.guilds.insert(guild, index);
    }

    pub fn insert(&mut self, guild: GuildId, owner: UserId, post: ChannelId) {
        self.ensure(guild).insert(owner, post);
    }

    pub fn remove(&mut self, guild: GuildId, owner: UserId, post: ChannelId) {
        if let Some(index) = self.guilds.get_mut(&guild) {
            index.remove(owner, post);
        }
    }

    pub fn remove_post(&mut self, guild: GuildId, post: ChannelId) -> Option<UserId> {
        self.guilds.get_mut(&guild)?.remove_post(post)
    }

    /// Clears a user's entry, returning the posts that were tracked for them.
    pub fn remove_all_for_user(&mut self, guild: GuildId, user: UserId) -> BTreeSet<ChannelId> {
        let Some(index) = self.guilds.get_mut(&guild) else {
            return BTreeSet::new();
        };
        let posts = index.posts_of(user);
        index.by_owner.remove(&user);
        posts
    }

    pub fn drop_guild(&mut self, guild: GuildId) {
        self.guilds.remove(&guild);
    }

    pub fn posts_of(&self, guild: GuildId, user: UserId) -> BTreeSet<ChannelId> {
        self.guilds
            .get(&guild)
            .map(|index| index.posts_of(user))
            .unwrap_or_default()
    }
}
