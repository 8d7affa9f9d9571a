use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use serenity::model::prelude::*;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::directory::{Directory, PostSnapshot};

/// A post with no activity for this long gets closed.
pub const STALE_AFTER: time::Duration = time::Duration::days(7);

/// Pause between the closing notice and the archive call so the notice
/// renders before the channel is frozen.
pub const LOCK_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

struct ArmedTimer {
    post: ChannelId,
    generation: u64,
    handle: JoinHandle<()>,
}

/// Keeps at most one pending archive timer per guild, always targeting the
/// tracked post nearest to the inactivity threshold.
///
/// This deliberately tracks only the single next expiry rather than a full
/// priority queue: a second nearly-stale post is caught by the recompute
/// that runs when the first timer fires.
pub struct ArchiveScheduler {
    directory: Arc<dyn Directory>,
    forum_id: ChannelId,
    timers: Mutex<HashMap<GuildId, ArmedTimer>>,
    generations: AtomicU64,
}

impl ArchiveScheduler {
    pub fn new(directory: Arc<dyn Directory>, forum_id: ChannelId) -> Self {
        Self {
            directory,
            forum_id,
            timers: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Re-derives the next archive candidate from the guild's current active
    /// thread set. Used after a timer fires; guild-available goes straight to
    /// [`Self::schedule_next`] with the set it already fetched.
    ///
    /// Returns a boxed future: recomputing schedules a timer whose fire path
    /// recomputes again, and the declared return type cuts that cycle out of
    /// the compiler's `Send` inference.
    pub fn recompute(
        self: &Arc<Self>,
        guild: GuildId,
    ) -> BoxFuture<'static, Result<(), anyhow::Error>> {
        let scheduler = Arc::clone(self);
        Box::pin(async move {
            let threads = scheduler.directory.fetch_active_threads(guild).await?;
            let candidates = threads
                .into_iter()
                .filter(|post| post.parent == Some(scheduler.forum_id) && !post.archived)
                .collect();
            scheduler.schedule_next(guild, candidates).await;
            Ok(())
        })
    }

    /// Closes every candidate already past the threshold, then arms a single
    /// timer for the one closest to it. Arming replaces any previous timer
    /// for the guild.
    pub async fn schedule_next(self: &Arc<Self>, guild: GuildId, candidates: Vec<PostSnapshot>) {
        let now = OffsetDateTime::now_utc();
        let mut stale = Vec::new();
        let mut fresh = Vec::new();
        for post in candidates {
            let staleness = now - self.last_activity(&post).await;
            if staleness > STALE_AFTER {
                stale.push(post);
            } else {
                fresh.push((STALE_AFTER - staleness, post));
            }
        }

        if !stale.is_empty() {
            info!(guild_id = %guild, count = stale.len(), "closing posts past the inactivity threshold");
            futures::future::join_all(stale.iter().map(|post| self.close_post(post.id, post.owner)))
                .await;
        }

        match fresh.into_iter().min_by_key(|(remaining, post)| (*remaining, post.id)) {
            Some((remaining, post)) => self.arm(guild, post, remaining).await,
            None => self.cancel(guild).await,
        }
    }

    /// Cancels the guild's pending timer, if any. Called on guild teardown
    /// and when a scheduling pass finds nothing left to watch.
    pub async fn cancel(&self, guild: GuildId) {
        if let Some(timer) = self.timers.lock().await.remove(&guild) {
            timer.handle.abort();
        }
    }

    /// The post the guild's armed timer currently targets, if any.
    pub async fn armed_post(&self, guild: GuildId) -> Option<ChannelId> {
        self.timers.lock().await.get(&guild).map(|timer| timer.post)
    }

    /// Notice, short delay, then archive-and-lock. Directory failures are
    /// logged and swallowed; the index is corrected by a later gateway event
    /// rather than mutated here.
    pub async fn close_post(&self, post: ChannelId, owner: UserId) {
        let notice = format!(
            "This post has been inactive for 7 days. <@!{owner}>, feel free to reclaim this channel."
        );
        if let Err(e) = self.directory.send_message(post, &notice).await {
            warn!(error = %e, post_id = %post, "failed to send closing notice");
        }
        tokio::time::sleep(LOCK_DELAY).await;
        if let Err(e) = self.directory.archive_channel(post, true).await {
            warn!(error = %e, post_id = %post, "failed to archive post");
        }
    }

    async fn last_activity(&self, post: &PostSnapshot) -> OffsetDateTime {
        match self.directory.fetch_last_message(post.id).await {
            Ok(Some(timestamp)) => timestamp,
            Ok(None) => post.created_at,
            Err(e) => {
                warn!(error = %e, post_id = %post.id, "failed to fetch last message, falling back to creation time");
                post.created_at
            }
        }
    }

    async fn arm(self: &Arc<Self>, guild: GuildId, post: PostSnapshot, remaining: time::Duration) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let delay: std::time::Duration = remaining.try_into().unwrap_or_default();
        let scheduler = Arc::clone(self);
        // Hold the lock across the spawn so a zero-delay fire cannot observe
        // the map before its own slot is registered.
        let mut timers = self.timers.lock().await;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(guild, post, generation).await;
        });
        debug!(guild_id = %guild, post_id = %post.id, ?delay, "armed archive timer");
        if let Some(previous) = timers.insert(
            guild,
            ArmedTimer {
                post: post.id,
                generation,
                handle,
            },
        ) {
            previous.handle.abort();
        }
    }

    async fn fire(self: Arc<Self>, guild: GuildId, post: PostSnapshot, generation: u64) {
        {
            // Replaced while sleeping means a newer timer owns this guild.
            let mut timers = self.timers.lock().await;
            match timers.get(&guild) {
                Some(timer) if timer.generation == generation => {
                    timers.remove(&guild);
                }
                _ => return,
            }
        }
        info!(guild_id = %guild, post_id = %post.id, "archive timer fired");
        self.close_post(post.id, post.owner).await;
        if let Err(e) = self.recompute(guild).await {
            warn!(error = %e, guild_id = %guild, "failed to reschedule after closing post");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::testing::{post_in_forum, FakeDirectory, FORUM};
    use tokio::time::{sleep, Duration};

    const GUILD: GuildId = GuildId(1);

    fn scheduler(directory: &Arc<FakeDirectory>) -> Arc<ArchiveScheduler> {
        Arc::new(ArchiveScheduler::new(
            Arc::clone(directory) as Arc<dyn Directory>,
            FORUM,
        ))
    }

    fn days_ago(days: f64) -> OffsetDateTime {
        OffsetDateTime::now_utc() - time::Duration::seconds_f64(days * 86_400.0)
    }

    #[tokio::test(start_paused = true)]
    async fn stale_post_closed_immediately_fresh_post_armed() {
        let directory = Arc::new(FakeDirectory::new());
        let p1 = post_in_forum(101, 11, days_ago(30.0));
        let p2 = post_in_forum(102, 12, days_ago(30.0));
        directory.add_thread(GUILD, p1);
        directory.add_thread(GUILD, p2);
        directory.set_last_message(p1.id, days_ago(6.0));
        directory.set_last_message(p2.id, days_ago(7.5));

        let scheduler = scheduler(&directory);
        scheduler.schedule_next(GUILD, vec![p1, p2]).await;

        assert_eq!(directory.archived(), vec![(p2.id, true)]);
        let sent = directory.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, p2.id);
        assert!(sent[0].1.contains("<@!12>"));
        assert_eq!(scheduler.armed_post(GUILD).await, Some(p1.id));
    }

    #[tokio::test(start_paused = true)]
    async fn fired_timer_closes_post_and_reschedules() {
        let directory = Arc::new(FakeDirectory::new());
        let p1 = post_in_forum(101, 11, days_ago(30.0));
        let p2 = post_in_forum(102, 12, days_ago(30.0));
        directory.add_thread(GUILD, p1);
        directory.add_thread(GUILD, p2);
        // P1 expires in ten seconds, P2 in a day.
        directory.set_last_message(p1.id, days_ago(7.0) + time::Duration::seconds(10));
        directory.set_last_message(p2.id, days_ago(6.0));

        let scheduler = scheduler(&directory);
        scheduler.schedule_next(GUILD, vec![p1, p2]).await;
        assert_eq!(scheduler.armed_post(GUILD).await, Some(p1.id));

        sleep(Duration::from_secs(60)).await;

        assert_eq!(directory.archived(), vec![(p1.id, true)]);
        assert_eq!(scheduler.armed_post(GUILD).await, Some(p2.id));
    }

    #[tokio::test(start_paused = true)]
    async fn selection_prefers_minimal_remaining_then_lowest_id() {
        let directory = Arc::new(FakeDirectory::new());
        let near = post_in_forum(300, 11, days_ago(30.0));
        let far = post_in_forum(100, 12, days_ago(30.0));
        directory.set_last_message(near.id, days_ago(6.5));
        directory.set_last_message(far.id, days_ago(2.0));

        let scheduler = scheduler(&directory);
        scheduler.schedule_next(GUILD, vec![far, near]).await;
        assert_eq!(scheduler.armed_post(GUILD).await, Some(near.id));

        // Equal staleness: the lower id wins.
        let tied_at = days_ago(3.0);
        let a = post_in_forum(201, 11, days_ago(30.0));
        let b = post_in_forum(202, 12, days_ago(30.0));
        directory.set_last_message(a.id, tied_at);
        directory.set_last_message(b.id, tied_at);
        scheduler.schedule_next(GUILD, vec![b, a]).await;
        assert_eq!(scheduler.armed_post(GUILD).await, Some(a.id));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_timer() {
        let directory = Arc::new(FakeDirectory::new());
        let p1 = post_in_forum(101, 11, days_ago(30.0));
        directory.add_thread(GUILD, p1);
        directory.set_last_message(p1.id, days_ago(7.0) + time::Duration::seconds(10));

        let scheduler = scheduler(&directory);
        // Repeated guild-available style passes must not stack timers.
        scheduler.schedule_next(GUILD, vec![p1]).await;
        scheduler.schedule_next(GUILD, vec![p1]).await;
        scheduler.schedule_next(GUILD, vec![p1]).await;

        sleep(Duration::from_secs(120)).await;
        assert_eq!(directory.archived(), vec![(p1.id, true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_candidate_set_disarms() {
        let directory = Arc::new(FakeDirectory::new());
        let p1 = post_in_forum(101, 11, days_ago(30.0));
        directory.set_last_message(p1.id, days_ago(7.0) + time::Duration::seconds(10));

        let scheduler = scheduler(&directory);
        scheduler.schedule_next(GUILD, vec![p1]).await;
        assert!(scheduler.armed_post(GUILD).await.is_some());

        scheduler.schedule_next(GUILD, Vec::new()).await;
        assert_eq!(scheduler.armed_post(GUILD).await, None);

        sleep(Duration::from_secs(120)).await;
        assert!(directory.archived().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_pending_timer() {
        let directory = Arc::new(FakeDirectory::new());
        let p1 = post_in_forum(101, 11, days_ago(30.0));
        directory.set_last_message(p1.id, days_ago(7.0) + time::Duration::seconds(10));

        let scheduler = scheduler(&directory);
        scheduler.schedule_next(GUILD, vec![p1]).await;
        scheduler.cancel(GUILD).await;

        sleep(Duration::from_secs(120)).await;
        assert!(directory.archived().is_empty());
        assert!(directory.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn close_failures_are_swallowed() {
        let directory = Arc::new(FakeDirectory::new());
        directory.fail_writes();

        let scheduler = scheduler(&directory);
        scheduler.close_post(ChannelId(101), UserId(11)).await;
        assert!(directory.archived().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn archive_waits_for_notice_to_render() {
        let directory = Arc::new(FakeDirectory::new());
        let scheduler = scheduler(&directory);

        let close = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.close_post(ChannelId(101), UserId(11)).await }
        });

        // Notice goes out at once; the archive call waits out the delay.
        sleep(Duration::from_secs(1)).await;
        assert_eq!(directory.sent().len(), 1);
        assert!(directory.archived().is_empty());

        sleep(LOCK_DELAY).await;
        close.await.unwrap();
        assert_eq!(directory.archived(), vec![(ChannelId(101), true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn messageless_post_uses_creation_time() {
        let directory = Arc::new(FakeDirectory::new());
        // Created 7.5 days ago, no messages at all: already stale.
        let p1 = post_in_forum(101, 11, days_ago(7.5));
        directory.add_thread(GUILD, p1);

        let scheduler = scheduler(&directory);
        scheduler.schedule_next(GUILD, vec![p1]).await;
        assert_eq!(directory.archived(), vec![(p1.id, true)]);
        assert_eq!(scheduler.armed_post(GUILD).await, None);
    }
}
