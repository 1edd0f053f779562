//! Background task that flips stale presences offline.
//!
//! A user who updates their location between the stale-id selection and the
//! offline write of the same tick is flipped offline anyway. That lasts until
//! their next update and is accepted rather than serialised with extra locking.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::error::{LocatorError, LocatorResult};
use crate::services::PresenceStore;
use crate::utils::Config;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Online presences older than the cutoff.
    pub stale: usize,
    pub marked_offline: u64,
    /// Rows that could not be written even one at a time.
    pub failed: usize,
}

#[derive(Clone)]
pub struct PresenceSweeper {
    presences: PresenceStore,
    interval: Duration,
    stale_after: Duration,
    stop_grace: Duration,
}

impl PresenceSweeper {
    pub fn new(presences: PresenceStore, interval: Duration, stale_after: Duration, stop_grace: Duration) -> Self {
        Self {
            presences,
            interval,
            stale_after,
            stop_grace,
        }
    }

    pub fn from_config(presences: PresenceStore, config: &Config) -> Self {
        Self::new(
            presences,
            config.sweep_interval(),
            config.presence_stale_after(),
            config.sweeper_stop_grace(),
        )
    }

    /// One pass: everything online and last seen before `now - stale_after`
    /// goes offline. A failed bulk write is retried row by row so a single bad
    /// row cannot hold back the rest.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> LocatorResult<SweepReport> {
        let stale_after = TimeDelta::from_std(self.stale_after)
            .map_err(|e| LocatorError::InvalidArgument(format!("stale threshold out of range: {}", e)))?;
        let cutoff = now - stale_after;

        let stale_ids = self.presences.stale_online_ids(cutoff).await?;
        let mut report = SweepReport {
            stale: stale_ids.len(),
            ..SweepReport::default()
        };
        if stale_ids.is_empty() {
            return Ok(report);
        }

        match self.presences.mark_offline(&stale_ids).await {
            Ok(touched) => report.marked_offline = touched,
            Err(e) => {
                warn!("Bulk offline update failed, retrying per user: {}", e);
                for user_id in &stale_ids {
                    match self.presences.mark_offline(std::slice::from_ref(user_id)).await {
                        Ok(touched) => report.marked_offline += touched,
                        Err(e) => {
                            error!("Failed to mark {} offline: {}", user_id, e);
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    async fn tick(&self) {
        match self.sweep_once(Utc::now()).await {
            Ok(report) if report.stale > 0 => info!(
                "🧹 Sweep marked {} of {} stale presences offline ({} failed)",
                report.marked_offline, report.stale, report.failed
            ),
            Ok(_) => {}
            Err(e) => error!("Presence sweep failed: {}", e),
        }
    }

    /// Spawns the loop. The first sweep runs immediately, then one every
    /// interval.
    pub fn start(self) -> SweeperHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let stop_grace = self.stop_grace;

        let task = tokio::spawn(async move {
            info!(
                "Presence sweeper started (interval {:?}, stale after {:?})",
                self.interval, self.stale_after
            );
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    // A closed channel also means stop.
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => self.tick().await,
                }
            }
            info!("Presence sweeper stopped");
        });

        SweeperHandle {
            stop_tx,
            task,
            stop_grace,
        }
    }
}

pub struct SweeperHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    stop_grace: Duration,
}

impl SweeperHandle {
    /// Signals the loop and waits for an in-flight sweep to finish. Past the
    /// grace period the task is aborted.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);

        match time::timeout(self.stop_grace, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Presence sweeper task failed: {}", e),
            Err(_) => {
                warn!(
                    "Presence sweeper did not stop within {:?}, aborting",
                    self.stop_grace
                );
                self.task.abort();
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        FriendRepository, MemoryStore, PresenceRepository, StoreError, StoreResult, UserDirectory,
        VisibilityRepository,
    };
    use crate::models::{
        AccuracyTier, FriendPair, FriendRequest, Friendship, Page, Presence, PresenceUpdate,
        StoredSettings, UserId, UserProfile, VisibilityMode,
    };
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use uuid::Uuid;

    const MINUTE: Duration = Duration::from_secs(60);

    fn presence_store() -> PresenceStore {
        PresenceStore::new(Arc::new(MemoryStore::new()))
    }

    fn sweeper(presences: &PresenceStore, interval: Duration) -> PresenceSweeper {
        PresenceSweeper::new(presences.clone(), interval, 15 * MINUTE, Duration::from_secs(5))
    }

    async fn seen_at(presences: &PresenceStore, user_id: UserId, at: DateTime<Utc>) {
        let update = PresenceUpdate {
            user_id,
            latitude: 47.0,
            longitude: 19.0,
            accuracy_meters: None,
            is_available: true,
            status: String::new(),
        };
        presences.upsert_at(&update, at).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_presence_goes_offline() {
        let presences = presence_store();
        let now = Utc::now();
        let (stale, fresh) = (Uuid::new_v4(), Uuid::new_v4());
        seen_at(&presences, stale, now - TimeDelta::minutes(20)).await;
        seen_at(&presences, fresh, now - TimeDelta::minutes(5)).await;

        let report = sweeper(&presences, 5 * MINUTE).sweep_once(now).await.unwrap();
        assert_eq!(report, SweepReport { stale: 1, marked_offline: 1, failed: 0 });

        let swept = presences.get(stale).await.unwrap();
        assert!(!swept.is_online);
        assert!(!swept.is_available);
        assert!(presences.get(fresh).await.unwrap().is_online);

        // Nothing left to do on the next pass.
        let again = sweeper(&presences, 5 * MINUTE).sweep_once(now).await.unwrap();
        assert_eq!(again, SweepReport::default());
    }

    /// Memory store whose bulk offline write always fails, as does any write
    /// touching `poisoned`.
    struct FlakyOffline {
        inner: MemoryStore,
        poisoned: UserId,
    }

    #[async_trait]
    impl PresenceRepository for FlakyOffline {
        async fn upsert_presence(&self, update: &PresenceUpdate, now: DateTime<Utc>) -> StoreResult<Presence> {
            self.inner.upsert_presence(update, now).await
        }

        async fn presence_of(&self, user_id: UserId) -> StoreResult<Option<Presence>> {
            self.inner.presence_of(user_id).await
        }

        async fn online_presences_except(&self, viewer_id: UserId) -> StoreResult<Vec<Presence>> {
            self.inner.online_presences_except(viewer_id).await
        }

        async fn stale_online_ids(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<UserId>> {
            self.inner.stale_online_ids(cutoff).await
        }

        async fn mark_offline(&self, user_ids: &[UserId]) -> StoreResult<u64> {
            if user_ids.len() > 1 || user_ids.contains(&self.poisoned) {
                return Err(StoreError::Consistency("offline write refused".to_string()));
            }
            self.inner.mark_offline(user_ids).await
        }
    }

    #[async_trait]
    impl FriendRepository for FlakyOffline {
        async fn friendship_exists(&self, pair: FriendPair) -> StoreResult<bool> {
            self.inner.friendship_exists(pair).await
        }

        async fn delete_friendship(&self, pair: FriendPair) -> StoreResult<bool> {
            self.inner.delete_friendship(pair).await
        }

        async fn friend_ids_of(&self, user_id: UserId) -> StoreResult<HashSet<UserId>> {
            self.inner.friend_ids_of(user_id).await
        }

        async fn list_friendships(&self, user_id: UserId, page: Page) -> StoreResult<Vec<Friendship>> {
            self.inner.list_friendships(user_id, page).await
        }

        async fn pending_request_between(
            &self,
            first: UserId,
            second: UserId,
        ) -> StoreResult<Option<FriendRequest>> {
            self.inner.pending_request_between(first, second).await
        }

        async fn insert_request(
            &self,
            sender_id: UserId,
            receiver_id: UserId,
            now: DateTime<Utc>,
        ) -> StoreResult<FriendRequest> {
            self.inner.insert_request(sender_id, receiver_id, now).await
        }

        async fn accept_request(
            &self,
            request_id: Uuid,
            receiver_id: UserId,
            now: DateTime<Utc>,
        ) -> StoreResult<Option<FriendRequest>> {
            self.inner.accept_request(request_id, receiver_id, now).await
        }

        async fn reject_request(
            &self,
            request_id: Uuid,
            receiver_id: UserId,
            now: DateTime<Utc>,
        ) -> StoreResult<Option<FriendRequest>> {
            self.inner.reject_request(request_id, receiver_id, now).await
        }

        async fn pending_received(&self, user_id: UserId, page: Page) -> StoreResult<Vec<FriendRequest>> {
            self.inner.pending_received(user_id, page).await
        }

        async fn pending_sent(&self, user_id: UserId, page: Page) -> StoreResult<Vec<FriendRequest>> {
            self.inner.pending_sent(user_id, page).await
        }
    }

    #[async_trait]
    impl VisibilityRepository for FlakyOffline {
        async fn settings_for(&self, user_id: UserId) -> StoreResult<Option<StoredSettings>> {
            self.inner.settings_for(user_id).await
        }

        async fn settings_for_many(&self, user_ids: &[UserId]) -> StoreResult<Vec<StoredSettings>> {
            self.inner.settings_for_many(user_ids).await
        }

        async fn allow_list(&self, owner_id: UserId) -> StoreResult<HashSet<UserId>> {
            self.inner.allow_list(owner_id).await
        }

        async fn allow_lists_for(
            &self,
            owner_ids: &[UserId],
        ) -> StoreResult<HashMap<UserId, HashSet<UserId>>> {
            self.inner.allow_lists_for(owner_ids).await
        }

        async fn save_settings(
            &self,
            user_id: UserId,
            mode: VisibilityMode,
            accuracy: AccuracyTier,
            allow_list: Option<&HashSet<UserId>>,
            now: DateTime<Utc>,
        ) -> StoreResult<()> {
            self.inner.save_settings(user_id, mode, accuracy, allow_list, now).await
        }

        async fn save_accuracy(
            &self,
            user_id: UserId,
            accuracy: AccuracyTier,
            now: DateTime<Utc>,
        ) -> StoreResult<()> {
            self.inner.save_accuracy(user_id, accuracy, now).await
        }
    }

    #[async_trait]
    impl UserDirectory for FlakyOffline {
        async fn profiles(&self, user_ids: &[UserId]) -> StoreResult<HashMap<UserId, UserProfile>> {
            self.inner.profiles(user_ids).await
        }

        async fn user_exists(&self, user_id: UserId) -> StoreResult<bool> {
            self.inner.user_exists(user_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_bulk_write_falls_back_per_user() {
        let now = Utc::now();
        let stale: Vec<UserId> = (0..3).map(|_| Uuid::new_v4()).collect();
        let presences = PresenceStore::new(Arc::new(FlakyOffline {
            inner: MemoryStore::new(),
            poisoned: stale[1],
        }));
        for user in &stale {
            seen_at(&presences, *user, now - TimeDelta::minutes(20)).await;
        }

        let report = sweeper(&presences, 5 * MINUTE).sweep_once(now).await.unwrap();
        assert_eq!(report, SweepReport { stale: 3, marked_offline: 2, failed: 1 });

        assert!(!presences.get(stale[0]).await.unwrap().is_online);
        assert!(presences.get(stale[1]).await.unwrap().is_online);
        assert!(!presences.get(stale[2]).await.unwrap().is_online);
    }

    #[tokio::test]
    async fn test_update_after_sweep_brings_user_back() {
        let presences = presence_store();
        let now = Utc::now();
        let user = Uuid::new_v4();
        seen_at(&presences, user, now - TimeDelta::minutes(30)).await;
        sweeper(&presences, 5 * MINUTE).sweep_once(now).await.unwrap();

        seen_at(&presences, user, now).await;
        assert!(presences.get(user).await.unwrap().is_online);
    }

    #[tokio::test]
    async fn test_started_sweeper_runs_immediately_and_stops() {
        let presences = presence_store();
        let user = Uuid::new_v4();
        seen_at(&presences, user, Utc::now() - TimeDelta::hours(1)).await;

        // Interval far longer than the test: only the immediate sweep can run.
        let handle = sweeper(&presences, 60 * MINUTE).start();

        let swept = time::timeout(Duration::from_secs(5), async {
            loop {
                if !presences.get(user).await.unwrap().is_online {
                    break;
                }
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(swept.is_ok(), "sweeper did not run its first pass");

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_before_first_tick_completes() {
        let presences = presence_store();
        let handle = sweeper(&presences, 60 * MINUTE).start();
        handle.stop().await;
    }
}
