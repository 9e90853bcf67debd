//! Moderation use case
//!
//! A member reports another member of their community. The report snapshot
//! is stored on the community leader, the target loses reputation, and the
//! target is told about it by a best-effort notification that runs
//! detached from the caller. Short-lived processes call
//! [`ModerationService::flush_notifications`] before exiting.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::{
    booking::DEFAULT_STORE_TIMEOUT,
    error::{guarded, LendingError, LendingResult},
};
use crate::{
    domain::{ModerationReport, Reputation, User, UserId},
    ports::{IIdentityStore, INotifier, Notification},
};

/// Default reputation removed from a reported user
pub const DEFAULT_REPORT_PENALTY: u8 = 10;

/// What a successful report produced
#[derive(Debug, Clone, Serialize)]
pub struct ReportReceipt {
    /// The stored snapshot
    pub report: ModerationReport,
    /// Leader the report was filed with
    pub leader_id: UserId,
    /// Target's reputation after the penalty
    pub target_reputation: Reputation,
}

/// Use case for filing moderation reports
pub struct ModerationService {
    identity: Arc<dyn IIdentityStore + Send + Sync>,
    notifier: Arc<dyn INotifier + Send + Sync>,
    store_timeout: Duration,
    penalty: i32,
    notifications: TaskTracker,
}

impl ModerationService {
    pub fn new(
        identity: Arc<dyn IIdentityStore + Send + Sync>,
        notifier: Arc<dyn INotifier + Send + Sync>,
    ) -> Self {
        Self {
            identity,
            notifier,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            penalty: i32::from(DEFAULT_REPORT_PENALTY),
            notifications: TaskTracker::new(),
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_penalty(mut self, points: u8) -> Self {
        self.penalty = i32::from(points);
        self
    }

    /// Files a report by `reporter_id` against `target_id`
    ///
    /// The notification to the target is spawned and not awaited here; its
    /// failure is logged and does not undo the report.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the reporter or target does not exist, or the
    ///   reporter's community has no leader
    /// - `InvalidInput` for a blank or overlong reason, or a self-report
    pub async fn report(
        &self,
        reporter_id: &UserId,
        target_id: &UserId,
        reason: &str,
    ) -> LendingResult<ReportReceipt> {
        let reporter = self.load_user(reporter_id, "Reporter").await?;
        let target = self.load_user(target_id, "Reported user").await?;
        let report = ModerationReport::new(&reporter, &target, reason)?;

        let leader = guarded(
            self.store_timeout,
            "find community leader",
            self.identity.find_leader(reporter.community_id()),
        )
        .await?
        .ok_or_else(|| {
            LendingError::not_found(format!(
                "Community {} has no leader to receive reports",
                reporter.community_id()
            ))
        })?;

        let target_reputation = guarded(
            self.store_timeout,
            "file report",
            self.identity.file_report(leader.id(), &report, self.penalty),
        )
        .await?
        .ok_or_else(|| LendingError::not_found(format!("User {target_id} not found")))?;

        info!(
            reporter = %reporter_id,
            target = %target_id,
            leader = %leader.id(),
            reputation = target_reputation.value(),
            "Report filed"
        );

        self.dispatch(Notification::new(
            target.email().clone(),
            "You have been reported",
            format!(
                "Hello {},\n\nA member of the {} community reported you:\n\n{}\n\n\
                 Your reputation is now {}/100. Contact your community leader, {}, \
                 if you think this is a mistake.",
                target.name(),
                target.community_id(),
                report.reason(),
                target_reputation,
                leader.name()
            ),
        ));

        Ok(ReportReceipt {
            report,
            leader_id: *leader.id(),
            target_reputation,
        })
    }

    /// Waits up to `limit` for spawned notifications to finish
    ///
    /// Returns `false` if some were still running when `limit` elapsed;
    /// those keep running for as long as the runtime does.
    pub async fn flush_notifications(&self, limit: Duration) -> bool {
        if self.notifications.is_empty() {
            return true;
        }

        self.notifications.close();
        let finished = tokio::time::timeout(limit, self.notifications.wait())
            .await
            .is_ok();
        self.notifications.reopen();

        if !finished {
            warn!(
                pending = self.notifications.len(),
                "Report notifications still in flight at shutdown"
            );
        }
        finished
    }

    fn dispatch(&self, notification: Notification) {
        let notifier = Arc::clone(&self.notifier);
        self.notifications.spawn(async move {
            match notifier.notify(&notification).await {
                Ok(()) => debug!(recipient = %notification.recipient, "Report notification sent"),
                Err(e) => warn!(
                    recipient = %notification.recipient,
                    error = %format!("{e:#}"),
                    "Report notification failed"
                ),
            }
        });
    }

    async fn load_user(&self, id: &UserId, role: &str) -> LendingResult<User> {
        guarded(self.store_timeout, "load user", self.identity.get_user(id))
            .await?
            .ok_or_else(|| LendingError::not_found(format!("{role} {id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        error::ErrorKind,
        testing::{MemoryStore, RecordingNotifier},
    };

    #[tokio::test]
    async fn test_report_penalizes_stores_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        let leader = store.add_user("Lena", "riverside", Reputation::default());
        store.make_leader(leader.id());
        let reporter = store.add_user("Ana", "riverside", Reputation::default());
        let target = store.add_user("Ugo", "riverside", Reputation::default());
        let (notifier, mut sent) = RecordingNotifier::new();

        let receipt = ModerationService::new(store.clone(), Arc::new(notifier))
            .report(reporter.id(), target.id(), "Returned the drill broken")
            .await
            .unwrap();

        assert_eq!(receipt.target_reputation.value(), 40);
        assert_eq!(receipt.leader_id, *leader.id());
        assert_eq!(store.user(target.id()).unwrap().reputation().value(), 40);

        let leader = store.user(leader.id()).unwrap();
        assert_eq!(leader.reports().len(), 1);
        assert_eq!(leader.reports()[0].target().name, "Ugo");
        assert_eq!(leader.reports()[0].reporter_name(), "Ana");

        let notification = tokio::time::timeout(Duration::from_secs(1), sent.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notification.recipient, *target.email());
        assert!(notification.body.contains("Returned the drill broken"));
    }

    struct SlowNotifier {
        delivered: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait::async_trait]
    impl INotifier for SlowNotifier {
        async fn notify(&self, _notification: &Notification) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.delivered
                .store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_flushed_notification_survives_runtime_shutdown() {
        let delivered = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let flushed = runtime.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let leader = store.add_user("Lena", "riverside", Reputation::default());
            store.make_leader(leader.id());
            let reporter = store.add_user("Ana", "riverside", Reputation::default());
            let target = store.add_user("Ugo", "riverside", Reputation::default());
            let service = ModerationService::new(
                store,
                Arc::new(SlowNotifier {
                    delivered: delivered.clone(),
                }),
            );

            service
                .report(reporter.id(), target.id(), "Kept the tent")
                .await
                .unwrap();
            service.flush_notifications(Duration::from_secs(1)).await
        });
        drop(runtime);

        assert!(flushed);
        assert!(delivered.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_flush_with_nothing_pending() {
        let store = Arc::new(MemoryStore::new());
        let (notifier, _sent) = RecordingNotifier::new();
        let service = ModerationService::new(store, Arc::new(notifier));
        assert!(service.flush_notifications(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_report_penalty_clamps_at_zero() {
        let store = Arc::new(MemoryStore::new());
        let leader = store.add_user("Lena", "riverside", Reputation::default());
        store.make_leader(leader.id());
        let reporter = store.add_user("Ana", "riverside", Reputation::default());
        let target = store.add_user("Ugo", "riverside", Reputation::new(5).unwrap());
        let (notifier, _sent) = RecordingNotifier::new();

        let receipt = ModerationService::new(store.clone(), Arc::new(notifier))
            .report(reporter.id(), target.id(), "No-show")
            .await
            .unwrap();

        assert_eq!(receipt.target_reputation, Reputation::MIN);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_report() {
        let store = Arc::new(MemoryStore::new());
        let leader = store.add_user("Lena", "riverside", Reputation::default());
        store.make_leader(leader.id());
        let reporter = store.add_user("Ana", "riverside", Reputation::default());
        let target = store.add_user("Ugo", "riverside", Reputation::default());
        let (notifier, mut sent) = RecordingNotifier::failing();

        let result = ModerationService::new(store.clone(), Arc::new(notifier))
            .report(reporter.id(), target.id(), "Rude")
            .await;

        assert!(result.is_ok());
        tokio::time::timeout(Duration::from_secs(1), sent.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.user(target.id()).unwrap().reputation().value(), 40);
    }

    #[tokio::test]
    async fn test_report_without_leader_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let reporter = store.add_user("Ana", "riverside", Reputation::default());
        let target = store.add_user("Ugo", "riverside", Reputation::default());
        let (notifier, _sent) = RecordingNotifier::new();

        let err = ModerationService::new(store.clone(), Arc::new(notifier))
            .report(reporter.id(), target.id(), "Rude")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.user(target.id()).unwrap().reputation().value(), 50);
    }

    #[tokio::test]
    async fn test_report_rejects_bad_input() {
        let store = Arc::new(MemoryStore::new());
        let leader = store.add_user("Lena", "riverside", Reputation::default());
        store.make_leader(leader.id());
        let reporter = store.add_user("Ana", "riverside", Reputation::default());
        let (notifier, _sent) = RecordingNotifier::new();
        let service = ModerationService::new(store.clone(), Arc::new(notifier));

        let err = service
            .report(reporter.id(), leader.id(), "   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = service
            .report(reporter.id(), reporter.id(), "myself")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = service
            .report(reporter.id(), &UserId::new(), "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
