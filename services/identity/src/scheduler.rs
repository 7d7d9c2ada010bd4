//! Periodic key rotation and purge.

use crate::error::{IdentityError, IdentityResult};
use crate::keys::{KeyManager, RotationOutcome};
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

/// Runs rotation, and optionally purge, on fixed intervals.
#[derive(Debug, Clone)]
pub struct RotationScheduler {
    keys: Arc<KeyManager>,
    rotation_interval: Duration,
    purge_interval: Option<Duration>,
}

impl RotationScheduler {
    /// Create a scheduler. Purging is disabled when `purge_interval` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Config`] if either interval is zero.
    pub fn new(
        keys: Arc<KeyManager>,
        rotation_interval: Duration,
        purge_interval: Option<Duration>,
    ) -> IdentityResult<Self> {
        if rotation_interval.is_zero() {
            return Err(IdentityError::config("rotation interval must be positive"));
        }
        if purge_interval.is_some_and(|d| d.is_zero()) {
            return Err(IdentityError::config("purge interval must be positive"));
        }
        Ok(Self {
            keys,
            rotation_interval,
            purge_interval,
        })
    }

    /// Spawn the loops on the coordinator. The first run of each loop
    /// happens one full interval after start.
    pub fn start(&self, coordinator: &mut ShutdownCoordinator) {
        let keys = Arc::clone(&self.keys);
        let every = self.rotation_interval;
        coordinator.spawn("key-rotation", move |signal| rotation_loop(keys, every, signal));

        if let Some(every) = self.purge_interval {
            let keys = Arc::clone(&self.keys);
            coordinator.spawn("key-purge", move |signal| purge_loop(keys, every, signal));
        }
        info!(
            rotation_secs = self.rotation_interval.as_secs(),
            purge_secs = self.purge_interval.map(|d| d.as_secs()),
            "Key rotation scheduler started"
        );
    }
}

async fn rotation_loop(keys: Arc<KeyManager>, every: Duration, mut signal: ShutdownSignal) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match keys.rotate(Utc::now()).await {
                    Ok(RotationOutcome::Generated(pair)) => info!(kid = %pair.id, "Scheduled key rotation completed"),
                    Ok(RotationOutcome::AlreadySatisfied { kid }) => info!(kid = %kid, "Scheduled key rotation already served"),
                    Err(e) => error!(error = %e, "Scheduled key rotation failed"),
                }
            }
            () = signal.recv() => break,
        }
    }
}

async fn purge_loop(keys: Arc<KeyManager>, every: Duration, mut signal: ShutdownSignal) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = keys.delete_all_but_newest().await {
                    error!(error = %e, "Scheduled key purge failed");
                }
            }
            () = signal.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TextEncryptor;
    use crate::keys::store::InMemoryKeyStore;
    use secrecy::SecretString;

    fn manager() -> Arc<KeyManager> {
        let encryptor =
            TextEncryptor::new(&SecretString::from("scheduler-secret"), "5c0744940b5c369b").unwrap();
        Arc::new(KeyManager::new(Arc::new(InMemoryKeyStore::new()), Arc::new(encryptor)))
    }

    #[tokio::test]
    async fn test_purge_loop_keeps_newest() {
        let keys = manager();
        for _ in 0..2 {
            let material = keys.generate().unwrap();
            keys.save(&material).await.unwrap();
        }
        let newest = keys.find_newest().await.unwrap().id;

        let mut coordinator = ShutdownCoordinator::new();
        RotationScheduler::new(Arc::clone(&keys), Duration::from_secs(3600), Some(Duration::from_millis(20)))
            .unwrap()
            .start(&mut coordinator);
        assert_eq!(coordinator.task_count(), 2);

        tokio::time::sleep(Duration::from_millis(200)).await;
        coordinator.shutdown(Duration::from_secs(1)).await;

        assert_eq!(keys.count().await.unwrap(), 1);
        assert_eq!(keys.find_newest().await.unwrap().id, newest);
    }

    #[tokio::test]
    async fn test_rotation_only_without_purge_interval() {
        let mut coordinator = ShutdownCoordinator::new();
        RotationScheduler::new(manager(), Duration::from_secs(3600), None)
            .unwrap()
            .start(&mut coordinator);
        assert_eq!(coordinator.task_count(), 1);
        coordinator.shutdown(Duration::from_secs(1)).await;
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let err = RotationScheduler::new(manager(), Duration::ZERO, None).unwrap_err();
        assert!(matches!(err, IdentityError::Config(_)));

        let err = RotationScheduler::new(manager(), Duration::from_secs(60), Some(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, IdentityError::Config(_)));
    }
}
