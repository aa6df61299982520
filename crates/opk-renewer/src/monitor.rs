//! Identity status monitoring
//!
//! Presentation shells poll the identity age on a timer and tell the user
//! when it needs attention. Each condition is reported once until the
//! identity becomes valid again or `reset` is called after a renewal.

use std::future::Future;
use std::time::Duration;

use opk_core::{CredentialStore, IdentityAge, IdentityStatus};

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short title
    pub title: String,
    /// Body text
    pub body: String,
}

impl Notification {
    fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
        }
    }
}

/// Delivers notifications to the user
pub trait Notifier: Send + Sync {
    /// Show `notification`
    fn notify(&self, notification: &Notification);
}

/// Notifier writing to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::warn!("{}: {}", notification.title, notification.body);
    }
}

/// Classifies identity ages and decides when to notify
#[derive(Debug, Clone)]
pub struct StatusMonitor {
    max_age: Duration,
    validity: Duration,
    missing_notified: bool,
    expired_notified: bool,
    near_expiry_notified: bool,
}

impl StatusMonitor {
    /// Monitor for identities renewed at `max_age` and valid for `validity`
    pub fn new(max_age: Duration, validity: Duration) -> Self {
        Self {
            max_age,
            validity,
            missing_notified: false,
            expired_notified: false,
            near_expiry_notified: false,
        }
    }

    /// Classify `age`, returning a notification the first time a state is seen
    pub fn observe(&mut self, age: IdentityAge) -> (IdentityStatus, Option<Notification>) {
        let status = IdentityStatus::classify(age, self.max_age, self.validity);

        let notification = match status {
            IdentityStatus::Missing => {
                Self::once(&mut self.missing_notified).then(|| {
                    Notification::new("Identity missing", "No SSH identity was found, please renew")
                })
            }
            IdentityStatus::Expired => Self::once(&mut self.expired_notified).then(|| {
                Notification::new(
                    "Identity expired",
                    "The SSH identity has expired and should be renewed",
                )
            }),
            IdentityStatus::NearExpiry { .. } => {
                Self::once(&mut self.near_expiry_notified).then(|| {
                    Notification::new(
                        "Identity nearly expired",
                        "The SSH identity is close to expiry and should be renewed soon",
                    )
                })
            }
            IdentityStatus::Valid { .. } => {
                self.reset();
                None
            }
        };

        (status, notification)
    }

    /// Re-arm every notification, after a successful renewal
    pub fn reset(&mut self) {
        self.missing_notified = false;
        self.expired_notified = false;
        self.near_expiry_notified = false;
    }

    fn once(flag: &mut bool) -> bool {
        !std::mem::replace(flag, true)
    }
}

/// Poll the age of `name` every `interval` until `shutdown` completes.
///
/// Stat failures are logged and polling continues. The watcher never
/// renews on its own.
pub async fn watch<F>(
    store: &CredentialStore,
    name: &str,
    monitor: &mut StatusMonitor,
    notifier: &dyn Notifier,
    interval: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Stopping identity watch");
                break;
            }
            _ = ticker.tick() => {
                match store.age(name) {
                    Ok(age) => {
                        let (status, notification) = monitor.observe(age);
                        tracing::info!(name, status = %status, "{}", status.description());
                        if let Some(notification) = notification {
                            notifier.notify(&notification);
                        }
                    }
                    Err(e) => tracing::error!("Failed to check identity {}: {}", name, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn monitor() -> StatusMonitor {
        StatusMonitor::new(23 * HOUR, 24 * HOUR)
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) {
            self.seen.lock().unwrap().push(notification.clone());
        }
    }

    #[test]
    fn test_missing_notifies_once() {
        let mut monitor = monitor();

        let (status, first) = monitor.observe(IdentityAge::Missing);
        assert_eq!(status, IdentityStatus::Missing);
        assert_eq!(first.unwrap().title, "Identity missing");

        let (_, second) = monitor.observe(IdentityAge::Missing);
        assert!(second.is_none());
    }

    #[test]
    fn test_each_state_notifies_separately() {
        let mut monitor = monitor();

        let (_, near) = monitor.observe(IdentityAge::Present(23 * HOUR + HOUR / 2));
        assert_eq!(near.unwrap().title, "Identity nearly expired");

        let (_, expired) = monitor.observe(IdentityAge::Present(25 * HOUR));
        assert_eq!(expired.unwrap().title, "Identity expired");

        let (_, again) = monitor.observe(IdentityAge::Present(26 * HOUR));
        assert!(again.is_none());
    }

    #[test]
    fn test_reset_rearms() {
        let mut monitor = monitor();
        assert!(monitor.observe(IdentityAge::Missing).1.is_some());

        monitor.reset();
        assert!(monitor.observe(IdentityAge::Missing).1.is_some());
    }

    #[test]
    fn test_valid_identity_rearms_silently() {
        let mut monitor = monitor();
        assert!(monitor.observe(IdentityAge::Present(25 * HOUR)).1.is_some());

        let (status, notification) = monitor.observe(IdentityAge::Present(HOUR));
        assert!(matches!(status, IdentityStatus::Valid { .. }));
        assert!(notification.is_none());

        assert!(monitor.observe(IdentityAge::Present(25 * HOUR)).1.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_notifies_once_and_stops() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path());
        let notifier = RecordingNotifier::default();
        let mut monitor = monitor();

        watch(
            &store,
            "id_opkssh",
            &mut monitor,
            &notifier,
            Duration::from_secs(60),
            tokio::time::sleep(Duration::from_secs(300)),
        )
        .await;

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].title, "Identity missing");
    }
}
