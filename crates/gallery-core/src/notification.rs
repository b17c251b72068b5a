//! Single-surface status notifications
//!
//! One notice is visible at a time and the last writer wins. Pipelines show
//! progress, success and error notices through [`NotificationChannel`]; the
//! host renders them through a [`NotificationSink`].

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// Work in progress
    Info,
    /// Operation finished
    Success,
    /// Operation failed
    Error,
}

/// Visible notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Severity
    pub kind: NoticeKind,
    /// Message shown to the user
    pub message: String,
    /// Percent complete, 0 to 100
    pub progress: Option<u8>,
}

/// Host surface that renders the current notice
///
/// `None` means the surface is hidden. Implementations must not call back
/// into the channel.
pub trait NotificationSink: Send + Sync {
    /// Render the current state of the surface
    fn render(&self, notice: Option<&Notification>);
}

#[derive(Debug, Default)]
struct Surface {
    current: Option<Notification>,
    generation: u64,
}

/// Shared notification surface
pub struct NotificationChannel {
    sink: Arc<dyn NotificationSink>,
    surface: Mutex<Surface>,
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("surface", &*self.surface.lock())
            .finish_non_exhaustive()
    }
}

impl NotificationChannel {
    /// Create channel rendering into `sink`
    #[inline]
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            surface: Mutex::new(Surface::default()),
        }
    }

    /// Show a notice, replacing whatever is visible
    ///
    /// Returns the generation of the new notice, used by [`Self::hide_if_current`].
    pub fn show(&self, kind: NoticeKind, message: impl Into<String>, progress: Option<u8>) -> u64 {
        let mut surface = self.surface.lock();
        surface.generation += 1;
        surface.current = Some(Notification {
            kind,
            message: message.into(),
            progress: progress.map(|p| p.min(100)),
        });
        self.sink.render(surface.current.as_ref());
        surface.generation
    }

    /// Show an info notice with progress
    #[inline]
    pub fn progress(&self, message: impl Into<String>, percent: u8) -> u64 {
        self.show(NoticeKind::Info, message, Some(percent))
    }

    /// Show an error notice
    #[inline]
    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.show(NoticeKind::Error, message, None)
    }

    /// Hide the surface
    pub fn hide(&self) {
        let mut surface = self.surface.lock();
        surface.generation += 1;
        surface.current = None;
        self.sink.render(None);
    }

    /// Hide the surface only if `generation` is still the visible notice
    pub fn hide_if_current(&self, generation: u64) -> bool {
        let mut surface = self.surface.lock();
        if surface.generation != generation || surface.current.is_none() {
            return false;
        }
        surface.generation += 1;
        surface.current = None;
        self.sink.render(None);
        true
    }

    /// Show a success notice that hides itself after `delay`
    ///
    /// Must be called within a tokio runtime.
    pub fn success_transient(self: &Arc<Self>, message: impl Into<String>, delay: Duration) -> u64 {
        let generation = self.show(NoticeKind::Success, message, None);
        let channel = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if channel.hide_if_current(generation) {
                tracing::trace!(generation, "auto-hid notice");
            }
        });
        generation
    }

    /// Currently visible notice
    #[must_use]
    pub fn current(&self) -> Option<Notification> {
        self.surface.lock().current.clone()
    }
}

/// Percent complete for a progress callback, rounded and clamped to 0..=100
///
/// An empty upload counts as complete.
#[must_use]
pub fn percent(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = (u128::from(loaded.min(total)) * 200 + u128::from(total)) / (u128::from(total) * 2);
    u8::try_from(scaled).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Option<Notification>>>);

    impl NotificationSink for Recorder {
        fn render(&self, notice: Option<&Notification>) {
            self.0.lock().push(notice.cloned());
        }
    }

    fn channel() -> (Arc<NotificationChannel>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let channel = Arc::new(NotificationChannel::new(recorder.clone()));
        (channel, recorder)
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(1, 200), 1);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(200, 200), 100);
        assert_eq!(percent(500, 200), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn last_writer_wins() {
        let (channel, recorder) = channel();
        channel.progress("Uploading a.jpg...", 10);
        channel.error("Error replacing b.jpg.");

        let current = channel.current().unwrap();
        assert_eq!(current.kind, NoticeKind::Error);
        assert_eq!(current.message, "Error replacing b.jpg.");
        assert_eq!(recorder.0.lock().len(), 2);
    }

    #[test]
    fn stale_generation_does_not_hide_newer_notice() {
        let (channel, _) = channel();
        let first = channel.show(NoticeKind::Success, "done", None);
        channel.progress("Uploading b.jpg...", 0);

        assert!(!channel.hide_if_current(first));
        assert!(channel.current().is_some());
    }

    #[test]
    fn hide_renders_none() {
        let (channel, recorder) = channel();
        channel.error("boom");
        channel.hide();
        assert_eq!(channel.current(), None);
        assert_eq!(recorder.0.lock().last(), Some(&None));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_success_hides_after_delay() {
        let (channel, _) = channel();
        channel.success_transient("Uploaded a.jpg successfully.", Duration::from_secs(3));

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert!(channel.current().is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(channel.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_success_spares_a_later_notice() {
        let (channel, _) = channel();
        channel.success_transient("Uploaded a.jpg successfully.", Duration::from_secs(3));
        channel.progress("Uploading b.jpg...", 40);

        tokio::time::sleep(Duration::from_secs(4)).await;
        tokio::task::yield_now().await;
        assert_eq!(channel.current().unwrap().progress, Some(40));
    }
}
