//! Deadline queue for coalescing file change events.
//!
//! Each event pushes the path's fire deadline a full window into the future,
//! so editor save bursts and atomic-rename rewrites settle into a single
//! re-index. The queue exposes its earliest deadline so the watcher loop can
//! sleep exactly until something is due instead of polling.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct DebounceQueue {
    window: Duration,
    /// Path -> the instant its re-index becomes due.
    deadlines: HashMap<PathBuf, Instant>,
}

impl DebounceQueue {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    /// Note a change event: the path's deadline moves to one full window
    /// from now, superseding any earlier deadline.
    pub fn push(&mut self, path: PathBuf) {
        self.schedule(path, Instant::now());
    }

    fn schedule(&mut self, path: PathBuf, now: Instant) {
        self.deadlines.insert(path, now + self.window);
    }

    /// Forget a path, e.g. because it was deleted before its deadline.
    pub fn discard(&mut self, path: &Path) {
        self.deadlines.remove(path);
    }

    /// Earliest pending deadline; the loop sleeps until this.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return one path whose deadline has passed at `now`.
    /// Call in a loop to collect everything due.
    pub fn pop_due(&mut self, now: Instant) -> Option<PathBuf> {
        let due = self
            .deadlines
            .iter()
            .find(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())?;
        self.deadlines.remove(&due);
        Some(due)
    }

    /// Drop every pending deadline without firing. Used on stop.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    fn queue() -> DebounceQueue {
        DebounceQueue::new(WINDOW)
    }

    #[test]
    fn test_nothing_due_inside_window() {
        let mut queue = queue();
        let t0 = Instant::now();
        queue.schedule(PathBuf::from("/p/a.go"), t0);

        assert_eq!(queue.pop_due(t0), None);
        assert_eq!(queue.pop_due(t0 + WINDOW / 2), None);
        assert_eq!(
            queue.pop_due(t0 + WINDOW),
            Some(PathBuf::from("/p/a.go"))
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rescheduling_supersedes_earlier_deadline() {
        let mut queue = queue();
        let t0 = Instant::now();
        queue.schedule(PathBuf::from("/p/a.go"), t0);
        queue.schedule(PathBuf::from("/p/a.go"), t0 + Duration::from_millis(200));

        // The first deadline has passed, but the second write moved it.
        assert_eq!(queue.pop_due(t0 + WINDOW), None);
        assert_eq!(
            queue.pop_due(t0 + Duration::from_millis(200) + WINDOW),
            Some(PathBuf::from("/p/a.go"))
        );
    }

    #[test]
    fn test_paths_become_due_independently() {
        let mut queue = queue();
        let t0 = Instant::now();
        queue.schedule(PathBuf::from("/p/early.go"), t0);
        queue.schedule(PathBuf::from("/p/late.go"), t0 + Duration::from_millis(100));

        let at = t0 + WINDOW;
        assert_eq!(queue.pop_due(at), Some(PathBuf::from("/p/early.go")));
        assert_eq!(queue.pop_due(at), None);

        let later = t0 + Duration::from_millis(100) + WINDOW;
        assert_eq!(queue.pop_due(later), Some(PathBuf::from("/p/late.go")));
    }

    #[test]
    fn test_next_deadline_is_the_minimum() {
        let mut queue = queue();
        assert_eq!(queue.next_deadline(), None);

        let t0 = Instant::now();
        queue.schedule(PathBuf::from("/p/b.go"), t0 + Duration::from_millis(50));
        queue.schedule(PathBuf::from("/p/a.go"), t0);

        assert_eq!(queue.next_deadline(), Some(t0 + WINDOW));
    }

    #[test]
    fn test_discard_cancels_pending_work() {
        let mut queue = queue();
        let t0 = Instant::now();
        queue.schedule(PathBuf::from("/p/a.go"), t0);
        queue.discard(Path::new("/p/a.go"));

        assert!(queue.is_empty());
        assert_eq!(queue.pop_due(t0 + WINDOW * 2), None);
    }

    #[test]
    fn test_clear_suppresses_everything() {
        let mut queue = queue();
        let t0 = Instant::now();
        queue.schedule(PathBuf::from("/p/a.go"), t0);
        queue.schedule(PathBuf::from("/p/b.go"), t0);
        queue.clear();

        assert_eq!(queue.next_deadline(), None);
        assert_eq!(queue.pop_due(t0 + WINDOW), None);
    }
}
