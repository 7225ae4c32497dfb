//! Queue state
//!
//! Items are appended and never removed, so an item's index is its identity
//! for the life of the process. Status changes go through
//! [`ItemStatus::can_transition_to`].

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tubeq_common::api::types::QueueEntryInfo;
use tubeq_common::ItemStatus;

/// One requested track
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Position in the queue
    pub index: usize,

    /// Cache key from the identifier resolver
    pub id: String,

    /// Locator handed to the downloader
    pub locator: String,

    /// Display title, passed to the player
    pub title: String,

    pub added_at: DateTime<Utc>,

    status: ItemStatus,
    local_path: Option<PathBuf>,
    error: Option<String>,
}

impl QueueItem {
    pub fn new(
        index: usize,
        id: impl Into<String>,
        locator: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            index,
            id: id.into(),
            locator: locator.into(),
            title: title.into(),
            added_at: Utc::now(),
            status: ItemStatus::Pending,
            local_path: None,
            error: None,
        }
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Set once the fetch succeeded
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    /// Fetch failure detail, for `Error` items
    pub fn error_detail(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn transition(&mut self, next: ItemStatus) -> Result<()> {
        if self.status == next && next == ItemStatus::Playing {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "item {} ({}) cannot go from {} to {}",
                self.index, self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_ready(&mut self, path: PathBuf) -> Result<()> {
        self.transition(ItemStatus::Ready)?;
        self.local_path = Some(path);
        Ok(())
    }

    pub fn mark_failed(&mut self, detail: impl Into<String>) -> Result<()> {
        self.transition(ItemStatus::Error)?;
        self.error = Some(detail.into());
        Ok(())
    }
}

/// Ordered items plus the play target
#[derive(Debug, Default)]
pub struct QueueState {
    items: Vec<QueueItem>,
    play_target: Option<usize>,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pending item, returning its index
    pub fn push(&mut self, id: String, locator: String, title: String) -> usize {
        let index = self.items.len();
        self.items.push(QueueItem::new(index, id, locator, title));
        index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut QueueItem> {
        self.items.get_mut(index)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Validate a caller-supplied index
    pub fn checked_index(&self, index: i64) -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.items.len())
            .ok_or(Error::IndexOutOfBounds {
                index,
                len: self.items.len(),
            })
    }

    pub fn play_target(&self) -> Option<usize> {
        self.play_target
    }

    /// Point the play target at `target`
    ///
    /// Callers pass an index already validated against this queue.
    pub fn set_play_target(&mut self, target: Option<usize>) {
        debug_assert!(target.map_or(true, |i| i < self.items.len()));
        self.play_target = target;
    }

    /// Clear the play target only if it still points at `index`
    pub fn clear_play_target_if(&mut self, index: usize) {
        if self.play_target == Some(index) {
            self.play_target = None;
        }
    }

    /// Item whose fetched file is `path`, preferring the one marked playing
    pub fn find_by_path(&self, path: &Path) -> Option<usize> {
        let mut matches = self
            .items
            .iter()
            .filter(|item| item.local_path() == Some(path));

        let first = matches.next()?;
        if first.status() == ItemStatus::Playing {
            return Some(first.index);
        }
        matches
            .find(|item| item.status() == ItemStatus::Playing)
            .map_or(Some(first.index), |item| Some(item.index))
    }

    /// Mark `index` as the one playing; any other playing item becomes played
    pub fn mark_playing(&mut self, index: usize) -> Result<()> {
        let len = self.items.len();
        let item = self
            .items
            .get(index)
            .ok_or(Error::IndexOutOfBounds {
                index: index as i64,
                len,
            })?;
        if !item.status().is_playable() {
            return Err(Error::InvalidState(format!(
                "item {} ({}) is {} and cannot play",
                index,
                item.id,
                item.status()
            )));
        }

        for other in self.items.iter_mut() {
            if other.index != index && other.status() == ItemStatus::Playing {
                other.transition(ItemStatus::Played)?;
            }
        }
        self.items[index].transition(ItemStatus::Playing)
    }

    /// First item after `index` that has not failed to fetch
    pub fn next_viable_after(&self, index: usize) -> Option<usize> {
        self.items
            .iter()
            .skip(index + 1)
            .find(|item| item.status() != ItemStatus::Error)
            .map(|item| item.index)
    }

    pub fn snapshot(&self) -> Vec<QueueEntryInfo> {
        self.items
            .iter()
            .map(|item| QueueEntryInfo {
                index: item.index,
                id: item.id.clone(),
                title: item.title.clone(),
                status: item.status(),
                error: item.error.clone(),
                is_target: self.play_target == Some(item.index),
                added_at: item.added_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(n: usize) -> QueueState {
        let mut state = QueueState::new();
        for i in 0..n {
            state.push(format!("id{}", i), format!("https://example.com/{}", i), format!("T{}", i));
        }
        state
    }

    fn make_ready(state: &mut QueueState, index: usize) {
        let item = state.get_mut(index).unwrap();
        item.transition(ItemStatus::Downloading).unwrap();
        item.mark_ready(PathBuf::from(format!("/cache/id{}.m4a", index))).unwrap();
    }

    #[test]
    fn test_checked_index_bounds() {
        let state = state_with(2);
        assert_eq!(state.checked_index(0).unwrap(), 0);
        assert_eq!(state.checked_index(1).unwrap(), 1);
        assert!(matches!(
            state.checked_index(2),
            Err(Error::IndexOutOfBounds { index: 2, len: 2 })
        ));
        assert!(matches!(
            state.checked_index(-1),
            Err(Error::IndexOutOfBounds { index: -1, .. })
        ));
    }

    #[test]
    fn test_illegal_transition_leaves_status() {
        let mut state = state_with(1);
        let item = state.get_mut(0).unwrap();
        assert!(matches!(item.transition(ItemStatus::Ready), Err(Error::InvalidState(_))));
        assert_eq!(item.status(), ItemStatus::Pending);
    }

    #[test]
    fn test_mark_playing_demotes_previous() {
        let mut state = state_with(3);
        make_ready(&mut state, 0);
        make_ready(&mut state, 1);

        state.mark_playing(0).unwrap();
        state.mark_playing(1).unwrap();
        assert_eq!(state.get(0).unwrap().status(), ItemStatus::Played);
        assert_eq!(state.get(1).unwrap().status(), ItemStatus::Playing);

        // replaying a played item is allowed
        state.mark_playing(0).unwrap();
        assert_eq!(state.get(0).unwrap().status(), ItemStatus::Playing);
        assert_eq!(state.get(1).unwrap().status(), ItemStatus::Played);

        assert!(matches!(state.mark_playing(2), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_next_viable_skips_errors() {
        let mut state = state_with(4);
        for i in [1, 2] {
            let item = state.get_mut(i).unwrap();
            item.transition(ItemStatus::Downloading).unwrap();
            item.mark_failed("boom").unwrap();
        }

        assert_eq!(state.next_viable_after(0), Some(3));
        assert_eq!(state.next_viable_after(3), None);
        assert_eq!(state.get(1).unwrap().error_detail(), Some("boom"));
    }

    #[test]
    fn test_find_by_path_prefers_playing() {
        let mut state = state_with(3);
        // two items resolving to the same cached file
        for i in [0, 2] {
            let item = state.get_mut(i).unwrap();
            item.transition(ItemStatus::Downloading).unwrap();
            item.mark_ready(PathBuf::from("/cache/same.m4a")).unwrap();
        }
        let path = Path::new("/cache/same.m4a");

        assert_eq!(state.find_by_path(path), Some(0));
        state.mark_playing(2).unwrap();
        assert_eq!(state.find_by_path(path), Some(2));
        assert_eq!(state.find_by_path(Path::new("/cache/other.m4a")), None);
    }

    #[test]
    fn test_snapshot_marks_target() {
        let mut state = state_with(2);
        state.set_play_target(Some(1));

        let snapshot = state.snapshot();
        assert!(!snapshot[0].is_target);
        assert!(snapshot[1].is_target);
        assert_eq!(snapshot[1].status, ItemStatus::Pending);

        state.clear_play_target_if(0);
        assert_eq!(state.play_target(), Some(1));
        state.clear_play_target_if(1);
        assert_eq!(state.play_target(), None);
    }
}
