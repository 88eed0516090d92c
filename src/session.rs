//! Interactive grouping state: the scanned items, their current groups and
//! an undo stack of manual reassignments.
//!
//! The planning engine never sees a session. It only receives the final
//! [`Groups`] through [`Session::groups`].

use crate::classify::{Groups, classify};
use crate::error::SessionError;
use crate::item::DesktopItem;
use crate::plan::is_valid_folder_name;

/// Reassignments remembered by default.
pub const DEFAULT_UNDO_LIMIT: usize = 50;

/// One manual reassignment. `from_group` is `None` for an item that was
/// unclassified before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStackEntry {
    pub item_key: String,
    pub from_group: Option<String>,
    pub to_group: String,
}

/// Bounded LIFO of reassignments; the oldest entry is dropped when full.
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: Vec<UndoStackEntry>,
    limit: usize,
}

impl UndoStack {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, entry: UndoStackEntry) {
        if self.entries.len() == self.limit {
            self.entries.remove(0);
        }
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<UndoStackEntry> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    items: Vec<DesktopItem>,
    groups: Groups,
    undo: UndoStack,
}

impl Session {
    /// Starts a session from a scan, classifying it.
    pub fn new(items: Vec<DesktopItem>) -> Self {
        let groups = classify(&items);
        Self {
            items,
            groups,
            undo: UndoStack::default(),
        }
    }

    pub fn items(&self) -> &[DesktopItem] {
        &self.items
    }

    /// The current assignment, ready for plan generation.
    pub fn groups(&self) -> &Groups {
        &self.groups
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    /// The group currently holding the item with this key.
    pub fn group_of(&self, item_key: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, members)| members.iter().any(|m| m.key() == item_key))
            .map(|(name, _)| name.as_str())
    }

    /// Moves an item into `to_group`, creating the group when needed.
    ///
    /// Returns `Ok(false)` without recording anything when the item is
    /// already there.
    pub fn reassign(&mut self, item_key: &str, to_group: &str) -> Result<bool, SessionError> {
        let item = self
            .items
            .iter()
            .find(|item| item.key() == item_key)
            .cloned()
            .ok_or_else(|| SessionError::UnknownItem {
                key: item_key.to_string(),
            })?;
        if item.is_directory {
            return Err(SessionError::Directory {
                key: item_key.to_string(),
            });
        }
        let to_group = to_group.trim();
        if !is_valid_folder_name(to_group) {
            return Err(SessionError::InvalidGroup {
                name: to_group.to_string(),
            });
        }

        let from_group = self.group_of(item_key).map(str::to_string);
        if from_group.as_deref() == Some(to_group) {
            return Ok(false);
        }

        self.detach(item_key);
        self.groups.entry(to_group.to_string()).or_default().push(item);
        tracing::debug!(item = item_key, from = ?from_group, to = to_group, "reassigned");

        self.undo.push(UndoStackEntry {
            item_key: item_key.to_string(),
            from_group,
            to_group: to_group.to_string(),
        });
        Ok(true)
    }

    /// Reverses the most recent reassignment.
    pub fn undo(&mut self) -> Option<UndoStackEntry> {
        let entry = self.undo.pop()?;
        let item = self
            .items
            .iter()
            .find(|item| item.key() == entry.item_key)
            .cloned()?;

        self.detach(&entry.item_key);
        if let Some(from) = &entry.from_group {
            self.groups.entry(from.clone()).or_default().push(item);
        }
        tracing::debug!(item = %entry.item_key, to = ?entry.from_group, "reassignment undone");
        Some(entry)
    }

    /// Removes the item from whatever group holds it, dropping emptied groups.
    fn detach(&mut self, item_key: &str) {
        for members in self.groups.values_mut() {
            members.retain(|member| member.key() != item_key);
        }
        self.groups.retain(|_, members| !members.is_empty());
    }
}
