//! Data types for batch processing.

use std::fmt;

/// A single unit of work: one resource locator and one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    locator: String,
    instruction: String,
}

impl WorkItem {
    /// Create a new work item.
    pub fn new(locator: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self { locator: locator.into(), instruction: instruction.into() }
    }

    /// The resource locator, passed to the service as a media reference.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// The free-form instruction guiding generation.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

/// The ordered work items of one request.
///
/// Position is identity: reply `i` always belongs to item `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    items: Vec<WorkItem>,
}

impl Batch {
    /// Create a batch from work items, keeping their order.
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self { items }
    }

    /// Number of work items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch holds no work items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over the work items in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, WorkItem> {
        self.items.iter()
    }
}

impl From<Vec<WorkItem>> for Batch {
    fn from(items: Vec<WorkItem>) -> Self {
        Self::new(items)
    }
}

impl FromIterator<WorkItem> for Batch {
    fn from_iter<I: IntoIterator<Item = WorkItem>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Batch {
    type Item = WorkItem;
    type IntoIter = std::vec::IntoIter<WorkItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a WorkItem;
    type IntoIter = std::slice::Iter<'a, WorkItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Lifecycle of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    /// Decoded and waiting to be dispatched.
    Received,
    /// Item tasks are in flight.
    Dispatching,
    /// Every item produced a reply.
    AllSucceeded,
    /// At least one item failed.
    AnyFailed,
    /// The outcome has been handed back to the caller.
    Completed,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Dispatching => "dispatching",
            Self::AllSucceeded => "all_succeeded",
            Self::AnyFailed => "any_failed",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}
