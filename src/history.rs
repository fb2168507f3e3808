use crate::error::ScopeError;
use crate::types::Capture;
use log::debug;

/// What a [`CaptureHistory`] mutation did, for views that mirror the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryChange {
    /// A capture was appended at `index` and became active
    Appended { index: usize },
    Selected { index: usize },
    /// The capture at `index` was removed; `active` is the new selection
    Deleted { index: usize, active: Option<usize> },
}

/// Ordered list of captures with an optional active entry.
///
/// The active index is `None` exactly when the history is empty.
#[derive(Debug, Default, Clone)]
pub struct CaptureHistory {
    captures: Vec<Capture>,
    active: Option<usize>,
}

impl CaptureHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a capture and make it the active one
    pub fn push(&mut self, capture: Capture) -> HistoryChange {
        self.captures.push(capture);
        let index = self.captures.len() - 1;
        self.active = Some(index);
        debug!("History: appended capture {index}");
        HistoryChange::Appended { index }
    }

    pub fn select(&mut self, index: usize) -> Result<HistoryChange, ScopeError> {
        self.check_index(index)?;
        self.active = Some(index);
        Ok(HistoryChange::Selected { index })
    }

    /// Remove the capture at `index`; later captures shift down by one.
    ///
    /// The capture before the removed one becomes active, or the new first
    /// capture when the first was removed.
    pub fn delete(&mut self, index: usize) -> Result<HistoryChange, ScopeError> {
        self.check_index(index)?;
        self.captures.remove(index);

        self.active = if self.captures.is_empty() {
            None
        } else {
            Some(index.saturating_sub(1))
        };
        debug!("History: deleted capture {index}, active {:?}", self.active);

        Ok(HistoryChange::Deleted {
            index,
            active: self.active,
        })
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&Capture> {
        self.active.and_then(|i| self.captures.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&Capture> {
        self.captures.get(index)
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capture> {
        self.captures.iter()
    }

    fn check_index(&self, index: usize) -> Result<(), ScopeError> {
        if index >= self.captures.len() {
            return Err(ScopeError::InvalidIndex {
                index,
                len: self.captures.len(),
            });
        }
        Ok(())
    }
}
