use std::collections::VecDeque;

use soulflow_core_types::Snapshot;

/// Depth of each history stack.
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone)]
struct BoundedStack {
    capacity: usize,
    data: VecDeque<Snapshot>,
}

impl BoundedStack {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            data: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Evicts the oldest entry when full.
    fn push(&mut self, snapshot: Snapshot) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(snapshot);
    }

    fn pop(&mut self) -> Option<Snapshot> {
        self.data.pop_back()
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Undo (`past`) and redo (`future`) stacks of snapshots.
#[derive(Debug, Clone)]
pub struct History {
    past: BoundedStack,
    future: BoundedStack,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            past: BoundedStack::new(capacity),
            future: BoundedStack::new(capacity),
        }
    }

    /// Empties both stacks and seeds `past` with `baseline`.
    pub fn reset(&mut self, baseline: Snapshot) {
        self.past.clear();
        self.future.clear();
        self.past.push(baseline);
    }

    /// Records the state before a forward mutation. Invalidates redo.
    pub fn record(&mut self, before: Snapshot) {
        self.past.push(before);
        self.future.clear();
    }

    /// Returns the state to restore, parking `current` on the redo stack.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.past.pop()?;
        self.future.push(current);
        Some(previous)
    }

    /// Mirror of [`History::undo`].
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.future.pop()?;
        self.past.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soulflow_core_types::FlowMeta;

    fn snap(name: &str) -> Snapshot {
        Snapshot {
            flow_meta: FlowMeta {
                name: name.to_string(),
                description: None,
            },
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    #[test]
    fn oldest_entry_is_evicted() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.record(snap(&i.to_string()));
        }
        assert_eq!(history.past_len(), 3);

        let mut names = Vec::new();
        while let Some(previous) = history.undo(snap("now")) {
            names.push(previous.flow_meta.name);
        }
        assert_eq!(names, vec!["4", "3", "2"]);
    }

    #[test]
    fn record_clears_future() {
        let mut history = History::default();
        history.record(snap("a"));
        assert!(history.undo(snap("b")).is_some());
        assert!(history.can_redo());
        history.record(snap("c"));
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_on_empty_is_none() {
        let mut history = History::default();
        assert!(history.undo(snap("x")).is_none());
        assert_eq!(history.future_len(), 0);
    }
}
