//! Stateright Model for Write Queue Ordering
//!
//! Exhaustively checks the interaction between queued writes and deletes
//! of the same value:
//! - NO_RESURRECTION: once a remove completes, no write queued before it
//!   can bring the value back
//! - LAST_WRITE_WINS: with the queue drained and no remove, the store holds
//!   the most recently queued value
//!
//! With `flush_before_delete` off the model finds the resurrection the
//! flush barrier exists to prevent.

use stateright::{Model, Property};
use std::collections::VecDeque;

/// State of one option name across the queue and the store
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderingState {
    /// Values posted but not yet applied, oldest first
    pub queue: VecDeque<u8>,
    /// Value currently in the store
    pub store: Option<u8>,
    /// Most recently posted value
    pub last_posted: Option<u8>,
    /// Writes posted so far
    pub posted: u8,
    /// A remove has completed
    pub removed: bool,
}

impl OrderingState {
    pub fn new() -> Self {
        OrderingState {
            queue: VecDeque::new(),
            store: None,
            last_posted: None,
            posted: 0,
            removed: false,
        }
    }
}

impl Default for OrderingState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OrderingAction {
    /// Caller posts a write
    Post,
    /// Worker applies the oldest queued write
    Apply,
    /// Caller removes the value
    Remove,
}

pub struct WriteOrderingModel {
    pub max_writes: u8,
    /// Remove waits for the queue to drain before deleting
    pub flush_before_delete: bool,
}

impl WriteOrderingModel {
    pub fn new(max_writes: u8) -> Self {
        WriteOrderingModel {
            max_writes,
            flush_before_delete: true,
        }
    }

    pub fn without_flush(max_writes: u8) -> Self {
        WriteOrderingModel {
            max_writes,
            flush_before_delete: false,
        }
    }
}

impl Model for WriteOrderingModel {
    type State = OrderingState;
    type Action = OrderingAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![OrderingState::new()]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        // Writes only precede the remove; a later write is a new value, not a resurrection
        if !state.removed && state.posted < self.max_writes {
            actions.push(OrderingAction::Post);
        }
        if !state.queue.is_empty() {
            actions.push(OrderingAction::Apply);
        }
        if !state.removed && (!self.flush_before_delete || state.queue.is_empty()) {
            actions.push(OrderingAction::Remove);
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();
        match action {
            OrderingAction::Post => {
                next.posted += 1;
                next.queue.push_back(next.posted);
                next.last_posted = Some(next.posted);
            }
            OrderingAction::Apply => {
                let value = next.queue.pop_front()?;
                next.store = Some(value);
            }
            OrderingAction::Remove => {
                next.store = None;
                next.removed = true;
            }
        }
        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always(
                "no_resurrection",
                |_model: &WriteOrderingModel, state: &OrderingState| {
                    !state.removed || state.store.is_none()
                },
            ),
            Property::always(
                "last_write_wins",
                |_model: &WriteOrderingModel, state: &OrderingState| {
                    state.removed || !state.queue.is_empty() || state.store == state.last_posted
                },
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn test_flush_before_delete_prevents_resurrection() {
        let checker = WriteOrderingModel::new(3).checker().spawn_bfs().join();
        checker.assert_properties();
    }

    #[test]
    fn test_delete_without_flush_resurrects() {
        let checker = WriteOrderingModel::without_flush(2)
            .checker()
            .spawn_bfs()
            .join();
        assert!(checker.discovery("no_resurrection").is_some());
    }

    #[test]
    fn test_apply_is_fifo() {
        let model = WriteOrderingModel::new(2);
        let s = OrderingState::new();
        let s = model.next_state(&s, OrderingAction::Post).unwrap();
        let s = model.next_state(&s, OrderingAction::Post).unwrap();
        let s = model.next_state(&s, OrderingAction::Apply).unwrap();
        assert_eq!(s.store, Some(1));
        let s = model.next_state(&s, OrderingAction::Apply).unwrap();
        assert_eq!(s.store, Some(2));
        assert!(model.next_state(&s, OrderingAction::Apply).is_none());
    }

    #[test]
    #[ignore] // Run with: cargo test stateright_write_ordering -- --ignored --nocapture
    fn stateright_write_ordering_model_check() {
        let checker = WriteOrderingModel::new(8).checker().spawn_bfs().join();

        println!("States explored: {}", checker.unique_state_count());

        checker.assert_properties();

        println!("Model check passed! Write ordering invariants hold.");
    }
}
