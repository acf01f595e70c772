//! Time-reversal history: a bounded ring of `WorldState` snapshots plus
//! backward/forward navigation. Unlike the source's eagerly-growing
//! vector, entries live in a fixed-capacity ring so that steady state
//! (once the buffer fills) performs no further allocation.

use crate::cell::Cell;

pub const MAX_HISTORY_SIZE: usize = 1000;
pub const PERIODIC_SAVE_INTERVAL: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct WorldState {
    pub cells: Vec<Cell>,
    pub width: u32,
    pub height: u32,
    /// The renderer's pixel-per-cell dimensions at save time. The core
    /// never interprets these; they are passed through unchanged on
    /// `goBackward`/`goForward` so a renderer can rescale consistently.
    pub cell_pixel_width: f64,
    pub cell_pixel_height: f64,
    pub timestep: u32,
    pub total_mass: f64,
    pub removed_mass: f64,
    pub timestamp: f64,
}

pub struct History {
    capacity: usize,
    entries: Vec<Option<WorldState>>,
    start: usize,
    len: usize,
    /// `None` means "live" (not navigating); `Some(i)` indexes the logical
    /// sequence, 0 = oldest saved entry.
    current_index: Option<usize>,
    current_live_state: Option<WorldState>,
    has_stored_current_state: bool,
    pub enabled: bool,
    has_user_input_since_last_save: bool,
    last_save_time: f64,
}

impl History {
    pub fn new() -> Self {
        History::with_capacity(MAX_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        History {
            capacity,
            entries: (0..capacity).map(|_| None).collect(),
            start: 0,
            len: 0,
            current_index: None,
            current_live_state: None,
            has_stored_current_state: false,
            enabled: true,
            has_user_input_since_last_save: false,
            last_save_time: 0.0,
        }
    }

    pub fn mark_user_input(&mut self) {
        self.has_user_input_since_last_save = true;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_navigating(&self) -> bool {
        self.current_index.is_some()
    }

    pub fn can_go_backward(&self) -> bool {
        match self.current_index {
            None => self.len > 0,
            Some(i) => i > 0,
        }
    }

    pub fn can_go_forward(&self) -> bool {
        self.current_index.is_some()
    }

    fn logical(&self, i: usize) -> usize {
        (self.start + i) % self.capacity
    }

    fn get(&self, logical_index: usize) -> &WorldState {
        self.entries[self.logical(logical_index)]
            .as_ref()
            .expect("logical index within len must be populated")
    }

    /// Called once per `advance_time`, after the step has committed.
    /// `simulation_time` is the World's running clock; `make_state` is
    /// called only if the save policy decides to actually capture a
    /// snapshot this step.
    pub fn on_step_end(&mut self, simulation_time: f64, make_state: impl FnOnce() -> WorldState) {
        if !self.enabled {
            return;
        }
        let should_save = self.has_user_input_since_last_save
            || (simulation_time - self.last_save_time) >= PERIODIC_SAVE_INTERVAL;
        if !should_save {
            return;
        }
        self.push(make_state());
        self.has_user_input_since_last_save = false;
        self.last_save_time = simulation_time;
    }

    fn push(&mut self, state: WorldState) {
        if self.len < self.capacity {
            let idx = self.logical(self.len);
            self.entries[idx] = Some(state);
            self.len += 1;
        } else {
            self.entries[self.start] = Some(state);
            self.start = (self.start + 1) % self.capacity;
        }
        // A save always happens at the live head; any in-progress
        // navigation is invalidated, matching the source's behavior of
        // treating a fresh step as abandoning a backward excursion.
        self.current_index = None;
        self.has_stored_current_state = false;
        self.current_live_state = None;
    }

    /// Moves one step toward older entries, returning the state that
    /// should now be restored onto the live world, or `None` if there is
    /// nothing to go back to.
    pub fn go_backward(&mut self, live_snapshot: impl FnOnce() -> WorldState) -> Option<&WorldState> {
        match self.current_index {
            None => {
                if self.len == 0 {
                    return None;
                }
                self.current_live_state = Some(live_snapshot());
                self.has_stored_current_state = true;
                self.current_index = Some(self.len - 1);
                Some(self.get(self.len - 1))
            }
            Some(i) => {
                if i == 0 {
                    None
                } else {
                    self.current_index = Some(i - 1);
                    Some(self.get(i - 1))
                }
            }
        }
    }

    /// Moves one step toward newer entries, returning the state that
    /// should now be restored, or `None` if already live.
    pub fn go_forward(&mut self) -> Option<&WorldState> {
        match self.current_index {
            None => None,
            Some(i) => {
                if i + 1 < self.len {
                    self.current_index = Some(i + 1);
                    Some(self.get(i + 1))
                } else if self.has_stored_current_state {
                    self.current_index = None;
                    self.has_stored_current_state = false;
                    self.current_live_state.as_ref()
                } else {
                    None
                }
            }
        }
    }

    pub fn clear(&mut self) {
        for slot in self.entries.iter_mut() {
            *slot = None;
        }
        self.start = 0;
        self.len = 0;
        self.current_index = None;
        self.current_live_state = None;
        self.has_stored_current_state = false;
        self.has_user_input_since_last_save = false;
    }
}

impl Default for History {
    fn default() -> Self {
        History::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialType;

    fn state(timestep: u32) -> WorldState {
        WorldState {
            cells: vec![Cell::with_material(MaterialType::Dirt, timestep as f64 * 0.1)],
            width: 1,
            height: 1,
            cell_pixel_width: 32.0,
            cell_pixel_height: 32.0,
            timestep,
            total_mass: timestep as f64 * 0.1,
            removed_mass: 0.0,
            timestamp: timestep as f64 * 0.016,
        }
    }

    #[test]
    fn clear_history_leaves_both_navigation_directions_false() {
        let mut h = History::new();
        h.on_step_end(1.0, || state(1));
        h.clear();
        assert!(!h.can_go_backward());
        assert!(!h.can_go_forward());
    }

    #[test]
    fn backward_then_forward_round_trips_to_live() {
        let mut h = History::new();
        h.on_step_end(1.0, || state(1));
        let live = state(2);
        let restored_back = h.go_backward(|| live.clone()).cloned().unwrap();
        assert_eq!(restored_back.timestep, 1);
        let restored_forward = h.go_forward().cloned().unwrap();
        assert_eq!(restored_forward.timestep, 2);
        assert!(!h.is_navigating());
    }

    #[test]
    fn ring_evicts_oldest_once_full() {
        let mut h = History::with_capacity(2);
        h.mark_user_input();
        h.on_step_end(0.0, || state(1));
        h.mark_user_input();
        h.on_step_end(0.1, || state(2));
        h.mark_user_input();
        h.on_step_end(0.2, || state(3));
        assert_eq!(h.len(), 2);
        let oldest = h.go_backward(|| state(4)).cloned().unwrap();
        let older = h.go_backward(|| state(4)).cloned();
        assert!(older.is_some());
        assert_ne!(oldest.timestep, 1, "timestep 1 should have been evicted");
    }

    #[test]
    fn periodic_save_respects_interval() {
        let mut h = History::new();
        h.on_step_end(0.1, || state(1));
        assert_eq!(h.len(), 0, "under the 0.5s interval and no user input");
        h.on_step_end(0.6, || state(1));
        assert_eq!(h.len(), 1);
    }
}
