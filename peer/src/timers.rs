//! One-shot timers driven by the simulation clock rather than wall time, so
//! pausing the game pauses every pending timer with it.

/// What to do when a timer comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Populate the field for `level` if it is still empty.
    GenerateLevel { level: i32 },
    /// Try to bring the ship in `slot` back into play.
    Respawn { slot: usize },
    ShowGameOver,
    EndGameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Pending {
    id: TimerId,
    due: u64,
    event: TimerEvent,
}

#[derive(Debug, Default)]
pub struct Timers {
    pending: Vec<Pending>,
    next_id: u64,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `event` to fire once the clock reaches `due`.
    pub fn schedule(&mut self, due: u64, event: TimerEvent) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push(Pending { id, due, event });
        id
    }

    /// Returns true if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        self.pending.len() != before
    }

    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&TimerEvent) -> bool) {
        self.pending.retain(|p| !predicate(&p.event));
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|p| p.id == id)
    }

    /// Removes and returns every event due at `now`, earliest first. Timers
    /// due at the same time fire in the order they were scheduled.
    pub fn take_due(&mut self, now: u64) -> Vec<TimerEvent> {
        let mut due: Vec<Pending> = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].due <= now {
                due.push(self.pending.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|p| (p.due, p.id));
        due.into_iter().map(|p| p.event).collect()
    }
}
