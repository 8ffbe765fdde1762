use crate::time::Tick;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Handle of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Run-to-completion timer queue on a virtual clock.
///
/// Tasks fire in due-time order, ties in scheduling order. Nothing runs on
/// its own: the owner drains due tasks with [`TaskQueue::pop_due`].
#[derive(Debug)]
pub struct TaskQueue<E> {
    now: Tick,
    next_id: u64,
    heap: BinaryHeap<Reverse<(Tick, TaskId)>>,
    pending: HashMap<TaskId, E>,
}

impl<E> Default for TaskQueue<E> {
    fn default() -> Self {
        TaskQueue {
            now: Tick(0),
            next_id: 0,
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }
}

impl<E> TaskQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn schedule_after(&mut self, delay_ms: u64, event: E) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse((self.now + delay_ms, id)));
        self.pending.insert(id, event);
        id
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Returns how many tasks were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.heap.clear();
        dropped
    }

    /// Takes the next task due at or before `until`, moving the clock to its
    /// due time.
    pub fn pop_due(&mut self, until: Tick) -> Option<(TaskId, E)> {
        loop {
            let &Reverse((due, id)) = self.heap.peek()?;
            if due > until {
                return None;
            }
            self.heap.pop();
            // cancelled tasks leave a stale heap entry behind
            if let Some(event) = self.pending.remove(&id) {
                self.now = self.now.max(due);
                return Some((id, event));
            }
        }
    }

    pub fn advance_to(&mut self, until: Tick) {
        self.now = self.now.max(until);
    }
}
