//! Timer queue for the round machine's deferred actions.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Armed: play the start cue.
    StartCue,
    /// Armed: start the rounds.
    BeginRunning,
    Hide,
    /// Teleport and show for `visible_ms`.
    ShowAndMove { visible_ms: u64 },
    /// Timed mode: count window `slot` as missed if nothing resolved it.
    MissedCheck { slot: u32 },
    /// Ending: show the final score and go idle.
    Reveal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTask {
    pub due_ms: u64,
    pub generation: u64,
    pub kind: TaskKind,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    task: ScheduledTask,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Min-heap on (due, insertion order).
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .task
            .due_ms
            .cmp(&self.task.due_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Tasks ordered by due time; ties run in scheduling order.
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Entry>,
    seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: ScheduledTask) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Entry { seq, task });
    }

    /// Remove and return the earliest task due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<ScheduledTask> {
        if self.heap.peek()?.task.due_ms > now_ms {
            return None;
        }
        self.heap.pop().map(|e| e.task)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|e| e.task.due_ms)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(due_ms: u64, kind: TaskKind) -> ScheduledTask {
        ScheduledTask {
            due_ms,
            generation: 0,
            kind,
        }
    }

    #[test]
    fn pops_by_due_then_fifo() {
        let mut q = TaskQueue::new();
        q.push(task(50, TaskKind::Reveal));
        q.push(task(10, TaskKind::Hide));
        q.push(task(10, TaskKind::StartCue));
        assert_eq!(q.pop_due(5), None);
        assert_eq!(q.pop_due(60).map(|t| t.kind), Some(TaskKind::Hide));
        assert_eq!(q.pop_due(60).map(|t| t.kind), Some(TaskKind::StartCue));
        assert_eq!(q.next_due(), Some(50));
        assert_eq!(q.pop_due(49), None);
        assert_eq!(q.len(), 1);
    }
}
