//! Priority-ordered, bounded queue of pending execution tasks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::domain::ExecutionTask;

/// Wraps a task with a monotonic sequence number so that dequeue order
/// is stable: strictly by priority, FIFO within equal priority.
struct QueuedTask {
    task: ExecutionTask,
    sequence: u64,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.task.priority == other.task.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority wins; within a priority the earlier sequence
        // wins (retried tasks get a fresh sequence, so they re-enter
        // behind equal-priority work already waiting).
        match self.task.priority.cmp(&other.task.priority) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

/// Bounded stable priority queue.
pub struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,
    sequence_counter: u64,
    max_size: usize,
    enqueued_count: u64,
    dequeued_count: u64,
}

/// Error returned when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull {
    pub pending: usize,
    pub max: usize,
}

impl TaskQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            sequence_counter: 0,
            max_size,
            enqueued_count: 0,
            dequeued_count: 0,
        }
    }

    /// Push a task; rejects when at capacity.
    pub fn enqueue(&mut self, task: ExecutionTask) -> Result<(), QueueFull> {
        if self.heap.len() >= self.max_size {
            return Err(QueueFull {
                pending: self.heap.len(),
                max: self.max_size,
            });
        }

        let sequence = self.sequence_counter;
        self.sequence_counter += 1;

        self.heap.push(QueuedTask { task, sequence });
        self.enqueued_count += 1;
        Ok(())
    }

    /// Pop the highest-priority pending task.
    pub fn dequeue(&mut self) -> Option<ExecutionTask> {
        let queued = self.heap.pop()?;
        self.dequeued_count += 1;
        Some(queued.task)
    }

    /// Remove and return every pending task (kill switch / stop).
    pub fn drain(&mut self) -> Vec<ExecutionTask> {
        std::mem::take(&mut self.heap)
            .into_sorted_vec()
            .into_iter()
            .rev()
            .map(|q| q.task)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::PaperBroker;
    use crate::domain::{OrderRequest, OrderSide};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn make_task(symbol: &str, priority: u8) -> ExecutionTask {
        let request = Arc::new(OrderRequest::limit(
            symbol,
            OrderSide::Buy,
            dec!(1),
            dec!(100),
        ));
        ExecutionTask::new(request, Arc::new(PaperBroker::new("paper")), priority)
    }

    #[test]
    fn test_priority_ordering() {
        let mut queue = TaskQueue::new(100);

        queue.enqueue(make_task("NORMAL", 5)).unwrap();
        queue.enqueue(make_task("LOW", 2)).unwrap();
        queue.enqueue(make_task("CRITICAL", 10)).unwrap();
        queue.enqueue(make_task("HIGH", 8)).unwrap();

        assert_eq!(queue.dequeue().unwrap().request.symbol, "CRITICAL");
        assert_eq!(queue.dequeue().unwrap().request.symbol, "HIGH");
        assert_eq!(queue.dequeue().unwrap().request.symbol, "NORMAL");
        assert_eq!(queue.dequeue().unwrap().request.symbol, "LOW");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut queue = TaskQueue::new(100);

        queue.enqueue(make_task("FIRST", 5)).unwrap();
        queue.enqueue(make_task("SECOND", 5)).unwrap();
        queue.enqueue(make_task("THIRD", 5)).unwrap();

        assert_eq!(queue.dequeue().unwrap().request.symbol, "FIRST");
        assert_eq!(queue.dequeue().unwrap().request.symbol, "SECOND");
        assert_eq!(queue.dequeue().unwrap().request.symbol, "THIRD");
    }

    #[test]
    fn test_capacity_rejection() {
        let mut queue = TaskQueue::new(1);

        queue.enqueue(make_task("A", 5)).unwrap();
        let err = queue.enqueue(make_task("B", 9)).unwrap_err();
        assert_eq!(err, QueueFull { pending: 1, max: 1 });
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = TaskQueue::new(100);
        queue.enqueue(make_task("A", 5)).unwrap();
        queue.enqueue(make_task("B", 7)).unwrap();

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_retried_task_competes_fairly() {
        let mut queue = TaskQueue::new(100);
        queue.enqueue(make_task("A", 5)).unwrap();
        queue.enqueue(make_task("B", 5)).unwrap();

        // A is dequeued and re-enqueued (retry at original priority);
        // it must now wait behind B.
        let a = queue.dequeue().unwrap();
        queue.enqueue(a).unwrap();

        assert_eq!(queue.dequeue().unwrap().request.symbol, "B");
        assert_eq!(queue.dequeue().unwrap().request.symbol, "A");
    }
}
