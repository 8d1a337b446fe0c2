//! Bounded FIFO holding admitted tasks that have not started yet.
//!
//! The queue itself is not synchronized: it lives inside the pool state so the
//! admission decision can check worker counts and queue capacity under one
//! lock. Workers suspend on the pool's `Condvar` when it is empty.

use std::collections::VecDeque;

use super::task::Task;

/// Bounded FIFO of tasks. Insertion order is dequeue order.
#[derive(Debug)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<Task>,
    capacity: usize,
}

impl TaskQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            tasks: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a task, handing it back if the queue is at capacity. Never blocks.
    pub(crate) fn try_enqueue(&mut self, task: Task) -> Result<(), Task> {
        if self.is_full() {
            return Err(task);
        }
        self.tasks.push_back(task);
        Ok(())
    }

    /// Remove the oldest task.
    pub(crate) fn dequeue(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Remove every queued task in FIFO order.
    pub(crate) fn drain(&mut self) -> Vec<Task> {
        self.tasks.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.tasks.len() >= self.capacity
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u64) -> Task {
        Task::fire_and_forget(id, || Ok(()))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new(4);
        for id in 0..4 {
            assert!(queue.try_enqueue(task(id)).is_ok());
        }
        let order: Vec<_> = std::iter::from_fn(|| queue.dequeue()).map(|t| t.id()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rejects_when_full() {
        let mut queue = TaskQueue::new(2);
        queue.try_enqueue(task(1)).unwrap();
        queue.try_enqueue(task(2)).unwrap();
        assert!(queue.is_full());

        let returned = queue.try_enqueue(task(3)).unwrap_err();
        assert_eq!(returned.id(), 3);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn test_drain_empties_in_order() {
        let mut queue = TaskQueue::new(3);
        queue.try_enqueue(task(10)).unwrap();
        queue.try_enqueue(task(11)).unwrap();
        let drained: Vec<_> = queue.drain().iter().map(Task::id).collect();
        assert_eq!(drained, vec![10, 11]);
        assert_eq!(queue.len(), 0);
    }
}
