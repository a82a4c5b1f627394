//! Insertion-ordered buffer of events waiting for delivery.

use std::collections::VecDeque;

use super::events::Event;

/// FIFO of pending events
///
/// Events leave the queue only through [`EventQueue::take_all`]; a batch that
/// fails to deliver goes back in front with [`EventQueue::restore_front`], so
/// nothing is dropped or duplicated.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Swap out everything queued so far, leaving the live queue empty.
    pub fn take_all(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events).into()
    }

    /// Put a failed batch back ahead of anything queued since it was taken.
    pub fn restore_front(&mut self, batch: Vec<Event>) {
        if batch.is_empty() {
            return;
        }
        let newer = std::mem::replace(&mut self.events, VecDeque::from(batch));
        self.events.extend(newer);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::events::EventType;
    use serde_json::json;

    fn event(label: &str) -> Event {
        Event::at(EventType::WorkbookSaved, 0, json!({ "label": label }))
    }

    fn labels(queue: &EventQueue) -> Vec<String> {
        queue
            .iter()
            .map(|e| e.data["label"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_take_all_empties_queue() {
        let mut queue = EventQueue::new();
        queue.push(event("a"));
        queue.push(event("b"));

        let batch = queue.take_all();
        assert_eq!(batch.len(), 2);
        assert!(queue.is_empty());
        assert_eq!(batch[0].data["label"], "a");
    }

    #[test]
    fn test_restore_front_keeps_failed_batch_first() {
        let mut queue = EventQueue::new();
        queue.push(event("a"));
        queue.push(event("b"));

        let batch = queue.take_all();
        // queued while the batch was in flight
        queue.push(event("c"));
        queue.push(event("d"));

        queue.restore_front(batch);
        assert_eq!(labels(&queue), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_restore_empty_batch_is_noop() {
        let mut queue = EventQueue::new();
        queue.push(event("a"));
        queue.restore_front(Vec::new());
        assert_eq!(labels(&queue), vec!["a"]);
    }

    #[test]
    fn test_repeated_failures_preserve_order() {
        let mut queue = EventQueue::new();
        queue.push(event("a"));

        let first = queue.take_all();
        queue.push(event("b"));
        queue.restore_front(first);

        let second = queue.take_all();
        queue.push(event("c"));
        queue.restore_front(second);

        assert_eq!(labels(&queue), vec!["a", "b", "c"]);
        assert_eq!(queue.len(), 3);
    }
}
