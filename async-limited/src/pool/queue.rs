use std::collections::VecDeque;

use super::acquire::Priority;

/// Two-tier FIFO of pending acquisitions. Elevated entries are always served
/// before normal ones, and each tier keeps its arrival order.
#[derive(Debug)]
pub(crate) struct WaitQueue<W> {
    elevated: VecDeque<W>,
    normal: VecDeque<W>,
}

impl<W> WaitQueue<W> {
    pub fn new() -> Self {
        Self {
            elevated: VecDeque::new(),
            normal: VecDeque::new(),
        }
    }

    pub fn push(&mut self, priority: Priority, waiter: W) {
        match priority {
            Priority::Elevated => self.elevated.push_back(waiter),
            Priority::Normal => self.normal.push_back(waiter),
        }
    }

    pub fn pop(&mut self) -> Option<W> {
        self.elevated
            .pop_front()
            .or_else(|| self.normal.pop_front())
    }

    pub fn len(&self) -> usize {
        self.elevated.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elevated.is_empty() && self.normal.is_empty()
    }

    /// Remove every entry in service order.
    pub fn drain(&mut self) -> impl Iterator<Item = W> + '_ {
        self.elevated.drain(..).chain(self.normal.drain(..))
    }
}
