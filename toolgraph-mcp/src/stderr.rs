//! The rolling stderr buffer captured for stdio downstream transports
//! (spec §4.F, §9 "stderr buffer aliasing").
//!
//! Clearing the buffer must mutate the existing `Vec` in place rather
//! than replacing it with a fresh one — the transport's stderr-reading
//! task holds a clone of this handle and keeps appending to whatever
//! backing storage it was given at spawn time.

use std::sync::{Arc, Mutex};

/// A cheaply-clonable handle to one downstream server's captured stderr
/// lines. Every clone shares the same backing storage.
#[derive(Clone, Default)]
pub struct StderrBuffer(Arc<Mutex<Vec<String>>>);

impl StderrBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one trimmed line, as read by the transport's stderr task.
    pub fn push_line(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }

    /// A snapshot (clone) of the lines captured so far, safe to embed in
    /// an error value without holding the lock.
    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Empties the buffer in place, so lines captured before a call are
    /// not attributed to a later one.
    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_mutates_in_place_visible_to_clones() {
        let buffer = StderrBuffer::new();
        let alias = buffer.clone();
        buffer.push_line("listening on stdin".to_string());
        assert_eq!(alias.snapshot(), vec!["listening on stdin".to_string()]);

        buffer.clear();
        assert!(alias.snapshot().is_empty());

        alias.push_line("after clear".to_string());
        assert_eq!(buffer.snapshot(), vec!["after clear".to_string()]);
    }
}
