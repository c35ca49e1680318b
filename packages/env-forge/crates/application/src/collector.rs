use std::sync::Mutex;
use tracing::warn;

/// Fixed-capacity error list shared across validation workers.
///
/// Once full, the last slot always holds an explicit truncation marker
/// counting everything that no longer fits; errors are never silently
/// dropped and the list never grows past `capacity`.
pub struct BoundedErrorCollector {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    errors: Vec<String>,
    /// Errors represented only by the truncation marker. Counts the entry
    /// displaced from the last slot as well as everything after it.
    truncated: usize,
}

impl BoundedErrorCollector {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "need room for one error plus the marker");
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn push(&self, error: impl Into<String>) {
        let error = error.into();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.truncated == 0 && inner.errors.len() < self.capacity {
            inner.errors.push(error);
            return;
        }

        if inner.truncated == 0 {
            // The error occupying the last slot is displaced by the marker.
            inner.truncated = 2;
        } else {
            inner.truncated += 1;
        }
        warn!(omitted = inner.truncated, "error list full, truncating");

        let marker = format!("... {} more error(s) omitted", inner.truncated);
        let last = inner
            .errors
            .last_mut()
            .expect("capacity >= 2 guarantees a last slot");
        *last = marker;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_errors(self) -> Vec<String> {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner()).errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_until_capacity() {
        let collector = BoundedErrorCollector::new(3);
        collector.push("a");
        collector.push("b");
        assert_eq!(collector.into_errors(), vec!["a", "b"]);
    }

    #[test]
    fn test_last_slot_becomes_truncation_marker() {
        let collector = BoundedErrorCollector::new(3);
        for e in ["a", "b", "c", "d", "e"] {
            collector.push(e);
        }

        let errors = collector.into_errors();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], "a");
        assert_eq!(errors[1], "b");
        // c was displaced; c, d and e are all accounted for by the marker.
        assert_eq!(errors[2], "... 3 more error(s) omitted");
    }

    #[test]
    fn test_exact_fit_keeps_all_errors() {
        let collector = BoundedErrorCollector::new(3);
        for e in ["a", "b", "c"] {
            collector.push(e);
        }
        assert_eq!(collector.into_errors(), vec!["a", "b", "c"]);
    }
}
