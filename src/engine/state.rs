use std::time::{Duration, Instant};

/// Store for the latest snapshot of one polling lane.
///
/// A successful poll replaces the value wholesale and clears the error; a
/// failed poll records the error but keeps the previous value on screen
/// (stale-but-available).
#[derive(Debug)]
pub struct LaneState<T> {
    value: Option<T>,
    last_error: Option<String>,
    last_update: Option<Instant>,
}

impl<T> LaneState<T> {
    pub fn new() -> Self {
        Self {
            value: None,
            last_error: None,
            last_update: None,
        }
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
        self.last_error = None;
        self.last_update = Some(Instant::now());
    }

    pub fn set_error(&mut self, err: String) {
        self.last_error = Some(err);
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn age(&self) -> Option<Duration> {
        self.last_update.map(|at| at.elapsed())
    }
}

impl<T> Default for LaneState<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_previous_value() {
        let mut lane: LaneState<u32> = LaneState::new();
        lane.set(7);

        lane.set_error("backend unreachable".into());

        assert_eq!(lane.get(), Some(&7));
        assert_eq!(lane.error(), Some("backend unreachable"));
    }

    #[test]
    fn success_clears_previous_error() {
        let mut lane: LaneState<u32> = LaneState::new();
        lane.set_error("transient".into());

        lane.set(1);

        assert_eq!(lane.get(), Some(&1));
        assert!(lane.error().is_none());
    }
}
