use log::{log_enabled, Level};
use std::time::Instant;

/// Times one index pass (a rebuild or bulk build) of a manager and reports it
/// at trace level when dropped.
pub struct PassTimer {
    owner: &'static str,
    pass: &'static str,
    objects: usize,
    start: Option<Instant>,
}

impl PassTimer {
    /// The clock is only read when trace logging is enabled.
    pub fn new(owner: &'static str, pass: &'static str, objects: usize) -> Self {
        let start = log_enabled!(Level::Trace).then(Instant::now);
        Self {
            owner,
            pass,
            objects,
            start,
        }
    }
}

impl Drop for PassTimer {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            log::trace!(
                "{}: {} over {} objects took {} µs",
                self.owner,
                self.pass,
                self.objects,
                start.elapsed().as_micros()
            );
        }
    }
}
