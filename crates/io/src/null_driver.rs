//! Null output driver: accepts the binding and never pulls.
//!
//! With no callback consuming frames, nothing renders; fires still expire
//! against the wall-clock-derived mix position, so a host loop waiting on
//! `fire_count()` terminates normally. Useful for headless runs and tests.

use std::sync::Arc;

use sq_common::{DriverError, FrameSource, OutputDriver};

/// A driver that produces no audio and consumes no frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDriver;

impl NullDriver {
    pub fn new() -> Self {
        Self
    }
}

impl OutputDriver for NullDriver {
    fn bind(&mut self, _source: Arc<dyn FrameSource>) {}

    fn start(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn stop(&mut self) {}
}
