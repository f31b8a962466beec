//! Display driver: issues refresh commands to the panel. The real panel
//! transport (SPI, parallel bus, whatever the hardware uses) is outside
//! this crate's scope; `DisplayDriver` is the seam a caller plugs a real
//! transport into. See `SPEC_FULL.md` §4.6/§4.7.

use thiserror::Error;

use crate::planner::RefreshPlan;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("display write failed: {0}")]
    Write(String),
}

pub trait DisplayDriver: Send {
    /// Push `pixels` (the framebuffer's full staging buffer) to the panel
    /// according to `plan`'s mode and regions.
    fn refresh(&mut self, plan: &RefreshPlan, pixels: &[u8]) -> Result<(), DriverError>;
}

/// In-memory driver recording every refresh it was asked to perform, for
/// tests and developer-mode substitution of real panel hardware.
#[derive(Default)]
pub struct MemoryDriver {
    pub calls: Vec<RefreshPlan>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplayDriver for MemoryDriver {
    fn refresh(&mut self, plan: &RefreshPlan, _pixels: &[u8]) -> Result<(), DriverError> {
        self.calls.push(plan.clone());
        Ok(())
    }
}
