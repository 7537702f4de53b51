//! Resource default standardization

use crate::descriptor::model::Descriptor;
use crate::error::Result;
use crate::pipeline::Processor;

// comparisons against zero tolerate decoder float drift
const ZERO_EPSILON: f32 = 1e-6;

/// Fills orchestrator resource fields that were left at zero. Memory is in
/// GiB by orchestrator convention; the value is only defaulted here, never
/// converted.
pub struct StandardizeUnits;

impl Processor for StandardizeUnits {
    fn name(&self) -> &'static str {
        "standardize-units"
    }

    fn process(&self, descriptor: &mut Descriptor) -> Result<()> {
        for app in &mut descriptor.applications {
            let config = &mut app.orchestrator_config;
            if config.cpu.abs() < ZERO_EPSILON {
                config.cpu = 0.2;
            }
            if config.mem.abs() < ZERO_EPSILON {
                config.mem = 2.0;
            }
            if config.instances == 0 {
                config.instances = 2;
            }
        }
        Ok(())
    }
}
