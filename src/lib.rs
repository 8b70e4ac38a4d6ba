pub mod core;
pub mod error;
pub mod platform;
pub mod report;

pub use crate::core::hardware::{Processor, Register, Registers, XFeatures};
pub use crate::core::probe::{Availability, ProbeReport};
pub use crate::core::table::{FeatureDescriptor, FeatureTable, AMX_FEATURES};
pub use crate::error::{ProbeError, TableError};
