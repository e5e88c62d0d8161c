pub mod engine;
pub mod inputs;
pub mod types;

pub use engine::Driver;
pub use types::{DriverError, DriverOptions, DriverResult, DriverState, SetInputsOptions, UnboundInputPolicy};
