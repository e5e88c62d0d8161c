pub mod script;
pub mod types;

pub use script::{load_script, run_script};
pub use types::{HarnessError, HarnessResult, ScriptStep, TestScript};
