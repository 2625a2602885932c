pub mod constraints;
pub mod greedy;
pub mod types;

pub use constraints::*;
pub use greedy::*;
pub use types::*;

pub const OPTIMIZER_VERSION: &str = "greedy-repair-v1";
