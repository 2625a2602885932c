pub mod bank;
pub mod forecast;
pub mod plan;
pub mod tuning;

pub use bank::*;
pub use forecast::*;
pub use plan::*;
pub use tuning::*;
