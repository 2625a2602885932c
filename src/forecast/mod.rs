//! Planning inputs: weather and price providers and the engine that merges
//! them into one `HourConditions` per horizon hour.

pub mod engine;
pub mod prices;
pub mod weather;

pub use engine::*;
pub use prices::*;
pub use weather::*;
