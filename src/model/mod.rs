//! Example value types used by the demo, tests and benchmarks.
//!
//! Field names follow the query vocabulary (`ID`, `status`, `secId`, ...), so
//! they can be used in queries exactly as written there.

mod portfolio;
mod position;

pub use portfolio::Portfolio;
pub use position::{Position, SEC_IDS};
