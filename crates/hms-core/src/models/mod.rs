//! Domain models for the hospital core.

mod audit;
mod discharge;
mod invoice;
mod patient;
mod queue;
mod roster;

pub use audit::*;
pub use discharge::*;
pub use invoice::*;
pub use patient::*;
pub use queue::*;
pub use roster::*;
