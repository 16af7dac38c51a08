//! Invoice export as JSON and CSV.

mod billing;

pub use billing::*;
