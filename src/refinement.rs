pub mod persistent_error;
pub mod predictive;
pub mod surplus;
pub mod zero_crossing;
