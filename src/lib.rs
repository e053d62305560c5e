pub mod algorithms;
pub mod basis;
pub mod errors;
pub mod generators;
pub mod grid;
pub mod iterators;
pub mod positivity;
pub mod refinement;
pub mod serialization;
pub mod storage;
