//! The statement-population pipeline (§4.9, §6.1): the external
//! statement-structure contract, the processors that turn derived items
//! into graph nodes, and the retry scheduler that runs them to a
//! fixed point.

pub mod model;
pub mod populator;
pub mod processors;
pub mod registry;

pub use populator::{populate, PopulateReport};
