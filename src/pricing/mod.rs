// Tiered-pricing bracket resolution - pure, side-effect-free
pub mod resolver;

pub use resolver::{resolve, validate_partition, BracketResolution};
