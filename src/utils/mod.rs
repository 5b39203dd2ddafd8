pub mod stats;

pub use stats::{mean, quantile_sorted};
