pub mod action;
pub mod classifier;
pub mod distribution;
pub mod error;
pub mod expr;
pub mod graph;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod store;
pub mod types;

pub use error::{GaleError, Result};
