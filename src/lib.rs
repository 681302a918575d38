pub mod artifact;
pub mod chunk;
pub mod common;
pub mod config;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod scheduler;
pub mod tasks;

pub use crate::error::{CgpError, Result};
