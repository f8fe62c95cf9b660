#![forbid(unsafe_code)]

pub mod config;
pub mod datamodel;
pub mod error;
pub mod features;
pub mod persist;
pub mod pipeline;
pub mod source;
pub mod training;

pub use error::{ForecastError, Result};
