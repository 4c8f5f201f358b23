pub mod config;
pub mod errors;
pub mod kernel;
pub mod market;
pub mod traits;
pub mod types;
