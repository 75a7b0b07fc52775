pub mod client;
pub mod error;
pub mod model;

pub use client::ConsoleApi;
pub use error::ConsoleError;
