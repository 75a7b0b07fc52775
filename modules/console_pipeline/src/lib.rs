// === PUBLIC CONTRACT ===
pub mod contract;

pub use contract::{client, error, model};

// === MODULE WIRING ===
pub mod config;
pub mod module;
pub use module::ConsolePipeline;

// === INTERNAL MODULES ===
// Exposed for tests and embedding; external consumers should prefer `contract`.
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod gateways;
#[doc(hidden)]
pub mod infra;
