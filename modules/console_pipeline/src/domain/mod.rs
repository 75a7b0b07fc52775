pub mod audit;
pub mod error;
pub mod events;
pub mod identity;
pub mod notifications;
pub mod permissions;
pub mod ports;
pub mod repo;
pub mod service;
