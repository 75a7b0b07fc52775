pub mod events;
pub mod http_client;
pub mod memory;

pub use events::BroadcastPublisher;
pub use http_client::HttpMutationClient;
pub use memory::InMemoryMutationService;
