pub mod protocol_registry;

pub use protocol_registry::ProtocolRegistry;
