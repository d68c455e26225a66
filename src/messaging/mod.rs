pub mod envelope;
pub mod link_addr;
pub mod message_module;
pub mod messaging;
pub mod transport;
