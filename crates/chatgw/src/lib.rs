//! Top-level facade crate for the chat gateway.
//!
//! Re-exports the core types, the upstream adapter trait, and the gateway
//! library so users can depend on a single crate.

pub mod core {
    pub use chatgw_core::*;
}

pub mod adapter {
    pub use chatgw_adapter::*;
}

pub mod gateway {
    pub use chatgw_gateway::*;
}
