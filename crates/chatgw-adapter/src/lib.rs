//! chatgw-adapter: the `UpstreamAdapter` trait fronting the upstream chat
//! network (§4.2), plus `NullAdapter`, a deterministic in-memory
//! implementation used for development and tests. A real integration
//! against the upstream network is an external dependency this crate does
//! not provide.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod adapter;
pub mod null;

pub use adapter::{
    ConnState, Handle, OutboundContent, UpstreamAdapter, UpstreamEvent, UpstreamEventStream,
};
pub use null::NullAdapter;
