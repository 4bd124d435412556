//! The `UpstreamAdapter` trait: the only way the rest of the gateway talks
//! to the upstream chat network (§4.2). `events()` is the single source of
//! truth for session state — the Session Manager never polls.

use async_trait::async_trait;
use bytes::Bytes;
use chatgw_core::Result;
use tokio::sync::mpsc;

/// Opaque handle to a live upstream connection for one tenant.
#[derive(Debug, Clone)]
pub struct Handle {
    pub tenant_id: String,
    /// Opaque connection identity assigned by the adapter (e.g. a socket id).
    pub conn_id: String,
}

/// Connection-state half of an upstream update.
#[derive(Debug, Clone)]
pub enum ConnState {
    Connecting,
    Open {
        phone_number: String,
        business_name: Option<String>,
    },
    Close {
        reason: String,
        logged_out: bool,
    },
}

/// A single update raised by the adapter for one tenant (§4.2).
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// A fresh pairing artifact (QR payload) was generated.
    Pairing(Bytes),
    /// A connection-state transition.
    State(ConnState),
    /// The adapter persisted new credential material; caller should save it.
    CredsUpdated(Bytes),
    /// A batch of raw inbound messages arrived.
    MessageInbound(Vec<RawInboundMessage>),
}

/// An inbound message as handed up by the adapter, before the Session
/// Manager's filtering (from_me / empty-with-no-media) is applied.
#[derive(Debug, Clone)]
pub struct RawInboundMessage {
    pub from: String,
    pub to: String,
    pub text: String,
    pub message_id: String,
    pub timestamp_ms: i64,
    pub from_me: bool,
    pub media_url: Option<String>,
    pub caption: Option<String>,
}

/// Outbound content variants (§4.2).
#[derive(Debug, Clone)]
pub enum OutboundContent {
    Text {
        text: String,
    },
    Media {
        bytes: Bytes,
        mime: String,
        caption: Option<String>,
    },
    Document {
        bytes: Bytes,
        filename: String,
        caption: Option<String>,
    },
}

/// Receiver side of the adapter's event stream for one connection.
pub type UpstreamEventStream = mpsc::Receiver<UpstreamEvent>;

/// The capability interface onto the upstream chat network.
#[async_trait]
pub trait UpstreamAdapter: Send + Sync {
    /// Establish a session using a resumable credential bundle. First-time
    /// connect (no credentials) yields a pairing artifact via the event
    /// stream. Returns the handle plus the event stream to consume.
    async fn connect(
        &self,
        tenant_id: &str,
        credentials: Option<Vec<u8>>,
    ) -> Result<(Handle, UpstreamEventStream)>;

    /// Send a message, returning the upstream-assigned message id.
    async fn send(&self, handle: &Handle, jid: &str, content: OutboundContent) -> Result<String>;

    /// Best-effort network close. Does not guarantee delivery of in-flight
    /// sends; errors are swallowed by the caller (§4.2).
    async fn logout(&self, handle: &Handle);

    /// Asks the upstream to rotate the current pairing artifact while a
    /// tenant is still in the `qr` state. The refreshed artifact, if any,
    /// arrives later as another `UpstreamEvent::Pairing` on the existing
    /// event stream — this call only requests it (§4.3).
    async fn request_pairing_refresh(&self, handle: &Handle) -> Result<()>;
}
