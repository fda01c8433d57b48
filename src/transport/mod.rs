//! Transport
//!
//! Request/response messaging between nodes, keyed by action name.
//! Framing, connection management and wire-level retries belong to the
//! network layer behind the `Transport` trait; this module fixes the
//! contract and the JSON payload codec, and provides a capturing
//! transport that records requests for the caller to answer.

mod capturing;
mod codec;
mod errors;

pub use capturing::{CapturedRequest, CapturingTransport};
pub use codec::{decode, encode};
pub use errors::{TransportError, TransportResult};

use futures_util::future::BoxFuture;

use crate::cluster::NodeId;

/// Sends an encoded request to a node and resolves with the encoded response.
///
/// The returned future owns everything it needs so it can be spawned.
/// Implementations must resolve every request: with a response, a remote
/// error, or a disconnect.
pub trait Transport: Send + Sync {
    fn send_request(
        &self,
        node: &NodeId,
        action: &str,
        payload: Vec<u8>,
    ) -> BoxFuture<'static, TransportResult<Vec<u8>>>;
}
