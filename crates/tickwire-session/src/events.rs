//! Events the endpoint's loops report to the owner loop.

use tickwire_transport::TransportError;

use crate::CloseReason;

#[derive(Debug)]
pub(crate) enum EndpointEvent {
    /// The peer answered a ping.
    Pong,
    ReadError(TransportError),
    WriteError(TransportError),
    /// A frame could not be routed.
    DispatchError(String),
    Close(CloseReason),
}
