//! Error kinds for the duty-cycled router MAC.
//!
//! A hand-rolled enum with a manual `Display`/`Error` impl, in the style of
//! Tock's `ReturnCode` rather than a derive-macro crate: nothing in this
//! pack reaches for `thiserror`/`anyhow` inside a `no_std` crate.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The pending packet queue is at capacity.
    QueueFull,
    /// Immediate-broadcast mode: the radio was busy when a broadcast was
    /// submitted. The reference implementation drops the packet silently;
    /// this crate surfaces it instead (see `DESIGN.md`).
    BusBusy,
    /// The radio driver reported a fault servicing a request.
    RadioFault,
    /// CSMA and link-layer retries were both exhausted without an ACK.
    RetryExhausted,
    /// The broadcast hold timer could not be armed.
    BroadcastTimeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::QueueFull => "pending packet queue is full",
            Error::BusBusy => "radio busy, broadcast dropped",
            Error::RadioFault => "radio driver reported a fault",
            Error::RetryExhausted => "csma/link retries exhausted, no ack",
            Error::BroadcastTimeout => "broadcast hold timer could not be armed",
        };
        f.write_str(msg)
    }
}
