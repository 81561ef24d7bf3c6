//! The upper-layer dispatch contract (§6). Stands in for RIOT's
//! `gnrc_netapi_dispatch_receive`/type-indexed subscriber registry.

pub trait UpperStack {
    /// Dispatch a fully MAC-processed frame's payload upward. Returns
    /// whether some subscriber claimed it; an unclaimed frame is dropped by
    /// the caller, matching `_pass_on_packet`.
    fn dispatch_receive(&mut self, pdu: &[u8]) -> bool;
}
