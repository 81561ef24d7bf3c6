//! Compile-time configuration for the duty-cycled router MAC.
//!
//! These mirror the `#define`s in the reference implementation
//! (`NETDEV_PKT_QUEUE_SIZE`, `NEIGHBOR_TABLE_SIZE`,
//! `DUTYCYCLE_SLEEP_INTERVAL`, `ENABLE_BROADCAST_QUEUEING`) as plain
//! `const`s and a Cargo feature rather than C preprocessor switches.

/// Capacity of the pending packet queue (`NETDEV_PKT_QUEUE_SIZE`).
pub const PENDING_QUEUE_SIZE: usize = 64;

/// Capacity of the neighbor table (`NEIGHBOR_TABLE_SIZE`).
pub const NEIGHBOR_TABLE_SIZE: usize = 10;

/// Capacity of the MAC thread's self-message queue
/// (`NETDEV_NETAPI_MSG_QUEUE_SIZE`).
pub const SELF_MESSAGE_QUEUE_SIZE: usize = 8;

/// `macMaxCSMABackoffs`, IEEE 802.15.4 default.
pub const MAX_CSMA_RETRIES: u8 = 4;

/// `macMaxFrameRetries`, IEEE 802.15.4 default.
pub const MAX_LINK_RETRIES: u8 = 3;

/// How long a broadcast is held at the head of the queue so every
/// duty-cycled neighbor has a chance to wake and hear it, in microseconds
/// (`DUTYCYCLE_SLEEP_INTERVAL`).
pub const DUTYCYCLE_SLEEP_INTERVAL_US: u32 = 500_000;

/// Extra slack added before the broadcast hold timer fires (the source's
/// `+ 100`).
pub const BROADCAST_HOLD_SLACK_US: u32 = 100;

/// Total broadcast hold window, in microseconds.
pub const fn broadcast_hold_us() -> u32 {
    DUTYCYCLE_SLEEP_INTERVAL_US + BROADCAST_HOLD_SLACK_US
}

/// Whether broadcasts are queued behind a hold-down timer (`true`) or
/// handed straight to the radio and dropped on contention (`false`, the
/// default — `ENABLE_BROADCAST_QUEUEING` is off in the reference build).
pub const fn broadcast_queueing_enabled() -> bool {
    cfg!(feature = "broadcast-queueing")
}

/// Sentinel destination meaning "no destination remembered yet"
/// (`recent_dst_l2addr`'s `0xFFFF` reset value).
pub const NONE_DST: u16 = 0xffff;
