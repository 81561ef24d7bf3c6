//! `dutymac_router`: the duty-cycled IEEE 802.15.4 router MAC layer (§1-§2).
//!
//! A single-event-loop actor (`MacController`) that owns one radio device
//! and mediates outbound traffic to a mixed population of always-on and
//! duty-cycled neighbors through a pending packet queue (`ppq`), a neighbor
//! link-quality table (`neighbor`), a two-layer CSMA/link retry engine
//! (`rce`), and a broadcast hold-down timer driven through the `timer`
//! abstraction. See `SPEC_FULL.md`/`DESIGN.md` for how each module maps back
//! onto the reference implementation this crate reimplements.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod neighbor;
pub mod ppq;
pub mod radio;
pub mod rce;
pub mod timer;
pub mod upper;
mod util;

pub use controller::MacController;
pub use error::Error;
pub use frame::{Frame, FrameKind, L2Addr, SenderId};
pub use neighbor::{NeighborEntry, NeighborTable};
pub use radio::{Radio, RadioEvent, RadioOption, RadioState, ReceivedFrame};
pub use timer::Alarm;
pub use upper::UpperStack;
