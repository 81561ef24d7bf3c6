//! The netdev-like capability set the MAC controller requires from a radio
//! driver (§6). Generalizes RIOT's `netdev_driver_t` the same way the
//! teacher's `kernel::hil::radio::Radio` generalizes an 802.15.4 transceiver:
//! synchronous `get`/`set`, asynchronous completion signalled out-of-band as
//! a `RadioEvent` fed back into `MacController::handle_radio_event`.

use crate::frame::{Frame, L2Addr, Pdu};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    Off,
    Sleep,
    Idle,
    Rx,
    Tx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioOption {
    Channel,
    TxPower,
    Nid,
    Address,
    AddressLong,
    PromiscuousMode,
    State,
    AckPending,
}

/// Events the radio driver reports back to the MAC controller. `Isr` stands
/// for the generic "something happened, come service me" signal
/// (`NETDEV_MSG_TYPE_EVENT` in the source); the rest are the concrete
/// `NETDEV_EVENT_*` values the event callback switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    Isr,
    RxDataRequest,
    RxComplete,
    TxComplete,
    TxCompleteDataPending,
    TxMediumBusy,
    TxNoAck,
}

#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub src: L2Addr,
    pub rssi_raw: i8,
    pub lqi: u8,
    pub pdu: Pdu,
}

/// Maximum number of logical events one `isr()` service call may resolve
/// into. The reference driver's ISR bottom half reports at most a handful
/// of `NETDEV_EVENT_*`s per call.
pub const MAX_ISR_EVENTS: usize = 4;

pub trait Radio {
    fn init(&mut self);

    /// Hand a brand-new frame to the radio (`retransmission == false`
    /// path of the source's `send_packet`/`send_without_release`).
    fn send(&mut self, frame: &Frame, more_pending: bool) -> Result<(), i32>;

    /// Re-hand an already-submitted frame to the radio without rebuilding
    /// on-air state (the CSMA/link retry path, `retransmission == true`).
    fn resend(&mut self, frame: &Frame, more_pending: bool) -> Result<(), i32>;

    /// Service a pending interrupt, returning whatever logical events it
    /// resolved into. Never called reentrantly by this crate — the caller
    /// clears `irq_pending` and drains the returned events itself.
    fn isr(&mut self) -> heapless::Vec<RadioEvent, MAX_ISR_EVENTS>;

    /// Pull the frame a `RxComplete` event refers to.
    fn recv(&mut self) -> Option<ReceivedFrame>;

    fn state(&self) -> RadioState;

    fn get_option(&self, opt: RadioOption, buf: &mut [u8]) -> usize;
    fn set_option(&mut self, opt: RadioOption, buf: &[u8]) -> usize;

    /// `NETOPT_STATE == NETOPT_STATE_RX` in the source's `is_receiving`.
    fn is_receiving(&self) -> bool {
        self.state() == RadioState::Rx
    }
}
