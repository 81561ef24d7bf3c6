//! One-shot alarm abstraction for the broadcast hold timer (BHT), shaped
//! after the teacher's `kernel::hil::time::Alarm`
//! (`examples/tock-tock/capsules/src/ieee802154/xmac.rs` arms and
//! re-arms a single alarm the same way).

pub trait Alarm {
    /// Current time, in microseconds, on whatever clock this alarm uses.
    fn now(&self) -> u32;

    /// Arm a one-shot alarm `us_from_now` microseconds out. Replaces any
    /// previously armed alarm.
    fn set_alarm(&mut self, us_from_now: u32);

    /// Disarm without firing.
    fn disarm(&mut self);
}
