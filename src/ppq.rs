//! Pending Packet Queue (PPQ): the single in-flight-plus-backlog queue the
//! MC drains, including the broadcast-hold-down bookkeeping (§3, §4.1).

use crate::config::{self, PENDING_QUEUE_SIZE};
use crate::error::Error;
use crate::frame::{Frame, SenderId};
use crate::neighbor::NeighborTable;
use crate::util;
use heapless::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpqKind {
    Unicast,
    Broadcast,
}

pub struct PpqEntry {
    pub sender: SenderId,
    pub kind: PpqKind,
    pub frame: Frame,
}

/// Result of a successful `select_next`: which entry was chosen, and the
/// destination the caller should remember as `recent_dst`.
pub struct Selection {
    pub index: usize,
    pub dst: u16,
}

pub struct PendingPacketQueue {
    entries: Vec<PpqEntry, PENDING_QUEUE_SIZE>,
    /// Count of broadcast-queueing-mode entries held at the queue head
    /// (`broadcasting_num`). Always `0` outside the `broadcast-queueing`
    /// feature.
    broadcasting_num: usize,
    /// Index of the in-flight entry, or `None` (`sending_pkt_key`'s
    /// `0xFF` sentinel).
    sending_pkt_key: Option<usize>,
}

impl PendingPacketQueue {
    pub fn new() -> Self {
        PendingPacketQueue {
            entries: Vec::new(),
            broadcasting_num: 0,
            sending_pkt_key: None,
        }
    }

    pub fn pending_num(&self) -> usize {
        self.entries.len()
    }

    pub fn broadcasting_num(&self) -> usize {
        self.broadcasting_num
    }

    pub fn sending_pkt_key(&self) -> Option<usize> {
        self.sending_pkt_key
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == PENDING_QUEUE_SIZE
    }

    pub fn in_flight(&self) -> Option<&PpqEntry> {
        self.sending_pkt_key.and_then(|i| self.entries.get(i))
    }

    /// §4.1 enqueue. `radio_busy` gates the immediate-broadcast path.
    ///
    /// Returns `Ok(true)` when the caller must act immediately: either this
    /// was the first broadcast to reach the head in `broadcast-queueing`
    /// mode (the caller arms the BHT), or this is an immediate-mode
    /// broadcast that was just handed a `sending_pkt_key` (the caller must
    /// kick the radio). `Ok(false)` means the frame was queued normally.
    pub fn enqueue(
        &mut self,
        frame: Frame,
        sender: SenderId,
        radio_busy: bool,
    ) -> Result<bool, Error> {
        if self.is_full() {
            return Err(Error::QueueFull);
        }

        if frame.is_broadcast() {
            if config::broadcast_queueing_enabled() {
                let at = self.broadcasting_num;
                let entry = PpqEntry {
                    sender,
                    kind: PpqKind::Broadcast,
                    frame,
                };
                util::insert_at(&mut self.entries, at, entry)
                    .map_err(|_| Error::QueueFull)?;
                let first = self.broadcasting_num == 0;
                self.broadcasting_num += 1;
                if first {
                    self.sending_pkt_key = Some(0);
                }
                Ok(first)
            } else {
                if radio_busy {
                    return Err(Error::BusBusy);
                }
                let idx = self.entries.len();
                self.entries
                    .push(PpqEntry {
                        sender,
                        kind: PpqKind::Broadcast,
                        frame,
                    })
                    .map_err(|_| Error::QueueFull)?;
                self.sending_pkt_key = Some(idx);
                Ok(true)
            }
        } else {
            self.entries
                .push(PpqEntry {
                    sender,
                    kind: PpqKind::Unicast,
                    frame,
                })
                .map_err(|_| Error::QueueFull)?;
            Ok(false)
        }
    }

    /// §4.1 select_next. Precondition: no in-flight entry.
    pub fn select_next(
        &mut self,
        broadcasting: bool,
        to_dutycycled: bool,
        hint_addr: u16,
        nt: &NeighborTable,
    ) -> Option<Selection> {
        debug_assert!(self.sending_pkt_key.is_none());

        if broadcasting {
            self.sending_pkt_key = Some(0);
            return Some(Selection {
                index: 0,
                dst: config::NONE_DST,
            });
        }

        for (i, e) in self.entries.iter().enumerate() {
            let dst = e.frame.routing_key();
            let matches = if to_dutycycled {
                dst == hint_addr
            } else {
                !nt.is_dutycycled(dst)
            };
            if matches {
                self.sending_pkt_key = Some(i);
                return Some(Selection { index: i, dst });
            }
        }
        None
    }

    /// §4.1 remove_head_of_inflight. Returns `true` when a further
    /// broadcast-queueing entry is now at the head (the caller re-arms the
    /// BHT instead of attempting another send).
    pub fn remove_head_of_inflight(&mut self) -> bool {
        let idx = match self.sending_pkt_key.take() {
            Some(i) => i,
            None => return false,
        };
        util::remove_at(&mut self.entries, idx);
        if self.broadcasting_num > 0 {
            self.sending_pkt_key = Some(0);
            true
        } else {
            false
        }
    }

    /// Called by the BHT's timer-fired handler before posting `RemoveQueue`.
    pub fn on_broadcast_timeout(&mut self) {
        if self.broadcasting_num > 0 {
            self.broadcasting_num -= 1;
        }
    }
}

impl Default for PendingPacketQueue {
    fn default() -> Self {
        Self::new()
    }
}
