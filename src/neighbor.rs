//! Neighbor table (NT): per-neighbor link quality EMA and duty-cycle
//! observation (§3, §4.2).

use crate::config::NEIGHBOR_TABLE_SIZE;
use crate::util;
use heapless::Vec;

/// AT86RF233 raw-to-dBm mapping used by the reference implementation.
pub fn rssi_from_raw(raw: i8) -> i8 {
    (-94i32 + 3 * raw as i32) as i8
}

/// Integer EMA, weight 0.8/0.2, matching the source's truncating
/// `(8 * old + 2 * new) / 10`.
fn ema(old: i32, sample: i32) -> i32 {
    (8 * old + 2 * sample) / 10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborEntry {
    pub addr: u16,
    pub rssi: i8,
    pub lqi: u8,
    pub etx: u8,
    pub dutycycle: u16,
    last_seen: u32,
}

pub struct NeighborTable {
    entries: Vec<NeighborEntry, NEIGHBOR_TABLE_SIZE>,
}

impl NeighborTable {
    pub fn new() -> Self {
        NeighborTable { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, addr: u16) -> Option<&NeighborEntry> {
        self.entries.iter().find(|e| e.addr == addr)
    }

    /// §4.2 `neighbor_table_update`. `now` is a monotonically increasing RX
    /// sequence number, used only to break ties on overflow — see
    /// `DESIGN.md` for why LRU-by-last-RX was picked over round-robin for
    /// the open "NT overflow" question.
    pub fn update(&mut self, addr: u16, rssi_raw: i8, lqi: u8, now: u32) {
        let sample_rssi = rssi_from_raw(rssi_raw) as i32;

        if let Some(e) = self.entries.iter_mut().find(|e| e.addr == addr) {
            e.rssi = ema(e.rssi as i32, sample_rssi) as i8;
            e.lqi = ema(e.lqi as i32, lqi as i32) as u8;
            e.last_seen = now;
            return;
        }

        if self.entries.len() == NEIGHBOR_TABLE_SIZE {
            if let Some((idx, _)) = self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.last_seen)
            {
                util::remove_at(&mut self.entries, idx);
            }
        }

        let _ = self.entries.push(NeighborEntry {
            addr,
            rssi: sample_rssi as i8,
            lqi,
            etx: 0,
            // "observed" — the source's freshly-learned default, as
            // opposed to the startup pre-fill sentinel `0xffff` ("unknown").
            dutycycle: 1,
            last_seen: now,
        });
    }

    /// `dutycycle != 0`. Unknown neighbors are treated as always-on.
    pub fn is_dutycycled(&self, addr: u16) -> bool {
        self.get(addr).map(|e| e.dutycycle != 0).unwrap_or(false)
    }

    /// Stand-in for the provisioning channel `spec.md` calls out of scope:
    /// explicitly mark (or unmark, with `0`) a neighbor as duty-cycled.
    /// No-op if the neighbor hasn't been observed yet.
    pub fn provision(&mut self, addr: u16, dutycycle: u16) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.addr == addr) {
            e.dutycycle = dutycycle;
        }
    }
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::new()
    }
}
