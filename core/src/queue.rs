//! Tagged FIFO of canonical voice units between the two sides of the gateway

use std::collections::VecDeque;

use log::warn;

use crate::ambe::VoiceFrame;
use crate::error::{GatewayError, Result};

/// Bound on queued entries per direction
pub const QUEUE_CAPACITY: usize = 5000;

/// Result of taking a frame's worth of units from a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    Header,
    Data,
    Eot,
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Header,
    Data(VoiceFrame),
    Eot,
}

#[derive(Debug)]
pub struct StreamQueue {
    entries: VecDeque<Entry>,
    capacity: usize,
    data_units: usize,
}

impl Default for StreamQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamQueue {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(QUEUE_CAPACITY)),
            capacity,
            data_units: 0,
        }
    }

    fn push(&mut self, entry: Entry) -> Result<()> {
        if self.entries.len() >= self.capacity {
            warn!("StreamQueue: overflow at {} entries, unit dropped", self.capacity);
            return Err(GatewayError::QueueOverflow {
                capacity: self.capacity,
            });
        }
        if matches!(entry, Entry::Data(_)) {
            self.data_units += 1;
        }
        self.entries.push_back(entry);
        Ok(())
    }

    pub fn push_header(&mut self) -> Result<()> {
        self.push(Entry::Header)
    }

    pub fn push_data(&mut self, unit: VoiceFrame) -> Result<()> {
        self.push(Entry::Data(unit))
    }

    pub fn push_eot(&mut self) -> Result<()> {
        self.push(Entry::Eot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued voice units, excluding header and EOT markers
    pub fn data_units(&self) -> usize {
        self.data_units
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.data_units = 0;
    }

    fn pop_data(&mut self) -> Option<VoiceFrame> {
        match self.entries.front() {
            Some(Entry::Data(unit)) => {
                let unit = *unit;
                self.entries.pop_front();
                self.data_units -= 1;
                Some(unit)
            }
            _ => None,
        }
    }

    /// Take one destination frame of `out.len()` units.
    ///
    /// A header or EOT at the head is returned on its own. A full group of
    /// units is returned as `Data`. When an EOT follows a partial group the
    /// partial units are discarded and `Eot` is returned; when a header follows
    /// one the group is padded with silence. Otherwise a partial group stays
    /// queued and `NoData` is returned.
    pub fn pop_group(&mut self, out: &mut [VoiceFrame]) -> FrameTag {
        let ratio = out.len();
        match self.entries.front() {
            None => return FrameTag::NoData,
            Some(Entry::Header) => {
                self.entries.pop_front();
                return FrameTag::Header;
            }
            Some(Entry::Eot) => {
                self.entries.pop_front();
                return FrameTag::Eot;
            }
            Some(Entry::Data(_)) => {}
        }

        let run = self
            .entries
            .iter()
            .take(ratio)
            .take_while(|e| matches!(e, Entry::Data(_)))
            .count();

        if run < ratio {
            match self.entries.get(run) {
                Some(Entry::Eot) => {
                    for _ in 0..run {
                        self.pop_data();
                    }
                    self.entries.pop_front();
                    return FrameTag::Eot;
                }
                Some(Entry::Header) => {
                    let silence = VoiceFrame::silence();
                    for (i, slot) in out.iter_mut().enumerate() {
                        *slot = if i < run {
                            self.pop_data().unwrap_or(silence)
                        } else {
                            silence
                        };
                    }
                    return FrameTag::Data;
                }
                _ => return FrameTag::NoData,
            }
        }

        for slot in out.iter_mut() {
            // run == ratio, so every pop yields a unit
            *slot = self.pop_data().unwrap_or_default();
        }
        FrameTag::Data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(n: u32) -> VoiceFrame {
        VoiceFrame::from_fields(n, n, n)
    }

    #[test]
    fn test_empty_queue() {
        let mut q = StreamQueue::new();
        let mut out = [VoiceFrame::default(); 3];
        assert_eq!(q.pop_group(&mut out), FrameTag::NoData);
        assert!(q.is_empty());
    }

    #[test]
    fn test_header_data_eot_sequence() {
        let mut q = StreamQueue::new();
        q.push_header().unwrap();
        for n in 0..6 {
            q.push_data(unit(n)).unwrap();
        }
        q.push_eot().unwrap();
        assert_eq!(q.data_units(), 6);

        let mut out = [VoiceFrame::default(); 3];
        assert_eq!(q.pop_group(&mut out), FrameTag::Header);
        assert_eq!(q.pop_group(&mut out), FrameTag::Data);
        assert_eq!(out, [unit(0), unit(1), unit(2)]);
        assert_eq!(q.pop_group(&mut out), FrameTag::Data);
        assert_eq!(out, [unit(3), unit(4), unit(5)]);
        assert_eq!(q.pop_group(&mut out), FrameTag::Eot);
        assert_eq!(q.pop_group(&mut out), FrameTag::NoData);
    }

    #[test]
    fn test_partial_group_waits() {
        let mut q = StreamQueue::new();
        q.push_data(unit(1)).unwrap();
        q.push_data(unit(2)).unwrap();
        let mut out = [VoiceFrame::default(); 3];
        assert_eq!(q.pop_group(&mut out), FrameTag::NoData);
        assert_eq!(q.data_units(), 2);
        q.push_data(unit(3)).unwrap();
        assert_eq!(q.pop_group(&mut out), FrameTag::Data);
    }

    #[test]
    fn test_eot_inside_group_wins() {
        let mut q = StreamQueue::new();
        q.push_data(unit(1)).unwrap();
        q.push_data(unit(2)).unwrap();
        q.push_eot().unwrap();
        q.push_data(unit(9)).unwrap();
        let mut out = [VoiceFrame::default(); 5];
        assert_eq!(q.pop_group(&mut out), FrameTag::Eot);
        assert_eq!(q.data_units(), 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_header_inside_group_pads_with_silence() {
        let mut q = StreamQueue::new();
        q.push_data(unit(1)).unwrap();
        q.push_header().unwrap();
        let mut out = [VoiceFrame::default(); 3];
        assert_eq!(q.pop_group(&mut out), FrameTag::Data);
        assert_eq!(out, [unit(1), VoiceFrame::silence(), VoiceFrame::silence()]);
        assert_eq!(q.pop_group(&mut out), FrameTag::Header);
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut q = StreamQueue::with_capacity(2);
        q.push_header().unwrap();
        q.push_data(unit(1)).unwrap();
        assert!(matches!(
            q.push_data(unit(2)),
            Err(GatewayError::QueueOverflow { capacity: 2 })
        ));
        assert_eq!(q.len(), 2);
        q.clear();
        assert_eq!(q.data_units(), 0);
        assert!(q.push_eot().is_ok());
    }
}
