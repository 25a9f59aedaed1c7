//! Per-connection FEC state.
//!
//! Everything here lives exactly as long as the connection that owns it and is
//! only touched from that connection's serialized segment processing.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::option::{seq_before, EncodingType, FecOption, OptionFlags, SeqRange, MAX_RANGE_LEN};

/// Lifecycle of FEC on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FecPhase {
    /// Connection object created, nothing exchanged yet
    #[default]
    Uninitialized,
    /// Handshake in progress
    Negotiating,
    /// Both peers agreed on a type
    Enabled,
    /// Negotiation did not produce a common type
    Disabled,
}

impl FecPhase {
    /// Enabled and Disabled are final for the connection.
    pub fn is_terminal(self) -> bool {
        matches!(self, FecPhase::Enabled | FecPhase::Disabled)
    }
}

/// A retained span of stream bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedRange {
    /// Sequence number of the first byte
    pub seq: u32,
    /// The bytes themselves
    pub data: Bytes,
}

impl RetainedRange {
    /// Sequence span covered.
    pub fn range(&self) -> SeqRange {
        SeqRange::new(self.seq, self.data.len() as u32)
    }
}

/// FIFO of recently received bytes kept for local recovery.
///
/// The total size never exceeds the cap: eviction of the oldest ranges happens
/// inside [`push`](Self::push), before the new range is appended.
#[derive(Debug, Clone)]
pub struct RetainedBuffer {
    ranges: VecDeque<RetainedRange>,
    bytes: usize,
    cap: usize,
}

impl RetainedBuffer {
    /// Create an empty buffer holding at most `cap` bytes.
    pub fn new(cap: usize) -> Self {
        Self {
            ranges: VecDeque::new(),
            bytes: 0,
            cap,
        }
    }

    /// Append a range, evicting the oldest ranges to stay under the cap.
    ///
    /// A range larger than the whole cap keeps only its trailing bytes.
    pub fn push(&mut self, seq: u32, mut data: Bytes) {
        if data.is_empty() || self.cap == 0 {
            return;
        }

        let mut seq = seq;
        if data.len() > self.cap {
            let skip = data.len() - self.cap;
            data = data.slice(skip..);
            seq = seq.wrapping_add(skip as u32);
        }

        while self.bytes + data.len() > self.cap {
            match self.ranges.pop_front() {
                Some(evicted) => self.bytes -= evicted.data.len(),
                None => break,
            }
        }

        self.bytes += data.len();
        self.ranges.push_back(RetainedRange { seq, data });
    }

    /// Drop every range that ends at or before `seq`.
    pub fn release_before(&mut self, seq: u32) {
        while let Some(front) = self.ranges.front() {
            if seq_before(seq, front.range().end()) {
                break;
            }
            self.bytes -= front.data.len();
            self.ranges.pop_front();
        }
    }

    /// Retained ranges, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RetainedRange> {
        self.ranges.iter()
    }

    /// Total retained bytes.
    pub fn len(&self) -> usize {
        self.bytes
    }

    /// Check if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of retained ranges.
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    /// Byte cap.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.ranges.clear();
        self.bytes = 0;
    }
}

/// What the last inbound segment said about FEC.
///
/// Reset at the start of every inbound segment so that a missing option is
/// never confused with the previous segment's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundRecord {
    /// Option decoded from the current segment, if any
    pub option: Option<FecOption>,
    /// Type the peer offered or echoed during the handshake
    pub peer_type: EncodingType,
}

impl InboundRecord {
    /// Whether the current segment carried a valid FEC option.
    pub fn was_present(&self) -> bool {
        self.option.is_some()
    }

    /// Forget the per-segment fields.
    pub fn clear_segment(&mut self) {
        self.option = None;
    }
}

/// Listener-side record of what a connecting peer offered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingRequestState {
    /// Type carried by the peer's SYN
    pub offered_type: EncodingType,
    /// The offer was echoed back in our SYN-ACK
    pub echoed: bool,
}

/// FEC state owned by one connection.
#[derive(Debug, Clone)]
pub struct ConnectionFecState {
    pub(crate) phase: FecPhase,
    pub(crate) requested_type: EncodingType,
    pub(crate) negotiated_type: EncodingType,
    pub(crate) pending_flags: OptionFlags,
    pub(crate) next_unencoded_seq: u32,
    pub(crate) outstanding_lost_len: u32,
    pub(crate) last_lost_range: Option<SeqRange>,
    pub(crate) retained: RetainedBuffer,
    pub(crate) rx: InboundRecord,
}

impl ConnectionFecState {
    /// Fresh state; every field zero.
    pub fn new(retained_cap: usize) -> Self {
        Self {
            phase: FecPhase::Uninitialized,
            requested_type: EncodingType::None,
            negotiated_type: EncodingType::None,
            pending_flags: OptionFlags::empty(),
            next_unencoded_seq: 0,
            outstanding_lost_len: 0,
            last_lost_range: None,
            retained: RetainedBuffer::new(retained_cap),
            rx: InboundRecord::default(),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> FecPhase {
        self.phase
    }

    /// Type this endpoint asked for through the socket option.
    pub fn requested_type(&self) -> EncodingType {
        self.requested_type
    }

    /// Type both peers agreed on; `None` unless the handshake matched.
    pub fn negotiated_type(&self) -> EncodingType {
        self.negotiated_type
    }

    /// Whether FEC is active on this connection.
    pub fn is_enabled(&self) -> bool {
        self.phase == FecPhase::Enabled && self.negotiated_type.is_enabled()
    }

    /// Flags waiting for the next outgoing option.
    pub fn pending_flags(&self) -> OptionFlags {
        self.pending_flags
    }

    /// First sequence number not yet covered by a sent encoded segment.
    pub fn next_unencoded_seq(&self) -> u32 {
        self.next_unencoded_seq
    }

    /// Length of the loss report waiting to be sent.
    pub fn outstanding_lost_len(&self) -> u32 {
        self.outstanding_lost_len
    }

    /// Most recent loss range the peer reported.
    pub fn last_lost_range(&self) -> Option<SeqRange> {
        self.last_lost_range
    }

    /// Retained bytes used by recovery.
    pub fn retained(&self) -> &RetainedBuffer {
        &self.retained
    }

    /// Total retained bytes.
    pub fn retained_bytes(&self) -> usize {
        self.retained.len()
    }

    /// Inbound record for the current segment.
    pub fn inbound(&self) -> &InboundRecord {
        &self.rx
    }

    /// Ask for RECOVERY_CWR on the next option sent.
    pub fn signal_recovery_cwr(&mut self) {
        self.pending_flags.insert(OptionFlags::RECOVERY_CWR);
    }

    /// Ask for a loss report of `len` bytes on the next option sent.
    ///
    /// Lengths that do not fit the 24-bit range field are refused and leave
    /// any earlier report in place.
    pub fn report_recovery_failed(&mut self, len: u32) -> Result<()> {
        if len > MAX_RANGE_LEN {
            return Err(Error::RangeTooLong(len));
        }
        self.pending_flags.insert(OptionFlags::RECOVERY_FAILED);
        self.outstanding_lost_len = len;
        Ok(())
    }

    /// Keep received bytes for recovery.
    pub fn retain(&mut self, seq: u32, data: Bytes) {
        self.retained.push(seq, data);
    }

    /// Clear-after-send: one-shot flags go out once, then reset.
    pub(crate) fn on_option_sent(&mut self, sent: &FecOption) {
        if self.pending_flags.contains(OptionFlags::RECOVERY_FAILED) {
            self.outstanding_lost_len = 0;
        }
        self.pending_flags.remove(OptionFlags::ONE_SHOT);

        if let Some(range) = sent.encoded_range() {
            self.next_unencoded_seq = range.end();
        }
    }
}
