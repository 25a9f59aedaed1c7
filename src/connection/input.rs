//! Receive-side option interpretation.

use crate::connection::{negotiation, FecConnection, FecPhase, Role};
use crate::option::{DecodeContext, FecOption, OptionFlags, SeqRange};

/// The parts of an incoming segment the interpreter looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InboundSegment<'a> {
    /// Sequence number of the segment
    pub seq: u32,
    /// Acknowledgment number of the segment
    pub ack_seq: u32,
    /// Segment has SYN set
    pub syn: bool,
    /// Raw FEC payload extracted by the host's option parser
    pub fec_payload: Option<&'a [u8]>,
}

/// What the host stack should do with the segment's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxVerdict {
    /// Ordinary stream data
    Deliver,
    /// Redundancy data for `range`; must not reach the application
    Redundancy(SeqRange),
}

impl RxVerdict {
    /// Whether the payload is FEC-encoded.
    pub fn is_encoded(&self) -> bool {
        matches!(self, RxVerdict::Redundancy(_))
    }
}

/// External recovery logic notified by the interpreter.
pub trait RecoveryHooks {
    /// The segment's payload is redundancy data covering `range`.
    fn on_encoded_segment(&mut self, range: SeqRange) {
        let _ = range;
    }

    /// The peer could not recover `range`.
    fn on_loss_report(&mut self, range: SeqRange) {
        let _ = range;
    }

    /// The peer sent non-empty signal flags.
    fn on_peer_flags(&mut self, flags: OptionFlags) {
        let _ = flags;
    }
}

impl RecoveryHooks for () {}

impl FecConnection {
    /// Interpret the FEC option of one inbound segment.
    ///
    /// Never fails: a malformed option is treated as absent.
    pub fn process_inbound<H: RecoveryHooks>(
        &mut self,
        segment: &InboundSegment<'_>,
        hooks: &mut H,
    ) -> RxVerdict {
        self.state.rx.clear_segment();

        if !self.admin_enabled() {
            return RxVerdict::Deliver;
        }

        if segment.syn {
            self.process_handshake(segment);
            return RxVerdict::Deliver;
        }

        if self.role == Role::Passive && self.state.phase == FecPhase::Negotiating {
            let pending = self.pending.take().unwrap_or_default();
            let negotiated = negotiation::finalize_passive(&mut self.state, pending);
            self.metrics.record_negotiation(negotiated.is_enabled());
        }

        if !self.state.is_enabled() {
            return RxVerdict::Deliver;
        }

        let Some(opt) = self.decode(segment) else {
            return RxVerdict::Deliver;
        };

        let flags = opt.flags();
        if !flags.is_empty() {
            hooks.on_peer_flags(flags);
        }

        match opt {
            FecOption::Encoded { range, .. } => {
                self.metrics.increment_encoded_received();
                hooks.on_encoded_segment(range);
                RxVerdict::Redundancy(range)
            }
            FecOption::LossReport { range, .. } => {
                self.metrics.increment_loss_reports();
                self.state.last_lost_range = Some(range);
                hooks.on_loss_report(range);
                RxVerdict::Deliver
            }
            FecOption::Negotiation(_) | FecOption::Flags(_) => RxVerdict::Deliver,
        }
    }

    fn process_handshake(&mut self, segment: &InboundSegment<'_>) {
        match (self.role, self.state.phase) {
            (Role::Passive, FecPhase::Uninitialized) => {
                let offer = self.decode(segment);
                let pending = negotiation::accept_offer(&mut self.state, offer, true);
                self.pending = Some(pending);
            }
            (Role::Active, FecPhase::Uninitialized | FecPhase::Negotiating) => {
                let echo = self.decode(segment);
                let negotiated = negotiation::finalize_active(&mut self.state, echo);
                self.metrics.record_negotiation(negotiated.is_enabled());
            }
            (_, phase) => {
                tracing::debug!(?phase, seq = segment.seq, "ignoring FEC option on repeated SYN");
            }
        }
    }

    fn decode(&mut self, segment: &InboundSegment<'_>) -> Option<FecOption> {
        let payload = segment.fec_payload?;
        let ctx = DecodeContext {
            seq: segment.seq,
            ack_seq: segment.ack_seq,
            is_syn: segment.syn,
        };

        match FecOption::decode(payload, ctx) {
            Ok(opt) => {
                self.metrics.increment_options_received();
                self.state.rx.option = Some(opt);
                Some(opt)
            }
            Err(e) => {
                tracing::debug!(seq = segment.seq, "ignoring FEC option: {}", e);
                self.metrics.increment_decode_failures();
                None
            }
        }
    }
}
