//! Transmit-side option assembly.

use bytes::BufMut;

use crate::connection::{negotiation, FecConnection, Role};
use crate::option::{
    self, FecOption, OptionFlags, OptionRequest, FEC_OPTION_SPACE, MAX_OPTIONS_LEN,
};

/// Redundancy metadata the recovery logic attaches to an outgoing segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxFecMeta {
    /// Flags for this segment (ENCODED, RECOVERY_SUCCESSFUL)
    pub flags: OptionFlags,
    /// Bytes of redundancy carried when ENCODED is set
    pub encoded_len: u32,
}

impl TxFecMeta {
    /// Metadata for a redundancy segment covering `len` bytes.
    pub fn encoded(len: u32) -> Self {
        Self {
            flags: OptionFlags::ENCODED,
            encoded_len: len,
        }
    }
}

/// The parts of an outgoing segment the assembler looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutboundSegment {
    /// Sequence number of the segment
    pub seq: u32,
    /// Acknowledgment number of the segment
    pub ack_seq: u32,
    /// Segment has SYN set
    pub syn: bool,
    /// Option bytes still free in the segment
    pub option_space: usize,
    /// Side channel from the recovery logic
    pub fec_meta: Option<TxFecMeta>,
}

impl FecConnection {
    /// Option space to reserve for established-phase segments.
    ///
    /// Callers packing other options must subtract this first.
    pub fn reserved_option_space(&self) -> usize {
        if self.admin_enabled() && self.state.is_enabled() {
            FEC_OPTION_SPACE
        } else {
            0
        }
    }

    /// Write the FEC option for `segment` into `buf`.
    ///
    /// Returns the number of option bytes written, 0 when no option goes on
    /// this segment. One-shot flags are cleared only when an option is
    /// actually written.
    pub fn write_option<B: BufMut>(&mut self, segment: &OutboundSegment, buf: &mut B) -> usize {
        let Some(opt) = self.assemble(segment) else {
            return 0;
        };

        let written = option::write_option(&opt, buf);
        if !segment.syn {
            self.state.on_option_sent(&opt);
        }
        self.metrics.increment_options_sent();
        written
    }

    fn assemble(&mut self, segment: &OutboundSegment) -> Option<FecOption> {
        let enabled = self.admin_enabled();
        let option_space = segment.option_space.min(MAX_OPTIONS_LEN);

        if segment.syn {
            return match self.role {
                Role::Active => negotiation::request(&mut self.state, enabled, option_space),
                Role::Passive => match self.pending.as_mut() {
                    Some(pending) => {
                        negotiation::echo(&self.state, pending, enabled, option_space)
                    }
                    None => None,
                },
            };
        }

        if !enabled || !self.state.is_enabled() {
            return None;
        }

        if option_space < FEC_OPTION_SPACE {
            tracing::debug!(option_space, seq = segment.seq, "no room for FEC option");
            self.metrics.increment_options_omitted();
            return None;
        }

        let meta = segment.fec_meta.unwrap_or_default();
        let request = OptionRequest::Signal {
            flags: meta.flags,
            seq: segment.seq,
            ack_seq: segment.ack_seq,
            encoded_len: meta.encoded_len,
            lost_len: self.state.outstanding_lost_len,
        };

        match request.resolve(self.state.pending_flags) {
            Ok(opt) => Some(opt),
            Err(e) => {
                tracing::debug!(seq = segment.seq, "FEC option omitted: {}", e);
                self.metrics.increment_options_omitted();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FecConfig, FecSysctl};
    use crate::connection::{FecMetrics, FecPhase};
    use crate::option::{EncodingType, SeqRange, MAX_RANGE_LEN};
    use bytes::BytesMut;
    use std::sync::Arc;

    fn enabled_conn() -> FecConnection {
        let mut conn = FecConnection::active(
            &FecConfig::default(),
            Arc::new(FecSysctl::new(true)),
            Arc::new(FecMetrics::new()),
        );
        conn.state.negotiated_type = EncodingType::XorAll;
        conn.state.phase = FecPhase::Enabled;
        conn
    }

    fn data_segment(seq: u32, ack_seq: u32) -> OutboundSegment {
        OutboundSegment {
            seq,
            ack_seq,
            syn: false,
            option_space: 40,
            fec_meta: None,
        }
    }

    fn sent(conn: &mut FecConnection, segment: &OutboundSegment) -> Option<FecOption> {
        let mut buf = BytesMut::new();
        let n = conn.write_option(segment, &mut buf);
        assert_eq!(n, buf.len());
        (n > 0).then(|| {
            let payload = option::find_fec_payload(&buf).unwrap();
            FecOption::decode(
                payload,
                option::DecodeContext {
                    seq: segment.seq,
                    ack_seq: segment.ack_seq,
                    is_syn: segment.syn,
                },
            )
            .unwrap()
        })
    }

    #[test]
    fn test_syn_carries_request() {
        let mut conn = FecConnection::active(
            &FecConfig::default(),
            Arc::new(FecSysctl::new(true)),
            Arc::new(FecMetrics::new()),
        );
        conn.set_fec_type(1).unwrap();

        let syn = OutboundSegment {
            syn: true,
            option_space: 20,
            ..OutboundSegment::default()
        };
        assert_eq!(sent(&mut conn, &syn), Some(FecOption::Negotiation(EncodingType::XorAll)));
        assert_eq!(conn.phase(), FecPhase::Negotiating);
    }

    #[test]
    fn test_established_always_attached() {
        let mut conn = enabled_conn();
        assert_eq!(conn.reserved_option_space(), FEC_OPTION_SPACE);
        assert_eq!(
            sent(&mut conn, &data_segment(1, 2)),
            Some(FecOption::Flags(OptionFlags::empty()))
        );
    }

    #[test]
    fn test_encoded_meta() {
        let mut conn = enabled_conn();
        let segment = OutboundSegment {
            fec_meta: Some(TxFecMeta::encoded(2800)),
            ..data_segment(5000, 0)
        };

        let opt = sent(&mut conn, &segment).unwrap();
        assert_eq!(opt.encoded_range(), Some(SeqRange::new(5000, 2800)));
        assert_eq!(conn.state().next_unencoded_seq(), 7800);
    }

    #[test]
    fn test_one_shot_cleared_once_per_transmission() {
        let mut conn = enabled_conn();
        conn.signal_recovery_cwr();
        conn.report_recovery_failed(64).unwrap();

        // Not enough room: nothing written, flags stay pending
        let cramped = OutboundSegment {
            option_space: 4,
            ..data_segment(10, 900)
        };
        assert_eq!(sent(&mut conn, &cramped), None);
        assert_eq!(
            conn.state().pending_flags(),
            OptionFlags::RECOVERY_CWR | OptionFlags::RECOVERY_FAILED
        );

        let opt = sent(&mut conn, &data_segment(10, 900)).unwrap();
        assert_eq!(opt.lost_range(), Some(SeqRange::new(900, 64)));
        assert!(opt.flags().contains(OptionFlags::RECOVERY_CWR));
        assert!(conn.state().pending_flags().is_empty());

        let opt = sent(&mut conn, &data_segment(11, 900)).unwrap();
        assert_eq!(opt, FecOption::Flags(OptionFlags::empty()));
    }

    #[test]
    fn test_encoded_wins_over_failure_report() {
        let mut conn = enabled_conn();
        conn.report_recovery_failed(64).unwrap();

        let segment = OutboundSegment {
            fec_meta: Some(TxFecMeta::encoded(1000)),
            ..data_segment(10, 900)
        };
        let opt = sent(&mut conn, &segment).unwrap();

        assert_eq!(opt.flags(), OptionFlags::ENCODED);
        // The report is lost, not deferred
        assert!(conn.state().pending_flags().is_empty());
        assert_eq!(conn.state().outstanding_lost_len(), 0);
    }

    #[test]
    fn test_recovery_successful_not_auto_cleared() {
        let mut conn = enabled_conn();
        let segment = OutboundSegment {
            fec_meta: Some(TxFecMeta {
                flags: OptionFlags::RECOVERY_SUCCESSFUL,
                encoded_len: 0,
            }),
            ..data_segment(1, 1)
        };
        assert_eq!(
            sent(&mut conn, &segment),
            Some(FecOption::Flags(OptionFlags::RECOVERY_SUCCESSFUL))
        );
        // Per-segment flag: next segment without metadata does not carry it
        assert_eq!(
            sent(&mut conn, &data_segment(2, 1)),
            Some(FecOption::Flags(OptionFlags::empty()))
        );
    }

    #[test]
    fn test_nothing_sent_when_disabled() {
        let mut conn = enabled_conn();
        conn.sysctl.set_enabled(false);
        assert_eq!(conn.reserved_option_space(), 0);
        assert_eq!(sent(&mut conn, &data_segment(1, 1)), None);

        let mut conn = FecConnection::active(
            &FecConfig::default(),
            Arc::new(FecSysctl::new(true)),
            Arc::new(FecMetrics::new()),
        );
        assert_eq!(sent(&mut conn, &data_segment(1, 1)), None);
    }

    #[test]
    fn test_oversized_range_omitted() {
        let mut conn = enabled_conn();
        let segment = OutboundSegment {
            fec_meta: Some(TxFecMeta::encoded(1 << 24)),
            ..data_segment(1, 1)
        };
        assert_eq!(sent(&mut conn, &segment), None);
        assert_eq!(conn.metrics.snapshot().options_omitted, 1);
    }

    #[test]
    fn test_syn_retransmit_keeps_settled_phase() {
        let mut conn = enabled_conn();
        let syn = OutboundSegment {
            syn: true,
            option_space: 40,
            ..OutboundSegment::default()
        };

        assert_eq!(sent(&mut conn, &syn), None);
        assert_eq!(conn.phase(), FecPhase::Enabled);
        assert_eq!(conn.reserved_option_space(), FEC_OPTION_SPACE);
        assert_eq!(
            sent(&mut conn, &data_segment(1, 1)),
            Some(FecOption::Flags(OptionFlags::empty()))
        );
    }

    #[test]
    fn test_oversized_loss_report_keeps_option_flowing() {
        let mut conn = enabled_conn();
        assert!(conn.report_recovery_failed(MAX_RANGE_LEN + 1).is_err());
        assert!(conn.state().pending_flags().is_empty());

        for seq in 0..5 {
            assert_eq!(
                sent(&mut conn, &data_segment(seq, 1)),
                Some(FecOption::Flags(OptionFlags::empty()))
            );
        }

        conn.report_recovery_failed(MAX_RANGE_LEN).unwrap();
        let opt = sent(&mut conn, &data_segment(5, 1)).unwrap();
        assert_eq!(opt.lost_range(), Some(SeqRange::new(1, MAX_RANGE_LEN)));
    }
}
