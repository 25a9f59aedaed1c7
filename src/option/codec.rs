//! FEC option payload codec.
//!
//! The same payload bytes mean different things depending on their length, on
//! whether the segment is a SYN, and on which flag bits are set:
//!
//! ```text
//! 1 byte, SYN         ┌──────────────┐
//!                     │ EncodingType │
//!                     └──────────────┘
//! 1 byte, otherwise   ┌──────────────┐
//!                     │ OptionFlags  │
//!                     └──────────────┘
//! 4 bytes             ┌──────────────┬───────────────────────────┐
//!                     │ OptionFlags  │ range length (24 bits)    │
//!                     └──────────────┴───────────────────────────┘
//!                       ENCODED         -> range starts at segment seq
//!                       RECOVERY_FAILED -> range starts at segment ack
//! ```

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};
use crate::option::types::{EncodingType, OptionFlags, SeqRange, MAX_RANGE_LEN};

/// Length of the short payload form.
pub const SHORT_PAYLOAD_LEN: usize = 1;

/// Length of the long payload form.
pub const LONG_PAYLOAD_LEN: usize = 4;

/// Segment fields the decoder needs to anchor ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeContext {
    /// Sequence number of the segment
    pub seq: u32,
    /// Acknowledgment number of the segment
    pub ack_seq: u32,
    /// Segment has SYN set
    pub is_syn: bool,
}

/// One decoded FEC option, tagged by its wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FecOption {
    /// Handshake request or echo of an encoding type
    Negotiation(EncodingType),
    /// Plain segment carrying only signal bits
    Flags(OptionFlags),
    /// Payload is redundancy data covering `range`
    Encoded {
        /// All flags carried by the option
        flags: OptionFlags,
        /// Encoded span, anchored at the segment's sequence number
        range: SeqRange,
    },
    /// Peer failed to recover `range`
    LossReport {
        /// All flags carried by the option
        flags: OptionFlags,
        /// Lost span, anchored at the segment's acknowledgment number
        range: SeqRange,
    },
}

impl FecOption {
    /// Decode an option payload.
    ///
    /// Fails with [`Error::InvalidOptionLength`] for payloads that are neither
    /// 1 nor 4 bytes, for a 4-byte payload without a ranged flag, and for a
    /// 1-byte plain payload that claims a ranged flag.
    pub fn decode(mut payload: &[u8], ctx: DecodeContext) -> Result<Self> {
        let len = payload.len();

        match len {
            SHORT_PAYLOAD_LEN => {
                let value = payload.get_u8();
                if ctx.is_syn {
                    return EncodingType::try_from(value).map(FecOption::Negotiation);
                }

                let flags = OptionFlags::from_bits_truncate(value);
                if flags.needs_range() {
                    return Err(Error::InvalidOptionLength { len });
                }
                Ok(FecOption::Flags(flags))
            }
            LONG_PAYLOAD_LEN => {
                let word = payload.get_u32();
                let flags = OptionFlags::from_bits_truncate((word >> 24) as u8);
                let range_len = word & MAX_RANGE_LEN;

                if flags.contains(OptionFlags::ENCODED) {
                    Ok(FecOption::Encoded {
                        flags,
                        range: SeqRange::new(ctx.seq, range_len),
                    })
                } else if flags.contains(OptionFlags::RECOVERY_FAILED) {
                    Ok(FecOption::LossReport {
                        flags,
                        range: SeqRange::new(ctx.ack_seq, range_len),
                    })
                } else {
                    Err(Error::InvalidOptionLength { len })
                }
            }
            _ => Err(Error::InvalidOptionLength { len }),
        }
    }

    /// Payload length of this option on the wire.
    pub fn payload_len(&self) -> usize {
        match self {
            FecOption::Negotiation(_) | FecOption::Flags(_) => SHORT_PAYLOAD_LEN,
            FecOption::Encoded { .. } | FecOption::LossReport { .. } => LONG_PAYLOAD_LEN,
        }
    }

    /// Write the payload bytes.
    pub fn encode_payload<B: BufMut>(&self, buf: &mut B) {
        match *self {
            FecOption::Negotiation(ty) => buf.put_u8(ty.into()),
            FecOption::Flags(flags) => buf.put_u8(flags.bits()),
            FecOption::Encoded { flags, range } | FecOption::LossReport { flags, range } => {
                buf.put_u32(((flags.bits() as u32) << 24) | (range.len & MAX_RANGE_LEN));
            }
        }
    }

    /// Signal bits carried by the option; empty for negotiation.
    pub fn flags(&self) -> OptionFlags {
        match *self {
            FecOption::Negotiation(_) => OptionFlags::empty(),
            FecOption::Flags(flags)
            | FecOption::Encoded { flags, .. }
            | FecOption::LossReport { flags, .. } => flags,
        }
    }

    /// Requested or echoed type, if this is a negotiation option.
    pub fn encoding_type(&self) -> Option<EncodingType> {
        match *self {
            FecOption::Negotiation(ty) => Some(ty),
            _ => None,
        }
    }

    /// Span of redundancy data carried by the segment.
    pub fn encoded_range(&self) -> Option<SeqRange> {
        match *self {
            FecOption::Encoded { range, .. } => Some(range),
            _ => None,
        }
    }

    /// Span the peer reported as unrecoverable.
    pub fn lost_range(&self) -> Option<SeqRange> {
        match *self {
            FecOption::LossReport { range, .. } => Some(range),
            _ => None,
        }
    }
}

/// What the sender wants to say on one segment, before pending flags merge in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionRequest {
    /// Handshake request or echo
    Negotiate(EncodingType),
    /// Established-phase signalling
    Signal {
        /// Flags computed for this segment (ENCODED, RECOVERY_SUCCESSFUL, ...)
        flags: OptionFlags,
        /// Sequence number of the segment being built
        seq: u32,
        /// Acknowledgment number of the segment being built
        ack_seq: u32,
        /// Bytes of redundancy carried when ENCODED is set
        encoded_len: u32,
        /// Bytes reported lost when RECOVERY_FAILED is set
        lost_len: u32,
    },
}

impl OptionRequest {
    /// Resolve the request into the option that goes on the wire.
    ///
    /// `pending` flags are merged into a signal request. When ENCODED and
    /// RECOVERY_FAILED coincide the failure report is dropped from this
    /// option, since the 4-byte form has room for one range only. This does
    /// not mutate `pending`; the caller clears one-shot flags once the option
    /// has actually been written.
    pub fn resolve(&self, pending: OptionFlags) -> Result<FecOption> {
        match *self {
            OptionRequest::Negotiate(ty) => Ok(FecOption::Negotiation(ty)),
            OptionRequest::Signal {
                flags,
                seq,
                ack_seq,
                encoded_len,
                lost_len,
            } => {
                let mut flags = flags | pending;

                if flags.contains(OptionFlags::ENCODED) {
                    flags.remove(OptionFlags::RECOVERY_FAILED);
                    Ok(FecOption::Encoded {
                        flags,
                        range: SeqRange::new(seq, checked_len(encoded_len)?),
                    })
                } else if flags.contains(OptionFlags::RECOVERY_FAILED) {
                    Ok(FecOption::LossReport {
                        flags,
                        range: SeqRange::new(ack_seq, checked_len(lost_len)?),
                    })
                } else {
                    Ok(FecOption::Flags(flags))
                }
            }
        }
    }
}

fn checked_len(len: u32) -> Result<u32> {
    if len > MAX_RANGE_LEN {
        return Err(Error::RangeTooLong(len));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use proptest::prelude::*;

    fn established(seq: u32, ack_seq: u32) -> DecodeContext {
        DecodeContext {
            seq,
            ack_seq,
            is_syn: false,
        }
    }

    fn syn() -> DecodeContext {
        DecodeContext {
            is_syn: true,
            ..DecodeContext::default()
        }
    }

    fn encode(option: &FecOption) -> BytesMut {
        let mut buf = BytesMut::new();
        option.encode_payload(&mut buf);
        buf
    }

    #[test]
    fn test_decode_negotiation() {
        let option = FecOption::decode(&[1], syn()).unwrap();
        assert_eq!(option, FecOption::Negotiation(EncodingType::XorAll));
        assert_eq!(option.encoding_type(), Some(EncodingType::XorAll));

        let option = FecOption::decode(&[0], syn()).unwrap();
        assert_eq!(option.encoding_type(), Some(EncodingType::None));
    }

    #[test]
    fn test_decode_negotiation_unknown_type() {
        let err = FecOption::decode(&[3], syn()).unwrap_err();
        assert!(matches!(err, Error::UnknownEncodingType(3)));
        assert!(err.is_soft());
    }

    #[test]
    fn test_decode_plain_flags() {
        let option = FecOption::decode(&[0x0C], established(1, 2)).unwrap();
        assert_eq!(
            option,
            FecOption::Flags(OptionFlags::RECOVERY_CWR | OptionFlags::RECOVERY_SUCCESSFUL)
        );
    }

    #[test]
    fn test_short_encoded_rejected() {
        // ENCODED needs the 4-byte form to carry its length
        let err = FecOption::decode(&[0x10], established(1000, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidOptionLength { len: 1 }));
    }

    #[test]
    fn test_decode_encoded_range() {
        let option = FecOption::decode(&[0x10, 0x00, 0x00, 0x14], established(1000, 7)).unwrap();
        assert_eq!(option.encoded_range(), Some(SeqRange::new(1000, 20)));
        assert_eq!(option.lost_range(), None);
        assert_eq!(option.flags(), OptionFlags::ENCODED);
    }

    #[test]
    fn test_decode_lost_range() {
        let option = FecOption::decode(&[0x20, 0x00, 0x00, 0x08], established(9, 2000)).unwrap();
        assert_eq!(option.lost_range(), Some(SeqRange::new(2000, 8)));
        assert_eq!(option.encoded_range(), None);
    }

    #[test]
    fn test_long_form_requires_ranged_flag() {
        for flags in [0x00u8, 0x04, 0x08, 0x0C, 0xC0] {
            let err = FecOption::decode(&[flags, 0, 0, 1], established(0, 0)).unwrap_err();
            assert!(matches!(err, Error::InvalidOptionLength { len: 4 }));
        }
    }

    #[test]
    fn test_invalid_lengths() {
        for len in [0usize, 2, 3, 5, 8, 40] {
            let payload = vec![0x10; len];
            let err = FecOption::decode(&payload, established(0, 0)).unwrap_err();
            assert!(matches!(err, Error::InvalidOptionLength { len: l } if l == len));
        }
    }

    #[test]
    fn test_encode_layout() {
        let option = FecOption::Encoded {
            flags: OptionFlags::ENCODED,
            range: SeqRange::new(1000, 20),
        };
        assert_eq!(encode(&option).as_ref(), &[0x10, 0x00, 0x00, 0x14]);
        assert_eq!(option.payload_len(), LONG_PAYLOAD_LEN);

        let option = FecOption::Negotiation(EncodingType::XorSkipOne);
        assert_eq!(encode(&option).as_ref(), &[0x02]);
        assert_eq!(option.payload_len(), SHORT_PAYLOAD_LEN);
    }

    #[test]
    fn test_resolve_merges_pending() {
        let request = OptionRequest::Signal {
            flags: OptionFlags::empty(),
            seq: 10,
            ack_seq: 20,
            encoded_len: 0,
            lost_len: 0,
        };
        let option = request.resolve(OptionFlags::RECOVERY_CWR).unwrap();
        assert_eq!(option, FecOption::Flags(OptionFlags::RECOVERY_CWR));

        let request = OptionRequest::Signal {
            flags: OptionFlags::empty(),
            seq: 10,
            ack_seq: 20,
            encoded_len: 0,
            lost_len: 300,
        };
        let option = request.resolve(OptionFlags::RECOVERY_FAILED).unwrap();
        assert_eq!(option.lost_range(), Some(SeqRange::new(20, 300)));
    }

    #[test]
    fn test_resolve_drops_failure_when_encoded() {
        let request = OptionRequest::Signal {
            flags: OptionFlags::ENCODED,
            seq: 10,
            ack_seq: 20,
            encoded_len: 1400,
            lost_len: 300,
        };
        let option = request.resolve(OptionFlags::RECOVERY_FAILED).unwrap();
        assert_eq!(
            option,
            FecOption::Encoded {
                flags: OptionFlags::ENCODED,
                range: SeqRange::new(10, 1400),
            }
        );
    }

    #[test]
    fn test_resolve_rejects_oversized_range() {
        let request = OptionRequest::Signal {
            flags: OptionFlags::ENCODED,
            seq: 0,
            ack_seq: 0,
            encoded_len: MAX_RANGE_LEN + 1,
            lost_len: 0,
        };
        assert!(matches!(request.resolve(OptionFlags::empty()), Err(Error::RangeTooLong(_))));
    }

    fn arb_signal_flags() -> impl Strategy<Value = OptionFlags> {
        any::<u8>().prop_map(OptionFlags::from_bits_truncate)
    }

    proptest! {
        #[test]
        fn prop_signal_roundtrip(
            flags in arb_signal_flags(),
            seq in any::<u32>(),
            ack_seq in any::<u32>(),
            encoded_len in 0..=MAX_RANGE_LEN,
            lost_len in 0..=MAX_RANGE_LEN,
        ) {
            let request = OptionRequest::Signal { flags, seq, ack_seq, encoded_len, lost_len };
            let sent = request.resolve(OptionFlags::empty()).unwrap();
            let bytes = encode(&sent);
            prop_assert_eq!(bytes.len(), sent.payload_len());

            let received = FecOption::decode(&bytes, established(seq, ack_seq)).unwrap();
            prop_assert_eq!(received, sent);
        }

        #[test]
        fn prop_invalid_length_rejected(payload in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assume!(payload.len() != SHORT_PAYLOAD_LEN && payload.len() != LONG_PAYLOAD_LEN);
            let is_invalid_length = matches!(
                FecOption::decode(&payload, established(0, 0)),
                Err(Error::InvalidOptionLength { .. })
            );
            prop_assert!(is_invalid_length);
        }
    }
}
