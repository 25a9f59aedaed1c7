//! Value types carried by the FEC option.

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Largest value of the 24-bit length field.
pub const MAX_RANGE_LEN: u32 = 0x00FF_FFFF;

/// Redundancy scheme negotiated for a connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncodingType {
    /// FEC disabled
    #[default]
    None = 0,
    /// Redundancy XORs every MSS-sized chunk
    XorAll = 1,
    /// Redundancy XORs every other MSS-sized chunk
    XorSkipOne = 2,
}

impl EncodingType {
    /// Number of defined encoding types; valid wire values are `0..COUNT`.
    pub const COUNT: u8 = 3;

    /// Check whether this type actually enables FEC.
    pub fn is_enabled(self) -> bool {
        self != EncodingType::None
    }
}

impl TryFrom<u8> for EncodingType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(EncodingType::None),
            1 => Ok(EncodingType::XorAll),
            2 => Ok(EncodingType::XorSkipOne),
            _ => Err(Error::UnknownEncodingType(value)),
        }
    }
}

impl From<EncodingType> for u8 {
    fn from(ty: EncodingType) -> u8 {
        ty as u8
    }
}

bitflags! {
    /// Signal bits sent in the high byte of the option payload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OptionFlags: u8 {
        /// Sender reduced its congestion window after a recovery
        const RECOVERY_CWR        = 0x04;
        /// Receiver recovered a lost segment locally
        const RECOVERY_SUCCESSFUL = 0x08;
        /// Segment payload is redundancy data
        const ENCODED             = 0x10;
        /// Receiver failed to recover a lost range
        const RECOVERY_FAILED     = 0x20;
    }
}

impl OptionFlags {
    /// Flags that need the 4-byte payload to carry their range length.
    pub const RANGED: OptionFlags = OptionFlags::ENCODED.union(OptionFlags::RECOVERY_FAILED);

    /// Flags cleared from pending state once they have been sent.
    pub const ONE_SHOT: OptionFlags =
        OptionFlags::RECOVERY_CWR.union(OptionFlags::RECOVERY_FAILED);

    /// Check whether any flag requires the long payload form.
    pub fn needs_range(self) -> bool {
        self.intersects(Self::RANGED)
    }
}

/// A span of sequence space: `len` bytes starting at `seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeqRange {
    /// First sequence number of the span
    pub seq: u32,
    /// Length in bytes (24 bits on the wire)
    pub len: u32,
}

impl SeqRange {
    /// Create a new range.
    pub fn new(seq: u32, len: u32) -> Self {
        Self { seq, len }
    }

    /// Sequence number one past the end of the range (wrapping).
    pub fn end(&self) -> u32 {
        self.seq.wrapping_add(self.len)
    }

    /// Check whether `seq` falls inside the range, honouring wraparound.
    pub fn contains(&self, seq: u32) -> bool {
        seq.wrapping_sub(self.seq) < self.len
    }
}

/// `a` precedes `b` in 32-bit sequence space.
pub fn seq_before(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_type_range() {
        assert_eq!(EncodingType::try_from(0).unwrap(), EncodingType::None);
        assert_eq!(EncodingType::try_from(1).unwrap(), EncodingType::XorAll);
        assert_eq!(EncodingType::try_from(2).unwrap(), EncodingType::XorSkipOne);

        for v in EncodingType::COUNT..=u8::MAX {
            assert!(matches!(
                EncodingType::try_from(v),
                Err(Error::UnknownEncodingType(x)) if x == v
            ));
        }
    }

    #[test]
    fn test_ranged_flags() {
        assert!(OptionFlags::ENCODED.needs_range());
        assert!(OptionFlags::RECOVERY_FAILED.needs_range());
        assert!(!(OptionFlags::RECOVERY_CWR | OptionFlags::RECOVERY_SUCCESSFUL).needs_range());
    }

    #[test]
    fn test_range_wraparound() {
        let range = SeqRange::new(u32::MAX - 4, 10);
        assert_eq!(range.end(), 5);
        assert!(range.contains(u32::MAX));
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }

    #[test]
    fn test_seq_before() {
        assert!(seq_before(1, 2));
        assert!(!seq_before(2, 1));
        assert!(!seq_before(7, 7));
        assert!(seq_before(u32::MAX, 3));
    }
}
