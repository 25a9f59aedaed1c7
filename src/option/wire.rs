//! TCP option framing for the FEC option.
//!
//! The option rides in an RFC 6994 experimental option and is told apart from
//! other experimental options by its magic value:
//!
//! ```text
//! ┌──────────┬────────────┬──────────────────┬───────────────────┐
//! │ Kind (1) │ Length (1) │ Magic (2) 0xDC60 │ Payload (1 or 4)  │
//! └──────────┴────────────┴──────────────────┴───────────────────┘
//! ```
//!
//! Short options are preceded by NOP bytes so every variant occupies the same
//! amount of 32-bit aligned option space.

use bytes::BufMut;

use crate::option::codec::FecOption;

/// TCP option kind: end of option list
pub const TCPOPT_EOL: u8 = 0;

/// TCP option kind: no-operation
pub const TCPOPT_NOP: u8 = 1;

/// TCP option kind: shared experimental option (RFC 6994)
pub const TCPOPT_EXP: u8 = 254;

/// Magic value identifying the FEC option
pub const FEC_MAGIC: u16 = 0xDC60;

/// Kind, length and magic
pub const OPTION_HEADER_LEN: usize = 4;

/// Option space every FEC option occupies, padding included
pub const FEC_OPTION_SPACE: usize = 8;

/// Largest TCP options block (60-byte header minus the fixed 20)
pub const MAX_OPTIONS_LEN: usize = 40;

/// Serialize `option` with its alignment padding.
///
/// Returns the number of bytes written, always [`FEC_OPTION_SPACE`].
pub fn write_option<B: BufMut>(option: &FecOption, buf: &mut B) -> usize {
    let payload_len = option.payload_len();
    let option_len = OPTION_HEADER_LEN + payload_len;

    for _ in option_len..FEC_OPTION_SPACE {
        buf.put_u8(TCPOPT_NOP);
    }
    buf.put_u8(TCPOPT_EXP);
    buf.put_u8(option_len as u8);
    buf.put_u16(FEC_MAGIC);
    option.encode_payload(buf);

    FEC_OPTION_SPACE
}

/// Find the FEC payload inside a raw TCP options block.
///
/// Walks the block the way a TCP stack does: EOL stops, NOP advances a byte,
/// everything else is length-delimited. A malformed length ends the scan.
/// Experimental options carrying another magic value are skipped.
pub fn find_fec_payload(options: &[u8]) -> Option<&[u8]> {
    let mut i = 0;

    while i < options.len() {
        match options[i] {
            TCPOPT_EOL => break,
            TCPOPT_NOP => i += 1,
            kind => {
                let len = *options.get(i + 1)? as usize;
                if len < 2 || i + len > options.len() {
                    tracing::debug!(kind, len, "malformed TCP option, stopping scan");
                    return None;
                }

                if kind == TCPOPT_EXP && len >= OPTION_HEADER_LEN {
                    let magic = u16::from_be_bytes([options[i + 2], options[i + 3]]);
                    if magic == FEC_MAGIC {
                        return Some(&options[i + OPTION_HEADER_LEN..i + len]);
                    }
                }

                i += len;
            }
        }
    }

    None
}
