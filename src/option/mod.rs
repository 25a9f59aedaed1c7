//! FEC Option Codec.
//!
//! Pure translation between wire bytes and structured option values. Nothing
//! in this module knows about connection state:
//!
//! 1. **Types**: encoding types, signal flags and sequence ranges
//!
//! 2. **Payload codec**: context-tagged decoding of the 1- and 4-byte payloads
//!    and resolution of what to send on a segment
//!
//! 3. **Framing**: experimental-option header, magic value, NOP alignment and
//!    option-block scanning
//!
//! ## Layering
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │  TCP options block (host stack)                │
//! ├────────────────────────────────────────────────┤
//! │  Framing (kind 254, magic 0xDC60, NOP padding) │
//! ├────────────────────────────────────────────────┤
//! │  Payload (negotiation / flags / ranged)        │
//! └────────────────────────────────────────────────┘
//! ```

mod codec;
mod types;
mod wire;

pub use codec::{
    DecodeContext, FecOption, OptionRequest, LONG_PAYLOAD_LEN, SHORT_PAYLOAD_LEN,
};
pub use types::{seq_before, EncodingType, OptionFlags, SeqRange, MAX_RANGE_LEN};
pub use wire::{
    find_fec_payload, write_option, FEC_MAGIC, FEC_OPTION_SPACE, MAX_OPTIONS_LEN,
    OPTION_HEADER_LEN, TCPOPT_EOL, TCPOPT_EXP, TCPOPT_NOP,
};
