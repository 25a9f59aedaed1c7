//! # TCP Forward Error Correction option
//!
//! Wire codec and per-connection state machine for an FEC extension carried
//! in the TCP experimental option. Peers that both support it agree on an
//! encoding type during the handshake; afterwards every segment carries a
//! small option that marks redundancy data, reports local recovery results,
//! or just signals presence.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │             Host transport stack (segments)             │
//! ├───────────────────────────┬─────────────────────────────┤
//! │  Receive Interpreter      │  Transmit Assembler         │
//! ├───────────────────────────┴─────────────────────────────┤
//! │  Negotiation Resolver  │  Per-connection FEC state      │
//! ├─────────────────────────────────────────────────────────┤
//! │  Option Codec (payload forms, framing, magic 0xDC60)    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! 1. **Fail-soft**: malformed or unexpected option content never aborts a
//!    connection; at worst FEC stays off for it
//! 2. **Bounded**: every operation is synchronous over fixed-size input
//! 3. **Switchable**: with the administrative switch off nothing is parsed,
//!    encoded or advertised

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod connection;
pub mod error;
pub mod option;

pub use config::{FecConfig, FecSysctl};
pub use connection::{
    FecConnection, FecMetrics, FecPhase, InboundSegment, OutboundSegment, RecoveryHooks, Role,
    RxVerdict, TxFecMeta,
};
pub use error::{Error, Result};
pub use option::{EncodingType, FecOption, OptionFlags, SeqRange};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reexports_build_a_connection() {
        let config = FecConfig::default();
        let sysctl = Arc::new(FecSysctl::from_config(&config));
        let conn = FecConnection::passive(&config, sysctl, Arc::new(FecMetrics::new()));

        assert_eq!(conn.role(), Role::Passive);
        assert_eq!(conn.phase(), FecPhase::Uninitialized);
        assert_eq!(conn.fec_type(), EncodingType::None as u8);
    }
}
