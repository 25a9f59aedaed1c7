//! Per-connection FEC handling.
//!
//! [`FecConnection`] is what the host transport stack drives: it owns the
//! connection's [`ConnectionFecState`] and exposes the three hooks the stack
//! calls from its own serialized per-connection processing:
//!
//! 1. **Socket option**: [`set_fec_type`](FecConnection::set_fec_type) /
//!    [`fec_type`](FecConnection::fec_type)
//!
//! 2. **Transmit**: [`write_option`](FecConnection::write_option) for every
//!    outgoing segment
//!
//! 3. **Receive**: [`process_inbound`](FecConnection::process_inbound) for every
//!    incoming segment
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──▶ Negotiating ──┬──▶ Enabled
//!                                 └──▶ Disabled
//! ```
//!
//! Enabled and Disabled are final; there is no renegotiation mid-connection.

mod input;
mod metrics;
pub mod negotiation;
mod output;
mod state;

pub use input::{InboundSegment, RecoveryHooks, RxVerdict};
pub use metrics::{FecMetrics, MetricsSnapshot};
pub use output::{OutboundSegment, TxFecMeta};
pub use state::{
    ConnectionFecState, FecPhase, InboundRecord, PendingRequestState, RetainedBuffer,
    RetainedRange,
};

use std::sync::Arc;

use bytes::Bytes;

use crate::config::{FecConfig, FecSysctl};
use crate::error::{Error, Result};
use crate::option::EncodingType;

/// Which side of the handshake this connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sent the first SYN
    Active,
    /// Answered a SYN from a listening socket
    Passive,
}

/// FEC handling for one connection.
pub struct FecConnection {
    role: Role,
    sysctl: Arc<FecSysctl>,
    metrics: Arc<FecMetrics>,
    state: ConnectionFecState,
    pending: Option<PendingRequestState>,
}

impl FecConnection {
    /// Create the FEC side of an actively opened connection.
    ///
    /// The socket starts out requesting the configured default type, if any.
    pub fn active(config: &FecConfig, sysctl: Arc<FecSysctl>, metrics: Arc<FecMetrics>) -> Self {
        let mut conn = Self::new(Role::Active, config, sysctl, metrics);
        if let Ok(ty) = config.default_encoding() {
            conn.state.requested_type = ty;
        }
        conn
    }

    /// Create the FEC side of a connection accepted by a listener.
    pub fn passive(config: &FecConfig, sysctl: Arc<FecSysctl>, metrics: Arc<FecMetrics>) -> Self {
        Self::new(Role::Passive, config, sysctl, metrics)
    }

    fn new(
        role: Role,
        config: &FecConfig,
        sysctl: Arc<FecSysctl>,
        metrics: Arc<FecMetrics>,
    ) -> Self {
        Self {
            role,
            sysctl,
            metrics,
            state: ConnectionFecState::new(config.retained_cap),
            pending: None,
        }
    }

    /// Handshake role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> FecPhase {
        self.state.phase()
    }

    /// Per-connection state.
    pub fn state(&self) -> &ConnectionFecState {
        &self.state
    }

    /// Pending offer of a half-open passive connection.
    pub fn pending_request(&self) -> Option<&PendingRequestState> {
        self.pending.as_ref()
    }

    /// Set the encoding type this socket requests.
    ///
    /// Rejected for values outside `0..=2`, while FEC is administratively
    /// off, and once the handshake has started.
    pub fn set_fec_type(&mut self, value: i32) -> Result<()> {
        let result = self.try_set_fec_type(value);
        if let Err(e) = &result {
            tracing::warn!("rejected FEC socket option: {}", e);
        }
        result
    }

    fn try_set_fec_type(&mut self, value: i32) -> Result<()> {
        let ty = u8::try_from(value)
            .ok()
            .and_then(|v| EncodingType::try_from(v).ok())
            .ok_or_else(|| Error::invalid_set_type(value, "out of range"))?;

        if !self.sysctl.is_enabled() {
            return Err(Error::invalid_set_type(value, "FEC is administratively disabled"));
        }

        if self.state.phase() != FecPhase::Uninitialized {
            return Err(Error::invalid_set_type(value, "handshake already started"));
        }

        self.state.requested_type = ty;
        Ok(())
    }

    /// Encoding type for the socket option getter.
    ///
    /// Reports the negotiated type once the handshake is over, the requested
    /// one before.
    pub fn fec_type(&self) -> u8 {
        if self.state.phase().is_terminal() {
            self.state.negotiated_type().into()
        } else {
            self.state.requested_type().into()
        }
    }

    /// Keep received bytes for local recovery.
    pub fn retain(&mut self, seq: u32, data: Bytes) {
        if self.state.is_enabled() {
            self.state.retain(seq, data);
        }
    }

    /// Drop retained bytes that end at or before `seq`.
    pub fn release_retained(&mut self, seq: u32) {
        self.state.retained.release_before(seq);
    }

    /// Ask for RECOVERY_CWR on the next option sent.
    pub fn signal_recovery_cwr(&mut self) {
        if self.state.is_enabled() {
            self.state.signal_recovery_cwr();
        }
    }

    /// Ask for a loss report of `len` bytes on the next option sent.
    ///
    /// Fails with [`Error::RangeTooLong`] when `len` does not fit the option's
    /// 24-bit range field.
    pub fn report_recovery_failed(&mut self, len: u32) -> Result<()> {
        if self.state.is_enabled() {
            self.state.report_recovery_failed(len)?;
        }
        Ok(())
    }

    fn admin_enabled(&self) -> bool {
        self.sysctl.is_enabled()
    }
}
