//! Negotiation Resolver.
//!
//! Handshake rules for agreeing on an encoding type:
//!
//! ```text
//!  active opener                          passive opener
//!  ─────────────                          ──────────────
//!  SYN      [type = requested]  ───────▶  remember offer (PendingRequestState)
//!           ◀───────  [type = offer]      SYN-ACK (echo, if space allows)
//!  finalize: echo == requested?
//!  ACK      ───────────────────────────▶  finalize: offer echoed?
//! ```
//!
//! A mismatch or a missing option never fails the handshake; FEC just stays
//! off for the connection.

use crate::connection::state::{ConnectionFecState, FecPhase, PendingRequestState};
use crate::option::{EncodingType, FecOption, FEC_OPTION_SPACE};

/// Option for the active opener's SYN.
///
/// Returns `None` when FEC is off, nothing was requested, or the segment has
/// no room left; none of those fail the connection attempt. A SYN sent after
/// negotiation settled carries nothing and leaves the phase alone.
pub fn request(
    state: &mut ConnectionFecState,
    enabled: bool,
    option_space: usize,
) -> Option<FecOption> {
    if !enabled || state.phase.is_terminal() {
        return None;
    }

    state.phase = FecPhase::Negotiating;

    if !state.requested_type.is_enabled() {
        return None;
    }

    if option_space < FEC_OPTION_SPACE {
        tracing::debug!(
            option_space,
            "no room for FEC request in SYN, connection will run without FEC"
        );
        return None;
    }

    Some(FecOption::Negotiation(state.requested_type))
}

/// Record what a connecting peer offered in its SYN.
pub fn accept_offer(
    state: &mut ConnectionFecState,
    offer: Option<FecOption>,
    enabled: bool,
) -> PendingRequestState {
    state.phase = FecPhase::Negotiating;

    let offered_type = match offer.and_then(|o| o.encoding_type()) {
        Some(ty) if enabled => ty,
        _ => EncodingType::None,
    };
    state.rx.peer_type = offered_type;

    PendingRequestState {
        offered_type,
        echoed: false,
    }
}

/// Option echoing the peer's offer in our SYN-ACK.
pub fn echo(
    state: &ConnectionFecState,
    pending: &mut PendingRequestState,
    enabled: bool,
    option_space: usize,
) -> Option<FecOption> {
    if !enabled || state.phase.is_terminal() || !pending.offered_type.is_enabled() {
        return None;
    }

    if option_space < FEC_OPTION_SPACE {
        tracing::debug!(option_space, "no room to echo FEC offer in SYN-ACK");
        return None;
    }

    pending.echoed = true;
    Some(FecOption::Negotiation(pending.offered_type))
}

/// Settle the active opener's negotiation once the SYN-ACK arrived.
///
/// `echo` is the option the SYN-ACK carried; an absent option counts as the
/// peer declining with type 0.
pub fn finalize_active(state: &mut ConnectionFecState, echo: Option<FecOption>) -> EncodingType {
    let echoed = echo
        .and_then(|o| o.encoding_type())
        .unwrap_or(EncodingType::None);
    state.rx.peer_type = echoed;

    if echoed != state.requested_type {
        if state.requested_type.is_enabled() {
            tracing::info!(
                requested = ?state.requested_type,
                echoed = ?echoed,
                "FEC negotiation mismatch, disabling"
            );
        }
        state.negotiated_type = EncodingType::None;
        state.rx.peer_type = EncodingType::None;
    } else {
        state.negotiated_type = echoed;
    }

    settle(state)
}

/// Settle the passive opener's negotiation once the final ACK arrived.
///
/// The offer is adopted only if it was actually echoed, otherwise the active
/// side has already disabled FEC.
pub fn finalize_passive(
    state: &mut ConnectionFecState,
    pending: PendingRequestState,
) -> EncodingType {
    state.negotiated_type = if pending.echoed {
        pending.offered_type
    } else {
        EncodingType::None
    };

    settle(state)
}

fn settle(state: &mut ConnectionFecState) -> EncodingType {
    state.phase = if state.negotiated_type.is_enabled() {
        tracing::info!(negotiated = ?state.negotiated_type, "FEC enabled");
        FecPhase::Enabled
    } else {
        FecPhase::Disabled
    };
    state.negotiated_type
}
