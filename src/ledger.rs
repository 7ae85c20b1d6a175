//! Minute-balance accounting.
//!
//! Every balance mutation happens inside a single SQLite transaction together
//! with its ledger entry in `transactions`, so the ledger always sums to the
//! balance delta. Settlement and purchase credits are guarded by
//! compare-and-swap claims so provider retries and duplicate webhook
//! deliveries are processed exactly once.

use rusqlite::Connection;
use tracing::info;

use crate::db::queries;
use crate::error::{msg, AppError, OptionExt, Result};
use crate::models::{
    CallLog, CallStatus, CreateTransaction, Influencer, PaymentSession, TransactionType,
};

/// Outcome of settling a terminal call status callback.
#[derive(Debug, PartialEq)]
pub enum SettleOutcome {
    /// No call log with this id; the provider cannot fix that by retrying.
    UnknownCall,
    /// A previous delivery already settled this call.
    AlreadySettled,
    Settled {
        minutes_billed: i64,
        /// Additional minutes debited beyond the reservation (clamped to the
        /// available balance).
        minutes_debited: i64,
        /// Reserved minutes returned because the call billed less.
        minutes_refunded: i64,
    },
}

/// Outcome of crediting a completed checkout.
#[derive(Debug, PartialEq)]
pub enum CreditOutcome {
    /// This provider event was already processed.
    AlreadyProcessed,
    /// The event was new but the session was already credited by another
    /// event (e.g. both `checkout.session.completed` and a retry with a
    /// distinct event id).
    SessionAlreadyCompleted,
    Credited { minutes: i64 },
}

/// Minutes billed for a call: full minutes, any started minute counts.
pub fn billed_minutes(duration_seconds: i64, cost_per_min: i64) -> i64 {
    if duration_seconds <= 0 {
        return 0;
    }
    ((duration_seconds + 59) / 60) * cost_per_min
}

/// Reserve minutes for an outbound call and open its call log.
///
/// The reservation debit, the call log row and the ledger entry commit
/// together. Fails with a 400 when the balance cannot cover the per-minute
/// rate.
pub fn reserve_call_minutes(
    conn: &mut Connection,
    user_id: &str,
    influencer: &Influencer,
) -> Result<CallLog> {
    let reserve = influencer.cost_per_min;
    let tx = conn.transaction()?;

    if !queries::try_debit_minutes(&tx, user_id, reserve)? {
        return Err(AppError::BadRequest(msg::NO_AVAILABLE_MINUTES.into()));
    }

    let call = queries::create_pstn_call_log(&tx, user_id, &influencer.id, reserve)?;

    queries::create_transaction(
        &tx,
        &CreateTransaction {
            user_id: user_id.to_string(),
            minutes: -reserve,
            transaction_type: TransactionType::Usage,
            description: Some(format!(
                "Reserved {} minute(s) for call with {}",
                reserve, influencer.name
            )),
            minute_pack_id: None,
            call_id: Some(call.id.clone()),
            stripe_payment_id: None,
        },
    )?;

    tx.commit()?;
    Ok(call)
}

/// Return a reservation after the provider refused to place the call.
///
/// Marks the call failed and settled so a stray status callback can never
/// bill it later.
pub fn refund_call_reservation(
    conn: &mut Connection,
    user_id: &str,
    call: &CallLog,
) -> Result<()> {
    let tx = conn.transaction()?;

    if !queries::try_claim_call_settlement(&tx, &call.id)? {
        // Already settled elsewhere, nothing to refund.
        tx.commit()?;
        return Ok(());
    }

    queries::finalize_call(&tx, &call.id, CallStatus::Failed, 0, 0)?;

    if call.minutes_reserved > 0 {
        queries::credit_minutes(&tx, user_id, call.minutes_reserved)?;
        queries::create_transaction(
            &tx,
            &CreateTransaction {
                user_id: user_id.to_string(),
                minutes: call.minutes_reserved,
                transaction_type: TransactionType::Refund,
                description: Some("Call could not be placed, reservation returned".to_string()),
                minute_pack_id: None,
                call_id: Some(call.id.clone()),
                stripe_payment_id: None,
            },
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Settle a call from a terminal provider status.
///
/// Exactly-once: the first delivery wins the `settled` claim and reconciles
/// the balance against the reservation; every later delivery observes
/// `AlreadySettled`. A callback for an id that was never logged yields
/// `UnknownCall` rather than an error, so the endpoint can acknowledge it.
/// When billed minutes exceed the reservation the overage
/// debit is clamped at a zero balance, and the ledger entry records the
/// amount actually debited.
pub fn settle_call(
    conn: &mut Connection,
    call_id: &str,
    status: CallStatus,
    duration_seconds: i64,
) -> Result<SettleOutcome> {
    let tx = conn.transaction()?;

    let call = match queries::get_call_log_by_id(&tx, call_id)? {
        Some(call) => call,
        None => return Ok(SettleOutcome::UnknownCall),
    };
    let user_id = call
        .user_id
        .clone()
        .ok_or_else(|| AppError::Internal("PSTN call without a user".into()))?;

    if !queries::try_claim_call_settlement(&tx, call_id)? {
        tx.commit()?;
        return Ok(SettleOutcome::AlreadySettled);
    }

    let influencer = queries::get_influencer_by_id(&tx, &call.influencer_id)?
        .or_not_found(msg::INFLUENCER_NOT_FOUND)?;

    let duration = duration_seconds.max(0);
    let minutes_billed = billed_minutes(duration, influencer.cost_per_min);
    queries::finalize_call(&tx, call_id, status, duration, minutes_billed)?;

    let delta = minutes_billed - call.minutes_reserved;
    let mut minutes_debited = 0;
    let mut minutes_refunded = 0;

    if delta > 0 {
        minutes_debited = queries::debit_minutes_clamped(&tx, &user_id, delta)?;
        if minutes_debited > 0 {
            queries::create_transaction(
                &tx,
                &CreateTransaction {
                    user_id: user_id.clone(),
                    minutes: -minutes_debited,
                    transaction_type: TransactionType::Usage,
                    description: Some(format!(
                        "Call with {} ({} second(s))",
                        influencer.name, duration
                    )),
                    minute_pack_id: None,
                    call_id: Some(call.id.clone()),
                    stripe_payment_id: None,
                },
            )?;
        }
    } else if delta < 0 {
        minutes_refunded = -delta;
        queries::credit_minutes(&tx, &user_id, minutes_refunded)?;
        queries::create_transaction(
            &tx,
            &CreateTransaction {
                user_id: user_id.clone(),
                minutes: minutes_refunded,
                transaction_type: TransactionType::Refund,
                description: Some("Unused reserved minute(s) returned".to_string()),
                minute_pack_id: None,
                call_id: Some(call.id.clone()),
                stripe_payment_id: None,
            },
        )?;
    }

    tx.commit()?;

    info!(
        call_id,
        status = status.as_str(),
        duration,
        minutes_billed,
        minutes_debited,
        minutes_refunded,
        "call settled"
    );

    Ok(SettleOutcome::Settled {
        minutes_billed,
        minutes_debited,
        minutes_refunded,
    })
}

/// Credit a purchase from a `checkout.session.completed` event.
///
/// Two independent guards compose inside one transaction: the webhook event
/// dedup table rejects replays of the same event id, and the session's
/// `completed` compare-and-swap rejects a second credit under a different
/// event id. Either guard firing leaves the balance untouched.
pub fn credit_purchase(
    conn: &mut Connection,
    event_id: &str,
    session: &PaymentSession,
    stripe_payment_id: Option<&str>,
) -> Result<CreditOutcome> {
    let tx = conn.transaction()?;

    if !queries::try_record_webhook_event(&tx, "stripe", event_id)? {
        return Ok(CreditOutcome::AlreadyProcessed);
    }

    if !queries::try_claim_payment_session(&tx, &session.id)? {
        tx.commit()?;
        return Ok(CreditOutcome::SessionAlreadyCompleted);
    }

    queries::credit_minutes(&tx, &session.user_id, session.minutes)?;
    queries::create_transaction(
        &tx,
        &CreateTransaction {
            user_id: session.user_id.clone(),
            minutes: session.minutes,
            transaction_type: TransactionType::Purchase,
            description: Some(format!("Purchased {} minute(s)", session.minutes)),
            minute_pack_id: Some(session.minute_pack_id.clone()),
            call_id: None,
            stripe_payment_id: stripe_payment_id.map(String::from),
        },
    )?;

    tx.commit()?;

    info!(
        event_id,
        session_id = %session.id,
        user_id = %session.user_id,
        minutes = session.minutes,
        "purchase credited"
    );

    Ok(CreditOutcome::Credited {
        minutes: session.minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billed_minutes_rounds_up() {
        assert_eq!(billed_minutes(0, 1), 0);
        assert_eq!(billed_minutes(-5, 1), 0);
        assert_eq!(billed_minutes(1, 1), 1);
        assert_eq!(billed_minutes(60, 1), 1);
        assert_eq!(billed_minutes(61, 1), 2);
        assert_eq!(billed_minutes(179, 2), 6);
    }
}
