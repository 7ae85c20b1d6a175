//! Minute accounting flows: reservation, settlement, purchase credits.

mod common;

use common::*;
use talkline::error::AppError;
use talkline::ledger::{self, CreditOutcome, SettleOutcome};
use talkline::models::CallStatus;

#[test]
fn reservation_debits_balance_and_writes_ledger() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 10);
    let influencer = create_test_influencer(&conn, "luna", 1);

    let call = ledger::reserve_call_minutes(&mut conn, &profile.id, &influencer).unwrap();

    assert_eq!(call.minutes_reserved, 1);
    assert_eq!(call.status, CallStatus::Initiated);
    assert!(!call.settled);
    assert_eq!(balance_of(&conn, &profile.id), 9);
    assert_eq!(ledger_sum(&conn, &profile.id), -1);
}

#[test]
fn reservation_uses_per_minute_rate() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 10);
    let influencer = create_test_influencer(&conn, "max", 2);

    let call = ledger::reserve_call_minutes(&mut conn, &profile.id, &influencer).unwrap();

    assert_eq!(call.minutes_reserved, 2);
    assert_eq!(balance_of(&conn, &profile.id), 8);
}

#[test]
fn reservation_fails_on_empty_balance() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "broke@example.com", 0);
    let influencer = create_test_influencer(&conn, "luna", 1);

    let result = ledger::reserve_call_minutes(&mut conn, &profile.id, &influencer);

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(balance_of(&conn, &profile.id), 0);
    assert_eq!(ledger_sum(&conn, &profile.id), 0);
}

#[test]
fn settlement_bills_started_minutes() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 10);
    let influencer = create_test_influencer(&conn, "luna", 1);
    let call = ledger::reserve_call_minutes(&mut conn, &profile.id, &influencer).unwrap();

    // 150 seconds = 3 started minutes, 1 already reserved.
    let outcome = ledger::settle_call(&mut conn, &call.id, CallStatus::Completed, 150).unwrap();

    assert_eq!(
        outcome,
        SettleOutcome::Settled {
            minutes_billed: 3,
            minutes_debited: 2,
            minutes_refunded: 0,
        }
    );
    assert_eq!(balance_of(&conn, &profile.id), 7);
    assert_eq!(ledger_sum(&conn, &profile.id), -3);

    let settled = queries::get_call_log_by_id(&conn, &call.id).unwrap().unwrap();
    assert!(settled.settled);
    assert_eq!(settled.status, CallStatus::Completed);
    assert_eq!(settled.duration_seconds, Some(150));
    assert_eq!(settled.minutes_billed, Some(3));
}

#[test]
fn settlement_refunds_unused_reservation() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 10);
    let influencer = create_test_influencer(&conn, "luna", 1);
    let call = ledger::reserve_call_minutes(&mut conn, &profile.id, &influencer).unwrap();

    // Busy call, zero duration: the reserved minute comes back.
    let outcome = ledger::settle_call(&mut conn, &call.id, CallStatus::Busy, 0).unwrap();

    assert_eq!(
        outcome,
        SettleOutcome::Settled {
            minutes_billed: 0,
            minutes_debited: 0,
            minutes_refunded: 1,
        }
    );
    assert_eq!(balance_of(&conn, &profile.id), 10);
    assert_eq!(ledger_sum(&conn, &profile.id), 0);
}

#[test]
fn settlement_within_reservation_changes_nothing() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 10);
    let influencer = create_test_influencer(&conn, "luna", 1);
    let call = ledger::reserve_call_minutes(&mut conn, &profile.id, &influencer).unwrap();

    // 45 seconds bills exactly the reserved minute.
    let outcome = ledger::settle_call(&mut conn, &call.id, CallStatus::Completed, 45).unwrap();

    assert_eq!(
        outcome,
        SettleOutcome::Settled {
            minutes_billed: 1,
            minutes_debited: 0,
            minutes_refunded: 0,
        }
    );
    assert_eq!(balance_of(&conn, &profile.id), 9);
    assert_eq!(ledger_sum(&conn, &profile.id), -1);
}

#[test]
fn settlement_is_exactly_once() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 10);
    let influencer = create_test_influencer(&conn, "luna", 1);
    let call = ledger::reserve_call_minutes(&mut conn, &profile.id, &influencer).unwrap();

    ledger::settle_call(&mut conn, &call.id, CallStatus::Completed, 150).unwrap();
    let balance_after_first = balance_of(&conn, &profile.id);

    // Provider retries the terminal callback.
    let second = ledger::settle_call(&mut conn, &call.id, CallStatus::Completed, 150).unwrap();

    assert_eq!(second, SettleOutcome::AlreadySettled);
    assert_eq!(balance_of(&conn, &profile.id), balance_after_first);
    assert_eq!(ledger_sum(&conn, &profile.id), -3);
}

#[test]
fn settlement_for_unknown_call_is_acknowledged() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 10);

    // A callback with an id we never logged must not surface as an error
    // (the webhook endpoint acknowledges it) and must not touch any balance.
    let outcome = ledger::settle_call(&mut conn, "no-such-call", CallStatus::Completed, 60)
        .unwrap();

    assert_eq!(outcome, SettleOutcome::UnknownCall);
    assert_eq!(balance_of(&conn, &profile.id), 10);
    assert_eq!(ledger_sum(&conn, &profile.id), 0);
}

#[test]
fn overage_debit_clamps_at_zero_balance() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 2);
    let influencer = create_test_influencer(&conn, "luna", 1);
    let call = ledger::reserve_call_minutes(&mut conn, &profile.id, &influencer).unwrap();
    assert_eq!(balance_of(&conn, &profile.id), 1);

    // 10 minutes of talk with only 1 minute left: debit stops at zero and
    // the ledger records what was actually taken.
    let outcome = ledger::settle_call(&mut conn, &call.id, CallStatus::Completed, 600).unwrap();

    assert_eq!(
        outcome,
        SettleOutcome::Settled {
            minutes_billed: 10,
            minutes_debited: 1,
            minutes_refunded: 0,
        }
    );
    assert_eq!(balance_of(&conn, &profile.id), 0);
    assert_eq!(ledger_sum(&conn, &profile.id), -2);
}

#[test]
fn refund_returns_reservation_and_blocks_settlement() {
    let mut conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 5);
    let influencer = create_test_influencer(&conn, "luna", 1);
    let call = ledger::reserve_call_minutes(&mut conn, &profile.id, &influencer).unwrap();

    ledger::refund_call_reservation(&mut conn, &profile.id, &call).unwrap();

    assert_eq!(balance_of(&conn, &profile.id), 5);
    assert_eq!(ledger_sum(&conn, &profile.id), 0);

    let failed = queries::get_call_log_by_id(&conn, &call.id).unwrap().unwrap();
    assert_eq!(failed.status, CallStatus::Failed);
    assert!(failed.settled);

    // A stray callback after the refund settles nothing.
    let outcome = ledger::settle_call(&mut conn, &call.id, CallStatus::Completed, 300).unwrap();
    assert_eq!(outcome, SettleOutcome::AlreadySettled);
    assert_eq!(balance_of(&conn, &profile.id), 5);
}

#[test]
fn purchase_credit_applies_once_per_event() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "buyer@example.com");
    let pack = create_test_pack(&conn, "Starter", 10, 999);
    let session = create_test_payment_session(&conn, &profile.id, &pack);

    let outcome =
        ledger::credit_purchase(&mut conn, "evt_1", &session, Some("pi_123")).unwrap();
    assert_eq!(outcome, CreditOutcome::Credited { minutes: 10 });
    assert_eq!(balance_of(&conn, &profile.id), 10);
    assert_eq!(ledger_sum(&conn, &profile.id), 10);

    // Same event redelivered.
    let replay = ledger::credit_purchase(&mut conn, "evt_1", &session, Some("pi_123")).unwrap();
    assert_eq!(replay, CreditOutcome::AlreadyProcessed);
    assert_eq!(balance_of(&conn, &profile.id), 10);
}

#[test]
fn purchase_credit_rejects_second_event_for_same_session() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "buyer@example.com");
    let pack = create_test_pack(&conn, "Starter", 10, 999);
    let session = create_test_payment_session(&conn, &profile.id, &pack);

    ledger::credit_purchase(&mut conn, "evt_1", &session, Some("pi_123")).unwrap();

    // Distinct event id targeting the already-credited session.
    let outcome = ledger::credit_purchase(&mut conn, "evt_2", &session, Some("pi_123")).unwrap();

    assert_eq!(outcome, CreditOutcome::SessionAlreadyCompleted);
    assert_eq!(balance_of(&conn, &profile.id), 10);
    assert_eq!(ledger_sum(&conn, &profile.id), 10);
}

#[test]
fn purchase_ledger_entry_links_pack_and_payment() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "buyer@example.com");
    let pack = create_test_pack(&conn, "Regular", 30, 2499);
    let session = create_test_payment_session(&conn, &profile.id, &pack);

    ledger::credit_purchase(&mut conn, "evt_1", &session, Some("pi_456")).unwrap();

    let (transactions, total) =
        queries::list_transactions_for_user(&conn, &profile.id, 10, 0).unwrap();
    assert_eq!(total, 1);
    let entry = &transactions[0];
    assert_eq!(entry.transaction_type, TransactionType::Purchase);
    assert_eq!(entry.minutes, 30);
    assert_eq!(entry.minute_pack_id, Some(pack.id.clone()));
    assert_eq!(entry.stripe_payment_id, Some("pi_456".to_string()));
}
