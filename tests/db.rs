//! Query-level tests for the data layer.

mod common;

use common::*;
use talkline::error::AppError;

#[test]
fn create_profile_normalizes_email() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "  Mixed.Case@Example.COM");
    // fixture trims via queries::create_profile
    assert_eq!(profile.email, "mixed.case@example.com");

    let found = queries::get_profile_by_email(&conn, "MIXED.case@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(found.id, profile.id);
}

#[test]
fn duplicate_email_is_a_conflict() {
    let conn = setup_test_db();
    create_test_profile(&conn, "taken@example.com");

    let input = CreateProfile {
        email: "taken@example.com".to_string(),
        password: "password123".to_string(),
        display_name: None,
    };
    let result = queries::create_profile(&conn, &input, "hash");

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[test]
fn changing_phone_number_resets_verification() {
    let conn = setup_test_db();
    let profile = create_funded_profile(&conn, "caller@example.com", 0);
    assert!(profile.phone_verified);

    let updated = queries::update_profile(
        &conn,
        &profile.id,
        &UpdateProfile {
            display_name: None,
            phone_number: Some("+15559876543".to_string()),
        },
    )
    .unwrap()
    .unwrap();

    assert_eq!(updated.phone_number, Some("+15559876543".to_string()));
    assert!(!updated.phone_verified);
}

#[test]
fn phone_verified_requires_matching_number() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "caller@example.com");
    queries::update_profile(
        &conn,
        &profile.id,
        &UpdateProfile {
            display_name: None,
            phone_number: Some("+15551230000".to_string()),
        },
    )
    .unwrap();

    // A code issued for a number the profile no longer has must not verify.
    assert!(!queries::set_phone_verified(&conn, &profile.id, "+15559999999").unwrap());
    assert!(queries::set_phone_verified(&conn, &profile.id, "+15551230000").unwrap());
}

#[test]
fn guarded_debit_never_overdraws() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "caller@example.com");
    queries::credit_minutes(&conn, &profile.id, 3).unwrap();

    assert!(queries::try_debit_minutes(&conn, &profile.id, 3).unwrap());
    assert!(!queries::try_debit_minutes(&conn, &profile.id, 1).unwrap());
    assert_eq!(balance_of(&conn, &profile.id), 0);
}

#[test]
fn clamped_debit_reports_actual_amount() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "caller@example.com");
    queries::credit_minutes(&conn, &profile.id, 2).unwrap();

    assert_eq!(queries::debit_minutes_clamped(&conn, &profile.id, 5).unwrap(), 2);
    assert_eq!(queries::debit_minutes_clamped(&conn, &profile.id, 5).unwrap(), 0);
    assert_eq!(balance_of(&conn, &profile.id), 0);
}

#[test]
fn new_verification_code_invalidates_previous() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "caller@example.com");

    let first = queries::create_phone_verification(
        &conn, &profile.id, "+15551234567", "hash-1", 600,
    )
    .unwrap();
    let second = queries::create_phone_verification(
        &conn, &profile.id, "+15551234567", "hash-2", 600,
    )
    .unwrap();

    let active = queries::get_active_phone_verification(&conn, &profile.id)
        .unwrap()
        .unwrap();
    assert_eq!(active.id, second.id);
    assert_ne!(active.id, first.id);
}

#[test]
fn expired_codes_are_not_active_and_get_cleaned_up() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "caller@example.com");

    queries::create_phone_verification(&conn, &profile.id, "+15551234567", "hash", -1).unwrap();

    assert!(queries::get_active_phone_verification(&conn, &profile.id)
        .unwrap()
        .is_none());
    assert_eq!(queries::cleanup_phone_verifications(&conn).unwrap(), 1);
}

#[test]
fn verification_attempts_accumulate() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "caller@example.com");
    let v = queries::create_phone_verification(&conn, &profile.id, "+15551234567", "hash", 600)
        .unwrap();

    assert_eq!(queries::record_verification_attempt(&conn, &v.id).unwrap(), 1);
    assert_eq!(queries::record_verification_attempt(&conn, &v.id).unwrap(), 2);
    assert_eq!(queries::record_verification_attempt(&conn, &v.id).unwrap(), 3);
}

#[test]
fn payment_session_claim_is_single_winner() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "buyer@example.com");
    let pack = create_test_pack(&conn, "Starter", 10, 999);
    let session = create_test_payment_session(&conn, &profile.id, &pack);

    assert!(queries::try_claim_payment_session(&conn, &session.id).unwrap());
    assert!(!queries::try_claim_payment_session(&conn, &session.id).unwrap());

    let reloaded = queries::get_payment_session(&conn, &session.id).unwrap().unwrap();
    assert!(reloaded.completed);
}

#[test]
fn webhook_events_deduplicate_per_provider() {
    let conn = setup_test_db();

    assert!(queries::try_record_webhook_event(&conn, "stripe", "evt_1").unwrap());
    assert!(!queries::try_record_webhook_event(&conn, "stripe", "evt_1").unwrap());
    // Same id under a different provider is a different event.
    assert!(queries::try_record_webhook_event(&conn, "twilio", "evt_1").unwrap());
}

#[test]
fn abandoned_sessions_purge_keeps_completed_ones() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "buyer@example.com");
    let pack = create_test_pack(&conn, "Starter", 10, 999);

    let abandoned = create_test_payment_session(&conn, &profile.id, &pack);
    let completed = create_test_payment_session(&conn, &profile.id, &pack);
    queries::try_claim_payment_session(&conn, &completed.id).unwrap();

    // Retention of -1 days puts the cutoff in the future, purging anything
    // still incomplete.
    let purged = queries::purge_abandoned_payment_sessions(&conn, -1).unwrap();

    assert_eq!(purged, 1);
    assert!(queries::get_payment_session(&conn, &abandoned.id).unwrap().is_none());
    assert!(queries::get_payment_session(&conn, &completed.id).unwrap().is_some());
}

#[test]
fn transactions_paginate_newest_first() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "buyer@example.com");

    for i in 0..5 {
        queries::create_transaction(
            &conn,
            &CreateTransaction {
                user_id: profile.id.clone(),
                minutes: i + 1,
                transaction_type: TransactionType::Adjustment,
                description: Some(format!("entry {}", i)),
                minute_pack_id: None,
                call_id: None,
                stripe_payment_id: None,
            },
        )
        .unwrap();
    }

    let (page, total) = queries::list_transactions_for_user(&conn, &profile.id, 2, 0).unwrap();
    assert_eq!(total, 5);
    assert_eq!(page.len(), 2);

    let (rest, _) = queries::list_transactions_for_user(&conn, &profile.id, 10, 2).unwrap();
    assert_eq!(rest.len(), 3);
}

#[test]
fn inactive_influencers_stay_out_of_the_catalog() {
    let conn = setup_test_db();
    create_test_influencer(&conn, "luna", 1);
    let max = create_test_influencer(&conn, "max", 2);
    conn.execute("UPDATE influencers SET active = 0 WHERE id = ?1", [&max.id])
        .unwrap();

    let listed = queries::list_active_influencers(&conn).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].slug, "luna");

    assert!(queries::get_influencer_by_slug(&conn, "max").unwrap().is_none());
}

#[test]
fn demo_call_logs_are_born_settled() {
    let conn = setup_test_db();
    let influencer = create_test_influencer(&conn, "luna", 1);

    let call = queries::create_demo_call_log(&conn, None, &influencer.id, 95).unwrap();

    assert_eq!(call.call_type, CallType::Demo);
    assert!(call.settled);
    assert_eq!(call.minutes_billed, Some(0));
    assert_eq!(call.duration_seconds, Some(95));
    assert!(call.user_id.is_none());
}

#[test]
fn provider_sid_update_keeps_settled_status() {
    let conn = setup_test_db();
    let profile = create_test_profile(&conn, "caller@example.com");
    let influencer = create_test_influencer(&conn, "luna", 1);
    let call = queries::create_pstn_call_log(&conn, &profile.id, &influencer.id, 1).unwrap();

    // Terminal callback wins the race against the place-call response.
    assert!(queries::try_claim_call_settlement(&conn, &call.id).unwrap());
    queries::finalize_call(&conn, &call.id, CallStatus::Completed, 60, 1).unwrap();

    queries::set_call_provider_sid(&conn, &call.id, "CA123", CallStatus::Ringing).unwrap();

    let call = queries::get_call_log_by_id(&conn, &call.id).unwrap().unwrap();
    assert_eq!(call.provider_call_sid.as_deref(), Some("CA123"));
    assert_eq!(call.status, CallStatus::Completed);
}

#[test]
fn minute_packs_list_by_price() {
    let conn = setup_test_db();
    create_test_pack(&conn, "Superfan", 100, 6999);
    create_test_pack(&conn, "Starter", 10, 999);
    create_test_pack(&conn, "Regular", 30, 2499);

    let packs = queries::list_active_minute_packs(&conn).unwrap();
    let names: Vec<&str> = packs.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Starter", "Regular", "Superfan"]);
}
