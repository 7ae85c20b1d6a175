//! Test utilities and fixtures for Talkline integration tests

#![allow(dead_code)]

use rusqlite::Connection;

pub use talkline::db::{init_db, queries};
pub use talkline::models::*;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test profile. The password hash is a placeholder; tests that
/// exercise login hash for real.
pub fn create_test_profile(conn: &Connection, email: &str) -> Profile {
    let input = CreateProfile {
        email: email.to_string(),
        password: "test-password".to_string(),
        display_name: Some(format!("Test {}", email)),
    };
    queries::create_profile(conn, &input, "test-hash").expect("Failed to create test profile")
}

/// Create a test profile with a verified phone number and a minute balance.
pub fn create_funded_profile(conn: &Connection, email: &str, minutes: i64) -> Profile {
    let profile = create_test_profile(conn, email);
    queries::update_profile(
        conn,
        &profile.id,
        &UpdateProfile {
            display_name: None,
            phone_number: Some("+15551234567".to_string()),
        },
    )
    .expect("Failed to set test phone");
    queries::set_phone_verified(conn, &profile.id, "+15551234567")
        .expect("Failed to verify test phone");
    if minutes > 0 {
        queries::credit_minutes(conn, &profile.id, minutes).expect("Failed to fund test profile");
    }
    queries::get_profile_by_id(conn, &profile.id)
        .expect("Failed to reload test profile")
        .expect("Test profile vanished")
}

/// Create a callable test influencer.
pub fn create_test_influencer(conn: &Connection, slug: &str, cost_per_min: i64) -> Influencer {
    let input = CreateInfluencer {
        slug: slug.to_string(),
        name: format!("Test {}", slug),
        bio: None,
        greeting_copy: None,
        photo_url: None,
        cost_per_min,
        voice_id: Some("voice-test".to_string()),
        assistant_id: Some(format!("assistant-{}", slug)),
    };
    queries::create_influencer(conn, &input).expect("Failed to create test influencer")
}

/// Create a test minute pack.
pub fn create_test_pack(conn: &Connection, name: &str, minutes: i64, price_cents: i64) -> MinutePack {
    let input = CreateMinutePack {
        name: name.to_string(),
        minutes,
        price_cents,
        currency: "usd".to_string(),
    };
    queries::create_minute_pack(conn, &input).expect("Failed to create test pack")
}

/// Create a pending payment session for a profile and pack.
pub fn create_test_payment_session(
    conn: &Connection,
    user_id: &str,
    pack: &MinutePack,
) -> PaymentSession {
    queries::create_payment_session(
        conn,
        &CreatePaymentSession {
            user_id: user_id.to_string(),
            minute_pack_id: pack.id.clone(),
            minutes: pack.minutes,
            price_cents: pack.price_cents,
        },
    )
    .expect("Failed to create test payment session")
}

/// Current minute balance for a profile.
pub fn balance_of(conn: &Connection, user_id: &str) -> i64 {
    queries::get_profile_by_id(conn, user_id)
        .expect("Failed to load profile")
        .expect("Profile not found")
        .available_minutes
}

/// Sum of all ledger entries for a profile.
pub fn ledger_sum(conn: &Connection, user_id: &str) -> i64 {
    let (transactions, _) =
        queries::list_transactions_for_user(conn, user_id, 1000, 0).expect("Failed to list ledger");
    transactions.iter().map(|t| t.minutes).sum()
}
