use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::{msg, AppError, Result};
use crate::models::*;

use super::from_row::{
    query_all, query_one, CALL_LOG_COLS, INFLUENCER_COLS, MINUTE_PACK_COLS, PAYMENT_SESSION_COLS,
    PHONE_VERIFICATION_COLS, PROFILE_COLS, TRANSACTION_COLS,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// True when the error is a UNIQUE constraint violation.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============ Profiles ============

pub fn create_profile(
    conn: &Connection,
    input: &CreateProfile,
    password_hash: &str,
) -> Result<Profile> {
    let id = gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO profiles (id, email, password_hash, display_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, &email, password_hash, &input.display_name, now, now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(msg::EMAIL_ALREADY_REGISTERED.into())
        } else {
            e.into()
        }
    })?;

    Ok(Profile {
        id,
        email,
        display_name: input.display_name.clone(),
        phone_number: None,
        phone_verified: false,
        available_minutes: 0,
        stripe_customer_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_profile_by_id(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLS),
        &[&id],
    )
}

pub fn get_profile_by_email(conn: &Connection, email: &str) -> Result<Option<Profile>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE email = ?1", PROFILE_COLS),
        &[&email],
    )
}

/// Fetch the stored password hash for login. Kept separate from `Profile` so
/// the hash never travels with the model.
pub fn get_password_hash(conn: &Connection, profile_id: &str) -> Result<Option<String>> {
    use rusqlite::OptionalExtension;
    conn.query_row(
        "SELECT password_hash FROM profiles WHERE id = ?1",
        params![profile_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

/// Update display name and/or phone number. A phone number change resets
/// `phone_verified` until the new number is confirmed.
pub fn update_profile(
    conn: &Connection,
    id: &str,
    input: &UpdateProfile,
) -> Result<Option<Profile>> {
    let now = now();

    if let Some(ref name) = input.display_name {
        conn.execute(
            "UPDATE profiles SET display_name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, now, id],
        )?;
    }

    if let Some(ref phone) = input.phone_number {
        conn.execute(
            "UPDATE profiles SET phone_number = ?1, phone_verified = 0, updated_at = ?2
             WHERE id = ?3",
            params![phone.trim(), now, id],
        )?;
    }

    get_profile_by_id(conn, id)
}

pub fn set_stripe_customer_id(conn: &Connection, id: &str, customer_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET stripe_customer_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![customer_id, now(), id],
    )?;
    Ok(())
}

/// Mark the profile's phone number verified, but only if it still matches the
/// number the code was issued for.
pub fn set_phone_verified(conn: &Connection, id: &str, phone_number: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE profiles SET phone_verified = 1, updated_at = ?1
         WHERE id = ?2 AND phone_number = ?3",
        params![now(), id, phone_number],
    )?;
    Ok(affected > 0)
}

/// Guarded debit: subtracts `minutes` only if the balance covers it.
///
/// Returns `Ok(true)` if the debit was applied, `Ok(false)` if the balance
/// was insufficient. The WHERE guard makes concurrent debits safe - the
/// balance can never go negative.
pub fn try_debit_minutes(conn: &Connection, user_id: &str, minutes: i64) -> Result<bool> {
    debug_assert!(minutes > 0);
    let affected = conn.execute(
        "UPDATE profiles SET available_minutes = available_minutes - ?1, updated_at = ?2
         WHERE id = ?3 AND available_minutes >= ?1",
        params![minutes, now(), user_id],
    )?;
    Ok(affected > 0)
}

/// Debit up to `minutes`, flooring the balance at zero.
///
/// Used at settlement when the actual call ran longer than the remaining
/// balance covers. Returns the number of minutes actually debited so the
/// ledger entry matches the balance change exactly. Callers must hold a
/// write transaction so the read-then-write pair is atomic.
pub fn debit_minutes_clamped(conn: &Connection, user_id: &str, minutes: i64) -> Result<i64> {
    debug_assert!(minutes > 0);
    let balance: i64 = conn.query_row(
        "SELECT available_minutes FROM profiles WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    let debit = minutes.min(balance).max(0);
    if debit > 0 {
        conn.execute(
            "UPDATE profiles SET available_minutes = available_minutes - ?1, updated_at = ?2
             WHERE id = ?3",
            params![debit, now(), user_id],
        )?;
    }
    Ok(debit)
}

/// Credit minutes to a profile. Returns false if the profile doesn't exist.
pub fn credit_minutes(conn: &Connection, user_id: &str, minutes: i64) -> Result<bool> {
    debug_assert!(minutes > 0);
    let affected = conn.execute(
        "UPDATE profiles SET available_minutes = available_minutes + ?1, updated_at = ?2
         WHERE id = ?3",
        params![minutes, now(), user_id],
    )?;
    Ok(affected > 0)
}

// ============ Influencers ============

pub fn create_influencer(conn: &Connection, input: &CreateInfluencer) -> Result<Influencer> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO influencers (id, slug, name, bio, greeting_copy, photo_url,
             cost_per_min, voice_id, assistant_id, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10)",
        params![
            &id,
            &input.slug,
            &input.name,
            &input.bio,
            &input.greeting_copy,
            &input.photo_url,
            input.cost_per_min,
            &input.voice_id,
            &input.assistant_id,
            now
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Slug already in use: {}", input.slug))
        } else {
            e.into()
        }
    })?;

    Ok(Influencer {
        id,
        slug: input.slug.clone(),
        name: input.name.clone(),
        bio: input.bio.clone(),
        greeting_copy: input.greeting_copy.clone(),
        photo_url: input.photo_url.clone(),
        cost_per_min: input.cost_per_min,
        voice_id: input.voice_id.clone(),
        assistant_id: input.assistant_id.clone(),
        active: true,
        created_at: now,
    })
}

pub fn list_active_influencers(conn: &Connection) -> Result<Vec<Influencer>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM influencers WHERE active = 1 ORDER BY name",
            INFLUENCER_COLS
        ),
        &[],
    )
}

pub fn get_influencer_by_slug(conn: &Connection, slug: &str) -> Result<Option<Influencer>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM influencers WHERE slug = ?1 AND active = 1",
            INFLUENCER_COLS
        ),
        &[&slug],
    )
}

pub fn get_influencer_by_id(conn: &Connection, id: &str) -> Result<Option<Influencer>> {
    query_one(
        conn,
        &format!("SELECT {} FROM influencers WHERE id = ?1", INFLUENCER_COLS),
        &[&id],
    )
}

pub fn count_influencers(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM influencers", [], |row| row.get(0))
        .map_err(Into::into)
}

// ============ Minute Packs ============

pub fn create_minute_pack(conn: &Connection, input: &CreateMinutePack) -> Result<MinutePack> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO minute_packs (id, name, minutes, price_cents, currency, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        params![
            &id,
            &input.name,
            input.minutes,
            input.price_cents,
            &input.currency,
            now
        ],
    )?;

    Ok(MinutePack {
        id,
        name: input.name.clone(),
        minutes: input.minutes,
        price_cents: input.price_cents,
        currency: input.currency.clone(),
        is_active: true,
        created_at: now,
    })
}

pub fn list_active_minute_packs(conn: &Connection) -> Result<Vec<MinutePack>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM minute_packs WHERE is_active = 1 ORDER BY price_cents",
            MINUTE_PACK_COLS
        ),
        &[],
    )
}

pub fn get_minute_pack_by_id(conn: &Connection, id: &str) -> Result<Option<MinutePack>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM minute_packs WHERE id = ?1 AND is_active = 1",
            MINUTE_PACK_COLS
        ),
        &[&id],
    )
}

// ============ Call Logs ============

/// Insert a PSTN call log in its initial state.
pub fn create_pstn_call_log(
    conn: &Connection,
    user_id: &str,
    influencer_id: &str,
    minutes_reserved: i64,
) -> Result<CallLog> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO call_logs (id, user_id, influencer_id, call_type, status,
             started_at, minutes_reserved, created_at)
         VALUES (?1, ?2, ?3, 'pstn', 'initiated', ?4, ?5, ?6)",
        params![&id, user_id, influencer_id, now, minutes_reserved, now],
    )?;

    Ok(CallLog {
        id,
        user_id: Some(user_id.to_string()),
        influencer_id: influencer_id.to_string(),
        call_type: CallType::Pstn,
        provider_call_sid: None,
        status: CallStatus::Initiated,
        started_at: now,
        ended_at: None,
        duration_seconds: None,
        minutes_reserved,
        minutes_billed: None,
        settled: false,
        created_at: now,
    })
}

/// Insert a completed demo call log. Demo calls are never billed and are
/// already settled.
pub fn create_demo_call_log(
    conn: &Connection,
    user_id: Option<&str>,
    influencer_id: &str,
    duration_seconds: i64,
) -> Result<CallLog> {
    let id = gen_id();
    let now = now();
    let started_at = now - duration_seconds;

    conn.execute(
        "INSERT INTO call_logs (id, user_id, influencer_id, call_type, status,
             started_at, ended_at, duration_seconds, minutes_reserved, minutes_billed,
             settled, created_at)
         VALUES (?1, ?2, ?3, 'demo', 'completed', ?4, ?5, ?6, 0, 0, 1, ?7)",
        params![&id, user_id, influencer_id, started_at, now, duration_seconds, now],
    )?;

    Ok(CallLog {
        id,
        user_id: user_id.map(String::from),
        influencer_id: influencer_id.to_string(),
        call_type: CallType::Demo,
        provider_call_sid: None,
        status: CallStatus::Completed,
        started_at,
        ended_at: Some(now),
        duration_seconds: Some(duration_seconds),
        minutes_reserved: 0,
        minutes_billed: Some(0),
        settled: true,
        created_at: now,
    })
}

pub fn get_call_log_by_id(conn: &Connection, id: &str) -> Result<Option<CallLog>> {
    query_one(
        conn,
        &format!("SELECT {} FROM call_logs WHERE id = ?1", CALL_LOG_COLS),
        &[&id],
    )
}

/// Record the provider call SID once the call has been placed. The status
/// only moves while the call is unsettled, so a terminal callback that wins
/// the race against the place-call response is not overwritten.
pub fn set_call_provider_sid(
    conn: &Connection,
    id: &str,
    sid: &str,
    status: CallStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE call_logs SET provider_call_sid = ?1, \
         status = CASE WHEN settled = 0 THEN ?2 ELSE status END \
         WHERE id = ?3",
        params![sid, status.as_str(), id],
    )?;
    Ok(())
}

/// Progress update for a non-terminal status callback. Never touches billing
/// fields and never moves a settled call backwards.
pub fn update_call_status(conn: &Connection, id: &str, status: CallStatus) -> Result<()> {
    conn.execute(
        "UPDATE call_logs SET status = ?1 WHERE id = ?2 AND settled = 0",
        params![status.as_str(), id],
    )?;
    Ok(())
}

/// Atomically claim the settlement of a call.
///
/// Compare-and-swap on the `settled` flag: only one caller ever wins, which
/// makes terminal status callbacks exactly-once even when the provider
/// retries or delivers duplicates.
pub fn try_claim_call_settlement(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE call_logs SET settled = 1 WHERE id = ?1 AND settled = 0",
        params![id],
    )?;
    Ok(affected > 0)
}

/// Write the final state of a settled call.
pub fn finalize_call(
    conn: &Connection,
    id: &str,
    status: CallStatus,
    duration_seconds: i64,
    minutes_billed: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE call_logs SET status = ?1, duration_seconds = ?2, ended_at = ?3,
             minutes_billed = ?4
         WHERE id = ?5",
        params![status.as_str(), duration_seconds, now(), minutes_billed, id],
    )?;
    Ok(())
}

// ============ Transactions (minute ledger) ============

pub fn create_transaction(conn: &Connection, input: &CreateTransaction) -> Result<Transaction> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO transactions (id, user_id, minutes, transaction_type, description,
             minute_pack_id, call_id, stripe_payment_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            &input.user_id,
            input.minutes,
            input.transaction_type.as_str(),
            &input.description,
            &input.minute_pack_id,
            &input.call_id,
            &input.stripe_payment_id,
            now
        ],
    )?;

    Ok(Transaction {
        id,
        user_id: input.user_id.clone(),
        minutes: input.minutes,
        transaction_type: input.transaction_type,
        description: input.description.clone(),
        minute_pack_id: input.minute_pack_id.clone(),
        call_id: input.call_id.clone(),
        stripe_payment_id: input.stripe_payment_id.clone(),
        created_at: now,
    })
}

pub fn list_transactions_for_user(
    conn: &Connection,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Transaction>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM transactions WHERE user_id = ?1
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
            TRANSACTION_COLS
        ),
        &[&user_id, &limit, &offset],
    )?;
    Ok((items, total))
}

// ============ Payment Sessions ============

pub fn create_payment_session(
    conn: &Connection,
    input: &CreatePaymentSession,
) -> Result<PaymentSession> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO payment_sessions (id, user_id, minute_pack_id, minutes, price_cents,
             completed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            &id,
            &input.user_id,
            &input.minute_pack_id,
            input.minutes,
            input.price_cents,
            now
        ],
    )?;

    Ok(PaymentSession {
        id,
        user_id: input.user_id.clone(),
        minute_pack_id: input.minute_pack_id.clone(),
        minutes: input.minutes,
        price_cents: input.price_cents,
        provider_session_id: None,
        completed: false,
        created_at: now,
    })
}

pub fn get_payment_session(conn: &Connection, id: &str) -> Result<Option<PaymentSession>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_sessions WHERE id = ?1",
            PAYMENT_SESSION_COLS
        ),
        &[&id],
    )
}

pub fn set_payment_session_provider_id(
    conn: &Connection,
    id: &str,
    provider_session_id: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE payment_sessions SET provider_session_id = ?1 WHERE id = ?2",
        params![provider_session_id, id],
    )?;
    Ok(())
}

/// Atomically mark a payment session completed, returning whether this call
/// won the claim.
///
/// Compare-and-swap prevents concurrent webhook deliveries from crediting
/// the same purchase twice.
pub fn try_claim_payment_session(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payment_sessions SET completed = 1 WHERE id = ?1 AND completed = 0",
        params![id],
    )?;
    Ok(affected > 0)
}

/// Purge abandoned checkout sessions beyond the retention period.
/// Completed sessions are kept - they document credited purchases.
pub fn purge_abandoned_payment_sessions(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM payment_sessions WHERE completed = 0 AND created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// ============ Phone Verifications ============

/// Store a new verification code hash, invalidating any previous live codes
/// for the user.
pub fn create_phone_verification(
    conn: &Connection,
    user_id: &str,
    phone_number: &str,
    code_hash: &str,
    ttl_secs: i64,
) -> Result<PhoneVerification> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "UPDATE phone_verifications SET used = 1 WHERE user_id = ?1 AND used = 0",
        params![user_id],
    )?;

    conn.execute(
        "INSERT INTO phone_verifications (id, user_id, phone_number, code_hash,
             expires_at, used, attempts, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6)",
        params![&id, user_id, phone_number, code_hash, now + ttl_secs, now],
    )?;

    Ok(PhoneVerification {
        id,
        user_id: user_id.to_string(),
        phone_number: phone_number.to_string(),
        code_hash: code_hash.to_string(),
        expires_at: now + ttl_secs,
        used: false,
        attempts: 0,
        created_at: now,
    })
}

/// The user's current live verification code, if any.
pub fn get_active_phone_verification(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<PhoneVerification>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM phone_verifications
             WHERE user_id = ?1 AND used = 0 AND expires_at > ?2
             ORDER BY created_at DESC LIMIT 1",
            PHONE_VERIFICATION_COLS
        ),
        &[&user_id, &now()],
    )
}

/// Increment the attempt counter, returning the new count.
pub fn record_verification_attempt(conn: &Connection, id: &str) -> Result<i64> {
    conn.execute(
        "UPDATE phone_verifications SET attempts = attempts + 1 WHERE id = ?1",
        params![id],
    )?;
    conn.query_row(
        "SELECT attempts FROM phone_verifications WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

pub fn mark_verification_used(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE phone_verifications SET used = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Remove expired and used verification codes.
pub fn cleanup_phone_verifications(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM phone_verifications WHERE used = 1 OR expires_at < ?1",
        params![now()],
    )?;
    Ok(deleted)
}

// ============ Webhook Event Deduplication ============

/// Atomically record a webhook event, returning true if this is a new event.
/// Returns false if the event was already processed (replay prevention).
///
/// INSERT OR IGNORE on the (provider, event_id) primary key is the atomic
/// primitive: a duplicate insert is silently ignored and reports zero rows.
pub fn try_record_webhook_event(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (provider, event_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![provider, event_id, now()],
    )?;
    Ok(affected > 0)
}

/// Purge old webhook events beyond the retention period. These only exist
/// for replay prevention; providers retry for at most a few days.
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
