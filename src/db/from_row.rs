//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors. Graceful handling instead of panicking when the database
/// contains an unexpected value.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PROFILE_COLS: &str = "id, email, display_name, phone_number, phone_verified, \
     available_minutes, stripe_customer_id, created_at, updated_at";

pub const INFLUENCER_COLS: &str = "id, slug, name, bio, greeting_copy, photo_url, \
     cost_per_min, voice_id, assistant_id, active, created_at";

pub const MINUTE_PACK_COLS: &str =
    "id, name, minutes, price_cents, currency, is_active, created_at";

pub const CALL_LOG_COLS: &str = "id, user_id, influencer_id, call_type, provider_call_sid, \
     status, started_at, ended_at, duration_seconds, minutes_reserved, minutes_billed, \
     settled, created_at";

pub const TRANSACTION_COLS: &str = "id, user_id, minutes, transaction_type, description, \
     minute_pack_id, call_id, stripe_payment_id, created_at";

pub const PAYMENT_SESSION_COLS: &str = "id, user_id, minute_pack_id, minutes, price_cents, \
     provider_session_id, completed, created_at";

pub const PHONE_VERIFICATION_COLS: &str =
    "id, user_id, phone_number, code_hash, expires_at, used, attempts, created_at";

// ============ FromRow Implementations ============

impl FromRow for Profile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Profile {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            phone_number: row.get(3)?,
            phone_verified: row.get::<_, i64>(4)? != 0,
            available_minutes: row.get(5)?,
            stripe_customer_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for Influencer {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Influencer {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            bio: row.get(3)?,
            greeting_copy: row.get(4)?,
            photo_url: row.get(5)?,
            cost_per_min: row.get(6)?,
            voice_id: row.get(7)?,
            assistant_id: row.get(8)?,
            active: row.get::<_, i64>(9)? != 0,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for MinutePack {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(MinutePack {
            id: row.get(0)?,
            name: row.get(1)?,
            minutes: row.get(2)?,
            price_cents: row.get(3)?,
            currency: row.get(4)?,
            is_active: row.get::<_, i64>(5)? != 0,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for CallLog {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CallLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            influencer_id: row.get(2)?,
            call_type: parse_enum(row, 3, "call_type")?,
            provider_call_sid: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            started_at: row.get(6)?,
            ended_at: row.get(7)?,
            duration_seconds: row.get(8)?,
            minutes_reserved: row.get(9)?,
            minutes_billed: row.get(10)?,
            settled: row.get::<_, i64>(11)? != 0,
            created_at: row.get(12)?,
        })
    }
}

impl FromRow for Transaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            minutes: row.get(2)?,
            transaction_type: parse_enum(row, 3, "transaction_type")?,
            description: row.get(4)?,
            minute_pack_id: row.get(5)?,
            call_id: row.get(6)?,
            stripe_payment_id: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for PaymentSession {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentSession {
            id: row.get(0)?,
            user_id: row.get(1)?,
            minute_pack_id: row.get(2)?,
            minutes: row.get(3)?,
            price_cents: row.get(4)?,
            provider_session_id: row.get(5)?,
            completed: row.get::<_, i64>(6)? != 0,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for PhoneVerification {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PhoneVerification {
            id: row.get(0)?,
            user_id: row.get(1)?,
            phone_number: row.get(2)?,
            code_hash: row.get(3)?,
            expires_at: row.get(4)?,
            used: row.get::<_, i64>(5)? != 0,
            attempts: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
