use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;

        -- Profiles (identity + minute wallet)
        -- available_minutes is only ever changed through guarded UPDATEs
        -- paired with a transactions row in the same DB transaction.
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            display_name TEXT,
            phone_number TEXT,
            phone_verified INTEGER NOT NULL DEFAULT 0,
            available_minutes INTEGER NOT NULL DEFAULT 0,
            stripe_customer_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_profiles_email ON profiles(email);
        CREATE INDEX IF NOT EXISTS idx_profiles_stripe_customer ON profiles(stripe_customer_id);

        -- Influencers (browsable roster)
        CREATE TABLE IF NOT EXISTS influencers (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            bio TEXT,
            greeting_copy TEXT,
            photo_url TEXT,
            cost_per_min INTEGER NOT NULL DEFAULT 1,
            voice_id TEXT,
            assistant_id TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_influencers_slug ON influencers(slug);
        CREATE INDEX IF NOT EXISTS idx_influencers_active ON influencers(id) WHERE active = 1;

        -- Minute packs (purchasable bundles, pricing source of truth)
        CREATE TABLE IF NOT EXISTS minute_packs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            minutes INTEGER NOT NULL,
            price_cents INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT 'usd',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        -- Call logs (one row per call attempt, PSTN or demo)
        -- settled is the exactly-once billing claim flag.
        CREATE TABLE IF NOT EXISTS call_logs (
            id TEXT PRIMARY KEY,
            user_id TEXT REFERENCES profiles(id) ON DELETE SET NULL,
            influencer_id TEXT NOT NULL REFERENCES influencers(id) ON DELETE CASCADE,
            call_type TEXT NOT NULL CHECK (call_type IN ('pstn', 'demo')),
            provider_call_sid TEXT,
            status TEXT NOT NULL CHECK (status IN (
                'initiated', 'ringing', 'in-progress', 'completed',
                'busy', 'failed', 'no-answer', 'canceled'
            )),
            started_at INTEGER NOT NULL,
            ended_at INTEGER,
            duration_seconds INTEGER,
            minutes_reserved INTEGER NOT NULL DEFAULT 0,
            minutes_billed INTEGER,
            settled INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_call_logs_user_time ON call_logs(user_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_call_logs_sid ON call_logs(provider_call_sid);

        -- Transactions (minute ledger; minutes signed: + credit, - debit)
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            minutes INTEGER NOT NULL,
            transaction_type TEXT NOT NULL CHECK (transaction_type IN (
                'purchase', 'usage', 'refund', 'adjustment'
            )),
            description TEXT,
            minute_pack_id TEXT REFERENCES minute_packs(id) ON DELETE SET NULL,
            call_id TEXT REFERENCES call_logs(id) ON DELETE SET NULL,
            stripe_payment_id TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_user_time ON transactions(user_id, created_at DESC);

        -- Payment sessions (checkout flow tracking)
        -- completed is the compare-and-swap claim flag for the payment webhook.
        CREATE TABLE IF NOT EXISTS payment_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            minute_pack_id TEXT NOT NULL REFERENCES minute_packs(id) ON DELETE CASCADE,
            minutes INTEGER NOT NULL,
            price_cents INTEGER NOT NULL,
            provider_session_id TEXT,
            completed INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payment_sessions_user ON payment_sessions(user_id);

        -- Phone verification codes (hash only, short-lived)
        CREATE TABLE IF NOT EXISTS phone_verifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            phone_number TEXT NOT NULL,
            code_hash TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            used INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_phone_verifications_user ON phone_verifications(user_id);
        CREATE INDEX IF NOT EXISTS idx_phone_verifications_expires ON phone_verifications(expires_at);

        -- Webhook events (replay prevention)
        CREATE TABLE IF NOT EXISTS webhook_events (
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (provider, event_id)
        );
        "#,
    )?;
    Ok(())
}
