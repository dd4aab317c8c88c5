//! Bootstrap DDL for the ledger tables
//!
//! Idempotent: every statement is `IF NOT EXISTS`. Not a migration tool.

use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS accounts (
        id          BIGSERIAL PRIMARY KEY,
        owner       VARCHAR NOT NULL,
        balance     BIGINT NOT NULL,
        currency    VARCHAR NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS entries (
        id          BIGSERIAL PRIMARY KEY,
        account_id  BIGINT NOT NULL REFERENCES accounts (id),
        amount      BIGINT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS transfers (
        id               BIGSERIAL PRIMARY KEY,
        from_account_id  BIGINT NOT NULL REFERENCES accounts (id),
        to_account_id    BIGINT NOT NULL REFERENCES accounts (id),
        amount           BIGINT NOT NULL CHECK (amount > 0),
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    "CREATE INDEX IF NOT EXISTS accounts_owner_idx ON accounts (owner)",
    "CREATE INDEX IF NOT EXISTS entries_account_id_idx ON entries (account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_from_account_id_idx ON transfers (from_account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_to_account_id_idx ON transfers (to_account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_from_to_idx ON transfers (from_account_id, to_account_id)",
];

/// Create the accounts, entries and transfers tables and their indexes
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS.iter().copied() {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = STATEMENTS.len(), "Ledger schema ready");
    Ok(())
}
