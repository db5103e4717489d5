use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Singleton database wrapper. Initialized once at startup, closed once
/// at shutdown; repositories borrow the pool.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// One row per venue; idempotent.
    pub async fn register_exchange(&self, id: &str, name: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO exchanges (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to register exchange")?;
        Ok(())
    }

    /// Create the schema. Constraints carry the data-model invariants:
    /// one open position per (exchange, symbol, side), unique client
    /// order ids, non-negative holding durations, ordered close times.
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS exchanges (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create exchanges table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                venue_order_id TEXT,
                client_order_id TEXT NOT NULL UNIQUE,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN
                    ('pending','open','partial','filled','cancelled','rejected','expired')),
                price TEXT,
                amount TEXT NOT NULL,
                filled TEXT NOT NULL DEFAULT '0',
                average TEXT,
                fee TEXT,
                fee_currency TEXT,
                stop_price TEXT,
                reduce_only INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                linked_decision_id INTEGER,
                raw_payload TEXT
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create orders table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_orders_symbol_status
            ON orders (symbol, status);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create orders index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                price TEXT NOT NULL,
                amount TEXT NOT NULL,
                cost TEXT NOT NULL,
                fee TEXT NOT NULL,
                fee_currency TEXT,
                ts INTEGER NOT NULL,
                is_liquidation INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trades_symbol_ts
            ON trades (symbol, ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trades index")?;

        // is_open is 1 for open rows and NULL for closed ones, so the
        // unique index admits any number of closed rows per key while
        // allowing at most one open row.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exchange_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                is_open INTEGER,
                amount TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                current_price TEXT NOT NULL,
                unrealized_pnl TEXT NOT NULL DEFAULT '0',
                leverage INTEGER NOT NULL DEFAULT 1,
                stop_loss TEXT,
                take_profit TEXT,
                entry_fee TEXT NOT NULL DEFAULT '0',
                opened_at INTEGER NOT NULL,
                closed_at INTEGER,
                UNIQUE(exchange_id, symbol, side, is_open)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create positions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS closed_positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exchange_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                amount TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                entry_fee TEXT NOT NULL DEFAULT '0',
                leverage INTEGER NOT NULL DEFAULT 1,
                entry_time INTEGER NOT NULL,
                exit_price TEXT NOT NULL,
                exit_time INTEGER NOT NULL,
                exit_order_id TEXT,
                fee TEXT NOT NULL DEFAULT '0',
                realized_pnl TEXT NOT NULL,
                realized_pnl_pct TEXT NOT NULL,
                holding_duration_seconds INTEGER NOT NULL
                    CHECK (holding_duration_seconds >= 0),
                close_reason TEXT NOT NULL CHECK (close_reason IN
                    ('manual','stop_loss','take_profit','liquidation','system','unknown')),
                CHECK (exit_time >= entry_time)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create closed_positions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS klines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exchange_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume TEXT NOT NULL,
                UNIQUE(exchange_id, symbol, timeframe, timestamp)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create klines table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolio_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exchange_id TEXT NOT NULL,
                snapshot_date TEXT NOT NULL,
                wallet_balance TEXT NOT NULL,
                available_balance TEXT NOT NULL,
                margin_balance TEXT NOT NULL,
                unrealized_pnl TEXT NOT NULL,
                positions TEXT NOT NULL,
                position_count INTEGER NOT NULL DEFAULT 0,
                archive_reason TEXT NOT NULL,
                is_archive INTEGER NOT NULL DEFAULT 1,
                UNIQUE(exchange_id, snapshot_date)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create portfolio_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                layer TEXT NOT NULL CHECK (layer IN ('strategic','tactical')),
                prompt_style TEXT NOT NULL,
                model_used TEXT NOT NULL,
                tokens_used INTEGER,
                latency_ms INTEGER NOT NULL DEFAULT 0,
                input TEXT NOT NULL,
                output TEXT,
                raw_output TEXT NOT NULL DEFAULT '',
                outcome TEXT NOT NULL DEFAULT 'ok',
                outcome_note TEXT,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create decisions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS account_settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exchange_id TEXT NOT NULL UNIQUE,
                initial_capital TEXT NOT NULL,
                capital_currency TEXT NOT NULL,
                set_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create account_settings table")?;

        info!("Database schema initialized");
        Ok(())
    }
}
