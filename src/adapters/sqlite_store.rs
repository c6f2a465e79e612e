//! SQLite position/trade/metrics store.
//!
//! Enforces the core invariants at the schema level: one live position per
//! scoped key (composite primary key) and unique trade order ids. All
//! timestamps are stored as RFC 3339 UTC text.

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};

use crate::domain::error::EngineError;
use crate::domain::market::{MarketKind, ProductType};
use crate::domain::metrics::BotMetrics;
use crate::domain::position::{Position, PositionKey, Scope, Side, Trade, TradeStatus};
use crate::ports::config_port::ConfigPort;
use crate::ports::store::PositionStore;

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let db_path = config
            .get_string("store", "path")
            .unwrap_or_else(|| "tradepilot.db".to_string());
        let pool_size = config.get_int("store", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), EngineError> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS positions (
                instrument TEXT NOT NULL,
                market TEXT NOT NULL,
                product_type TEXT NOT NULL,
                sandbox INTEGER NOT NULL,
                quantity REAL NOT NULL,
                entry_price REAL NOT NULL,
                current_price REAL NOT NULL,
                unrealized_pl REAL NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (instrument, market, product_type, sandbox)
            );
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                instrument TEXT NOT NULL,
                market TEXT NOT NULL,
                product_type TEXT NOT NULL,
                sandbox INTEGER NOT NULL,
                side TEXT NOT NULL,
                quantity REAL NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL,
                status TEXT NOT NULL,
                realized_pl REAL,
                realized_pl_pct REAL,
                confidence REAL NOT NULL,
                reasoning TEXT NOT NULL,
                order_id TEXT NOT NULL UNIQUE,
                broker_initiated INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                closed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_trades_instrument
                ON trades(instrument, market, product_type, sandbox);
            CREATE TABLE IF NOT EXISTS bot_metrics (
                market TEXT NOT NULL,
                product_type TEXT NOT NULL,
                sandbox INTEGER NOT NULL,
                total_trades INTEGER NOT NULL,
                winning_trades INTEGER NOT NULL,
                losing_trades INTEGER NOT NULL,
                total_realized_pl REAL NOT NULL,
                win_rate REAL NOT NULL,
                last_trade_time TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (market, product_type, sandbox)
            );",
        )?;
        Ok(())
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Store(format!("bad timestamp {text:?}: {e}")))
}

fn parse_scope(market: &str, product_type: &str, sandbox: i64) -> Result<Scope, EngineError> {
    Ok(Scope {
        market: MarketKind::parse(market)
            .ok_or_else(|| EngineError::Store(format!("unknown market {market:?}")))?,
        product_type: ProductType::parse(product_type)
            .ok_or_else(|| EngineError::Store(format!("unknown product type {product_type:?}")))?,
        sandbox: sandbox != 0,
    })
}

// Raw rows come out of the query_map closure untyped; domain parsing
// happens afterwards so sqlite errors and data errors stay distinct.
struct RawPosition {
    instrument: String,
    market: String,
    product_type: String,
    sandbox: i64,
    quantity: f64,
    entry_price: f64,
    current_price: f64,
    unrealized_pl: f64,
    updated_at: String,
}

impl RawPosition {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<RawPosition> {
        Ok(RawPosition {
            instrument: row.get(0)?,
            market: row.get(1)?,
            product_type: row.get(2)?,
            sandbox: row.get(3)?,
            quantity: row.get(4)?,
            entry_price: row.get(5)?,
            current_price: row.get(6)?,
            unrealized_pl: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_position(self) -> Result<Position, EngineError> {
        Ok(Position {
            key: PositionKey::new(
                self.instrument,
                parse_scope(&self.market, &self.product_type, self.sandbox)?,
            ),
            quantity: self.quantity,
            entry_price: self.entry_price,
            current_price: self.current_price,
            unrealized_pl: self.unrealized_pl,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct RawTrade {
    id: i64,
    instrument: String,
    market: String,
    product_type: String,
    sandbox: i64,
    side: String,
    quantity: f64,
    entry_price: f64,
    exit_price: Option<f64>,
    status: String,
    realized_pl: Option<f64>,
    realized_pl_pct: Option<f64>,
    confidence: f64,
    reasoning: String,
    order_id: String,
    broker_initiated: i64,
    created_at: String,
    closed_at: Option<String>,
}

impl RawTrade {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<RawTrade> {
        Ok(RawTrade {
            id: row.get(0)?,
            instrument: row.get(1)?,
            market: row.get(2)?,
            product_type: row.get(3)?,
            sandbox: row.get(4)?,
            side: row.get(5)?,
            quantity: row.get(6)?,
            entry_price: row.get(7)?,
            exit_price: row.get(8)?,
            status: row.get(9)?,
            realized_pl: row.get(10)?,
            realized_pl_pct: row.get(11)?,
            confidence: row.get(12)?,
            reasoning: row.get(13)?,
            order_id: row.get(14)?,
            broker_initiated: row.get(15)?,
            created_at: row.get(16)?,
            closed_at: row.get(17)?,
        })
    }

    fn into_trade(self) -> Result<Trade, EngineError> {
        Ok(Trade {
            id: Some(self.id),
            key: PositionKey::new(
                self.instrument,
                parse_scope(&self.market, &self.product_type, self.sandbox)?,
            ),
            side: Side::parse(&self.side)
                .ok_or_else(|| EngineError::Store(format!("unknown side {:?}", self.side)))?,
            quantity: self.quantity,
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            status: TradeStatus::parse(&self.status)
                .ok_or_else(|| EngineError::Store(format!("unknown status {:?}", self.status)))?,
            realized_pl: self.realized_pl,
            realized_pl_pct: self.realized_pl_pct,
            confidence: self.confidence,
            reasoning: self.reasoning,
            order_id: self.order_id,
            broker_initiated: self.broker_initiated != 0,
            created_at: parse_timestamp(&self.created_at)?,
            closed_at: self
                .closed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }
}

const TRADE_COLUMNS: &str = "id, instrument, market, product_type, sandbox, side, quantity, \
     entry_price, exit_price, status, realized_pl, realized_pl_pct, confidence, reasoning, \
     order_id, broker_initiated, created_at, closed_at";

impl PositionStore for SqliteStore {
    fn get_position(&self, key: &PositionKey) -> Result<Option<Position>, EngineError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT instrument, market, product_type, sandbox, quantity, entry_price,
                    current_price, unrealized_pl, updated_at
             FROM positions
             WHERE instrument = ?1 AND market = ?2 AND product_type = ?3 AND sandbox = ?4",
        )?;
        let raw = stmt
            .query_map(
                params![
                    key.instrument,
                    key.scope.market.as_str(),
                    key.scope.product_type.as_str(),
                    key.scope.sandbox as i64
                ],
                RawPosition::from_row,
            )?
            .next()
            .transpose()?;
        raw.map(RawPosition::into_position).transpose()
    }

    fn open_positions(&self, scope: Scope) -> Result<Vec<Position>, EngineError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT instrument, market, product_type, sandbox, quantity, entry_price,
                    current_price, unrealized_pl, updated_at
             FROM positions
             WHERE market = ?1 AND product_type = ?2 AND sandbox = ?3
             ORDER BY instrument",
        )?;
        let rows = stmt.query_map(
            params![
                scope.market.as_str(),
                scope.product_type.as_str(),
                scope.sandbox as i64
            ],
            RawPosition::from_row,
        )?;
        let mut positions = Vec::new();
        for row in rows {
            positions.push(row?.into_position()?);
        }
        Ok(positions)
    }

    fn upsert_position(&self, position: &Position) -> Result<(), EngineError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO positions (instrument, market, product_type, sandbox, quantity,
                                    entry_price, current_price, unrealized_pl, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (instrument, market, product_type, sandbox) DO UPDATE SET
                 quantity = excluded.quantity,
                 entry_price = excluded.entry_price,
                 current_price = excluded.current_price,
                 unrealized_pl = excluded.unrealized_pl,
                 updated_at = excluded.updated_at",
            params![
                position.key.instrument,
                position.key.scope.market.as_str(),
                position.key.scope.product_type.as_str(),
                position.key.scope.sandbox as i64,
                position.quantity,
                position.entry_price,
                position.current_price,
                position.unrealized_pl,
                position.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_position(&self, key: &PositionKey) -> Result<(), EngineError> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM positions
             WHERE instrument = ?1 AND market = ?2 AND product_type = ?3 AND sandbox = ?4",
            params![
                key.instrument,
                key.scope.market.as_str(),
                key.scope.product_type.as_str(),
                key.scope.sandbox as i64
            ],
        )?;
        Ok(())
    }

    fn insert_trade(&self, trade: &Trade) -> Result<i64, EngineError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO trades (instrument, market, product_type, sandbox, side, quantity,
                                 entry_price, exit_price, status, realized_pl, realized_pl_pct,
                                 confidence, reasoning, order_id, broker_initiated,
                                 created_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                trade.key.instrument,
                trade.key.scope.market.as_str(),
                trade.key.scope.product_type.as_str(),
                trade.key.scope.sandbox as i64,
                trade.side.as_str(),
                trade.quantity,
                trade.entry_price,
                trade.exit_price,
                trade.status.as_str(),
                trade.realized_pl,
                trade.realized_pl_pct,
                trade.confidence,
                trade.reasoning,
                trade.order_id,
                trade.broker_initiated as i64,
                trade.created_at.to_rfc3339(),
                trade.closed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_trade_by_order_id(&self, order_id: &str) -> Result<Option<Trade>, EngineError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE order_id = ?1"
        ))?;
        let raw = stmt
            .query_map(params![order_id], RawTrade::from_row)?
            .next()
            .transpose()?;
        raw.map(RawTrade::into_trade).transpose()
    }

    fn recent_trades(&self, key: &PositionKey, limit: usize) -> Result<Vec<Trade>, EngineError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades
             WHERE instrument = ?1 AND market = ?2 AND product_type = ?3 AND sandbox = ?4
             ORDER BY id DESC LIMIT ?5"
        ))?;
        let rows = stmt.query_map(
            params![
                key.instrument,
                key.scope.market.as_str(),
                key.scope.product_type.as_str(),
                key.scope.sandbox as i64,
                limit as i64
            ],
            RawTrade::from_row,
        )?;
        let mut trades = Vec::new();
        for row in rows {
            trades.push(row?.into_trade()?);
        }
        Ok(trades)
    }

    fn get_metrics(&self, scope: Scope) -> Result<BotMetrics, EngineError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT total_trades, winning_trades, losing_trades, total_realized_pl,
                    win_rate, last_trade_time, updated_at
             FROM bot_metrics
             WHERE market = ?1 AND product_type = ?2 AND sandbox = ?3",
        )?;
        let row = stmt
            .query_map(
                params![
                    scope.market.as_str(),
                    scope.product_type.as_str(),
                    scope.sandbox as i64
                ],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )?
            .next()
            .transpose()?;

        match row {
            None => Ok(BotMetrics::empty(Utc::now())),
            Some((total, winning, losing, pl, win_rate, last_trade, updated)) => Ok(BotMetrics {
                total_trades: total as u64,
                winning_trades: winning as u64,
                losing_trades: losing as u64,
                total_realized_pl: pl,
                win_rate,
                last_trade_time: last_trade.as_deref().map(parse_timestamp).transpose()?,
                updated_at: parse_timestamp(&updated)?,
            }),
        }
    }

    fn put_metrics(&self, scope: Scope, metrics: &BotMetrics) -> Result<(), EngineError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO bot_metrics (market, product_type, sandbox, total_trades,
                                      winning_trades, losing_trades, total_realized_pl,
                                      win_rate, last_trade_time, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (market, product_type, sandbox) DO UPDATE SET
                 total_trades = excluded.total_trades,
                 winning_trades = excluded.winning_trades,
                 losing_trades = excluded.losing_trades,
                 total_realized_pl = excluded.total_realized_pl,
                 win_rate = excluded.win_rate,
                 last_trade_time = excluded.last_trade_time,
                 updated_at = excluded.updated_at",
            params![
                scope.market.as_str(),
                scope.product_type.as_str(),
                scope.sandbox as i64,
                metrics.total_trades as i64,
                metrics.winning_trades as i64,
                metrics.losing_trades as i64,
                metrics.total_realized_pl,
                metrics.win_rate,
                metrics.last_trade_time.map(|t| t.to_rfc3339()),
                metrics.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
