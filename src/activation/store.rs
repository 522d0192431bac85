use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Insert-if-absent persistence for activation tokens.
pub trait ActivationStore {
    /// Record `token`. Returns `false` when it already exists.
    fn insert_if_absent(&self, token: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRecord {
    pub token: String,
    pub device_id: Option<String>,
    pub created_at: String,
    pub redeemed: bool,
    pub redeemed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed,
    /// Already bound to this device; activating again is allowed.
    AlreadyOwned,
    /// Bound to a different device.
    Taken,
    Unknown,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS activaciones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token TEXT NOT NULL UNIQUE,
    device_id TEXT,
    fecha_creacion TEXT NOT NULL,
    usado INTEGER DEFAULT 0,
    fecha_uso TEXT
)";

pub struct SqliteStore {
    conn: Connection,
}

fn now_utc() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening activation store '{}'", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .context("creating activation table")?;
        Ok(Self { conn })
    }

    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM activaciones", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn get(&self, token: &str) -> Result<Option<ActivationRecord>> {
        self.conn
            .query_row(
                "SELECT token, device_id, fecha_creacion, usado, fecha_uso
                 FROM activaciones WHERE token = ?1",
                params![token],
                |row| {
                    Ok(ActivationRecord {
                        token: row.get(0)?,
                        device_id: row.get(1)?,
                        created_at: row.get(2)?,
                        redeemed: row.get::<_, i64>(3)? != 0,
                        redeemed_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("looking up token {}", token))
    }

    /// Bind a token to a device on first use.
    pub fn redeem(&self, token: &str, device_id: &str) -> Result<RedeemOutcome> {
        let Some(record) = self.get(token)? else {
            return Ok(RedeemOutcome::Unknown);
        };
        if record.redeemed {
            return Ok(if record.device_id.as_deref() == Some(device_id) {
                RedeemOutcome::AlreadyOwned
            } else {
                RedeemOutcome::Taken
            });
        }
        let changed = self.conn.execute(
            "UPDATE activaciones SET device_id = ?1, usado = 1, fecha_uso = ?2
             WHERE token = ?3 AND usado = 0",
            params![device_id, now_utc(), token],
        )?;
        Ok(if changed == 1 {
            RedeemOutcome::Redeemed
        } else {
            RedeemOutcome::Taken
        })
    }
}

impl ActivationStore for SqliteStore {
    fn insert_if_absent(&self, token: &str) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO activaciones (token, fecha_creacion) VALUES (?1, ?2)",
                params![token, now_utc()],
            )
            .with_context(|| format!("inserting token {}", token))?;
        Ok(inserted == 1)
    }
}
