//! PostgreSQL 快照存储
//!
//! 表结构（`ensure_schema` 自动创建）：
//!
//! ```sql
//! create table if not exists power_snapshot (
//!     ts timestamptz primary key,
//!     power_l1 double precision not null,
//!     power_l2 double precision not null,
//!     power_l3 double precision not null,
//!     duration_ms bigint not null,
//!     energy_l1 double precision not null,
//!     energy_l2 double precision not null,
//!     energy_l3 double precision not null
//! );
//! ```
//!
//! 时间戳以毫秒在应用层传递，写入时 `to_timestamp($1 / 1000.0)`，
//! 读出时 `extract(epoch from ts) * 1000`。

use crate::error::StorageError;
use crate::traits::SnapshotStore;
use domain::{EnergyTotals, Snapshot};
use sqlx::{PgPool, Row};
use tracing::info;

const CREATE_TABLE_SQL: &str = "create table if not exists power_snapshot ( \
     ts timestamptz primary key, \
     power_l1 double precision not null, \
     power_l2 double precision not null, \
     power_l3 double precision not null, \
     duration_ms bigint not null, \
     energy_l1 double precision not null, \
     energy_l2 double precision not null, \
     energy_l3 double precision not null \
     )";

pub struct PgSnapshotStore {
    pub pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }

    /// 创建快照表（已存在则跳过）
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        info!("power_snapshot schema ready");
        Ok(())
    }
}

#[async_trait::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn last_snapshot(&self) -> Result<Option<Snapshot>, StorageError> {
        let row = sqlx::query(
            "select (extract(epoch from ts) * 1000)::bigint as ts_ms, \
             power_l1, power_l2, power_l3, duration_ms, \
             energy_l1, energy_l2, energy_l3 \
             from power_snapshot \
             order by ts desc \
             limit 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Snapshot {
            ts_ms: row.try_get("ts_ms")?,
            power: [
                row.try_get("power_l1")?,
                row.try_get("power_l2")?,
                row.try_get("power_l3")?,
            ],
            duration_ms: row.try_get("duration_ms")?,
            energy: EnergyTotals::new([
                row.try_get("energy_l1")?,
                row.try_get("energy_l2")?,
                row.try_get("energy_l3")?,
            ]),
        }))
    }

    async fn append(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        sqlx::query(
            "insert into power_snapshot \
             (ts, power_l1, power_l2, power_l3, duration_ms, energy_l1, energy_l2, energy_l3) \
             values (to_timestamp($1 / 1000.0), $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(snapshot.ts_ms as f64)
        .bind(snapshot.power[0])
        .bind(snapshot.power[1])
        .bind(snapshot.power[2])
        .bind(snapshot.duration_ms)
        .bind(snapshot.energy.lines[0])
        .bind(snapshot.energy.lines[1])
        .bind(snapshot.energy.lines[2])
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
