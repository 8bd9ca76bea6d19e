//! 快照内存存储
//!
//! 用于单元测试、集成测试和无数据库的本地演示。

use crate::error::StorageError;
use crate::traits::SnapshotStore;
use domain::Snapshot;
use std::sync::RwLock;

/// 快照内存存储
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<Vec<Snapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置历史快照（模拟重启前的数据）
    pub fn with_snapshots(snapshots: Vec<Snapshot>) -> Self {
        Self {
            snapshots: RwLock::new(snapshots),
        }
    }

    /// 当前快照数量（用于测试）
    pub fn len(&self) -> usize {
        self.snapshots.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全部快照，按时间戳升序（用于测试）
    pub fn snapshots(&self) -> Vec<Snapshot> {
        let mut items = self
            .snapshots
            .read()
            .map(|v| v.clone())
            .unwrap_or_default();
        items.sort_by_key(|item| item.ts_ms);
        items
    }
}

#[async_trait::async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn last_snapshot(&self) -> Result<Option<Snapshot>, StorageError> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(snapshots.iter().max_by_key(|item| item.ts_ms).copied())
    }

    async fn append(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if snapshots.iter().any(|item| item.ts_ms == snapshot.ts_ms) {
            return Err(StorageError::conflict(format!(
                "snapshot already exists at {}",
                snapshot.ts_ms
            )));
        }
        snapshots.push(*snapshot);
        Ok(())
    }
}
