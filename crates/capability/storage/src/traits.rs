//! 存储接口 Trait 定义
//!
//! - SnapshotStore：功率快照的追加写入与启动恢复
//!
//! 设计原则：
//! - 只追加，不更新、不删除
//! - 同一时间戳重复写入返回 Conflict 错误
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use async_trait::async_trait;
use domain::Snapshot;

/// 快照存储接口
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 按时间戳取最新的一条快照
    async fn last_snapshot(&self) -> Result<Option<Snapshot>, StorageError>;

    /// 追加一条快照；时间戳已存在时返回 Conflict
    async fn append(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}
