// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试环境、测试数据生成等功能
// ==========================================
#![allow(dead_code)]

use garment_erp::app::AppState;
use garment_erp::db::{ensure_schema, open_sqlite_connection};
use garment_erp::domain::types::{SkillLevel, UrgencyLevel};
use garment_erp::domain::{NewOperator, NewWorkItem, Operator, WorkItem};
use async_trait::async_trait;
use garment_erp::engine::events::{ErpEvent, ErpEventPublisher};
use garment_erp::realtime::{
    EventTransport, LocalEventHub, MemoryRealtimeStore, RealtimeError, RealtimeResult,
};
use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 完整测试环境（AppState + 可控的实时库/事件通道）
pub struct TestEnv {
    _temp_file: NamedTempFile,
    pub db_path: String,
    pub state: AppState,
    pub store: Arc<MemoryRealtimeStore>,
    pub hub: Arc<LocalEventHub>,
}

impl TestEnv {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let (temp_file, db_path) = create_test_db()?;
        let store = Arc::new(MemoryRealtimeStore::new());
        let hub = Arc::new(LocalEventHub::connected());
        let state = AppState::with_components(db_path.clone(), store.clone(), hub.clone())?;

        Ok(Self {
            _temp_file: temp_file,
            db_path,
            state,
            store,
            hub,
        })
    }

    pub fn pending_outbox(&self) -> i64 {
        self.state.outbox_repo.count_pending().expect("读取 outbox 失败")
    }

    pub fn seed_operator(&self, id: &str, machine_type: &str, skill: SkillLevel) -> Operator {
        self.state
            .operator_api
            .create_operator(new_operator(id, machine_type, skill))
            .expect("创建操作员失败")
    }

    pub fn seed_work_item(
        &self,
        id: &str,
        machine_type: &str,
        skill: SkillLevel,
        total_pieces: u32,
        rate_per_piece: f64,
    ) -> WorkItem {
        self.state
            .assignment_api
            .create_work_item(new_work_item(id, machine_type, skill, total_pieces, rate_per_piece))
            .expect("创建工单失败")
    }
}

pub fn new_operator(id: &str, machine_type: &str, skill: SkillLevel) -> NewOperator {
    NewOperator {
        id: id.to_string(),
        name: format!("Operator {}", id),
        machine_types: [machine_type.to_string()].into_iter().collect(),
        skill_level: skill,
        average_efficiency: 0.95,
        quality_score: 0.95,
        max_concurrent_work: 2,
    }
}

/// 标准工时 1 分钟/件
pub fn new_work_item(
    id: &str,
    machine_type: &str,
    skill: SkillLevel,
    total_pieces: u32,
    rate_per_piece: f64,
) -> NewWorkItem {
    NewWorkItem {
        id: id.to_string(),
        bundle_no: format!("B-{}", id),
        machine_type: machine_type.to_string(),
        required_skill_level: skill,
        priority: UrgencyLevel::Normal,
        estimated_duration: total_pieces,
        total_pieces,
        rate_per_piece,
        due_date: None,
    }
}

// ==========================================
// 不稳定的事件通道（前 n 次 connect 被拒绝）
// ==========================================
pub struct FlakyHub {
    inner: LocalEventHub,
    refusals_left: AtomicU32,
}

impl FlakyHub {
    pub fn new(refusals: u32) -> Self {
        Self {
            inner: LocalEventHub::new(),
            refusals_left: AtomicU32::new(refusals),
        }
    }
}

#[async_trait]
impl EventTransport for FlakyHub {
    async fn connect(&self) -> RealtimeResult<()> {
        let left = self.refusals_left.load(Ordering::SeqCst);
        if left > 0 {
            self.refusals_left.store(left - 1, Ordering::SeqCst);
            return Err(RealtimeError::Transport("connection refused".to_string()));
        }
        self.inner.connect().await
    }

    async fn authenticate(&self, token: &str) -> RealtimeResult<()> {
        self.inner.authenticate(token).await
    }

    async fn emit(&self, event: &ErpEvent) -> RealtimeResult<()> {
        self.inner.emit(event).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ErpEvent> {
        self.inner.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

impl ErpEventPublisher for FlakyHub {
    fn publish(&self, event: ErpEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.inner.publish(event)
    }
}
