// ==========================================
// 服装工厂 ERP - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 连接: 单个 SQLite 连接由所有仓储共享
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{
    ApiWorkflowGateway, AssignmentApi, ConfigApi, DamageApi, DashboardApi, OperatorApi,
    PaymentApi, WorkflowApi,
};
use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::events::{ErpEventPublisher, OptionalEventPublisher};
use crate::realtime::{
    connect_with_retry, EventTransport, LocalEventHub, MemoryRealtimeStore, OutboxRelay,
    RealtimeResult, RealtimeStore, ReplaySummary,
};
use crate::repository::{
    AssignmentRepository, DamageReportRepository, OperatorRepository, OutboxRepository,
    PaymentRepository, ProductionRepository, WorkItemRepository,
};
use crate::workflow::{GatewayStepExecutor, WorkflowRunner, WorkflowStore};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub conn: Arc<Mutex<Connection>>,

    pub config_manager: Arc<ConfigManager>,

    /// 实时库（outbox 回放目标）
    pub realtime_store: Arc<dyn RealtimeStore>,

    /// 事件通道（同时承担提交后的事件发布）
    pub event_transport: Arc<dyn EventTransport>,

    pub outbox_repo: Arc<OutboxRepository>,
    pub outbox_relay: Arc<OutboxRelay>,

    pub operator_api: Arc<OperatorApi>,
    pub assignment_api: Arc<AssignmentApi>,
    pub damage_api: Arc<DamageApi>,
    pub payment_api: Arc<PaymentApi>,
    pub dashboard_api: Arc<DashboardApi>,
    pub config_api: Arc<ConfigApi>,
    pub workflow_api: Arc<WorkflowApi>,
}

impl AppState {
    /// 创建新的AppState实例（进程内实时库与事件通道）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_components(
            db_path,
            Arc::new(MemoryRealtimeStore::new()),
            Arc::new(LocalEventHub::connected()),
        )
    }

    /// 使用外部提供的实时库与事件通道创建
    pub fn with_components<H>(
        db_path: String,
        realtime_store: Arc<dyn RealtimeStore>,
        event_hub: Arc<H>,
    ) -> Result<Self, String>
    where
        H: EventTransport + ErpEventPublisher + 'static,
    {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let operator_repo = Arc::new(OperatorRepository::new(conn.clone()));
        let work_item_repo = Arc::new(WorkItemRepository::new(conn.clone()));
        let assignment_repo = Arc::new(AssignmentRepository::new(conn.clone()));
        let damage_repo = Arc::new(DamageReportRepository::new(conn.clone()));
        let production_repo = Arc::new(ProductionRepository::new(conn.clone()));
        let payment_repo = Arc::new(PaymentRepository::new(conn.clone()));
        let outbox_repo = Arc::new(OutboxRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 实时层
        // ==========================================
        let batch_size = config_manager
            .get_outbox_batch_size()
            .map_err(|e| format!("读取 outbox 配置失败: {}", e))?;
        let outbox_relay = Arc::new(
            OutboxRelay::new(outbox_repo.clone(), realtime_store.clone()).with_batch_size(batch_size),
        );
        let events = Arc::new(OptionalEventPublisher::with_publisher(event_hub.clone()));
        let event_transport: Arc<dyn EventTransport> = event_hub;

        // ==========================================
        // 初始化API层
        // ==========================================
        let operator_api = Arc::new(OperatorApi::new(
            conn.clone(),
            operator_repo.clone(),
            realtime_store.clone(),
            events.clone(),
        ));
        let assignment_api = Arc::new(AssignmentApi::new(
            conn.clone(),
            operator_repo.clone(),
            work_item_repo.clone(),
            assignment_repo,
            events.clone(),
        ));
        let damage_api = Arc::new(DamageApi::new(
            conn.clone(),
            work_item_repo.clone(),
            damage_repo.clone(),
            production_repo.clone(),
            events.clone(),
        ));
        let payment_api = Arc::new(PaymentApi::new(
            conn.clone(),
            operator_repo.clone(),
            work_item_repo.clone(),
            damage_repo.clone(),
            production_repo.clone(),
            payment_repo,
            config_manager.clone(),
        ));
        let dashboard_api = Arc::new(DashboardApi::new(
            operator_repo,
            work_item_repo,
            damage_repo,
            production_repo,
        ));
        let config_api = Arc::new(ConfigApi::new(config_manager.clone()));

        // ==========================================
        // 流程运行器
        // ==========================================
        let subscriber_capacity = config_manager
            .get_subscriber_channel_capacity()
            .map_err(|e| format!("读取流程配置失败: {}", e))?;
        let workflow_timeout = config_manager
            .get_workflow_timeout()
            .map_err(|e| format!("读取流程配置失败: {}", e))?;
        let workflow_retention = config_manager
            .get_workflow_retention()
            .map_err(|e| format!("读取流程配置失败: {}", e))?;
        let efficiency_threshold = config_manager
            .get_efficiency_bonus_threshold()
            .map_err(|e| format!("读取流程配置失败: {}", e))?;
        let quality_alert_threshold = config_manager
            .get_quality_alert_threshold()
            .map_err(|e| format!("读取流程配置失败: {}", e))?;

        let gateway = Arc::new(ApiWorkflowGateway::new(
            operator_api.clone(),
            assignment_api.clone(),
            damage_api.clone(),
            payment_api.clone(),
            events,
        ));
        let runner = WorkflowRunner::new(
            WorkflowStore::with_subscriber_capacity(subscriber_capacity),
            Arc::new(
                GatewayStepExecutor::new(gateway)
                    .with_thresholds(efficiency_threshold, quality_alert_threshold),
            ),
        )
        .with_default_timeout(workflow_timeout)
        .with_retention(workflow_retention);
        let workflow_api = Arc::new(WorkflowApi::new(runner));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            config_manager,
            realtime_store,
            event_transport,
            outbox_repo,
            outbox_relay,
            operator_api,
            assignment_api,
            damage_api,
            payment_api,
            dashboard_api,
            config_api,
            workflow_api,
        })
    }

    /// 按配置的重连策略连接事件通道
    pub async fn connect_event_channel(&self) -> RealtimeResult<u32> {
        let policy = self.config_manager.get_reconnect_policy()?;
        connect_with_retry(self.event_transport.as_ref(), policy).await
    }

    /// 回放 outbox 直到清空或遇到失败
    pub async fn replay_outbox(&self) -> RealtimeResult<ReplaySummary> {
        self.outbox_relay.drain().await
    }

    /// 启动时并发执行: 连接事件通道 + 回放积压的 outbox
    pub async fn bootstrap(&self) -> RealtimeResult<(u32, ReplaySummary)> {
        futures::try_join!(self.connect_event_channel(), self.replay_outbox())
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 GARMENT_ERP_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("GARMENT_ERP_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./garment_erp.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        let dir = if cfg!(debug_assertions) {
            data_dir.join("garment-erp-dev")
        } else {
            data_dir.join("garment-erp")
        };

        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("garment_erp.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_initializes_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert!(state.operator_api.list_operators(None).unwrap().is_empty());
        assert_eq!(state.outbox_repo.count_pending().unwrap(), 0);
    }
}
