//! Recording connection used by unit tests in place of a real driver

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use fastsql_core::{
    Connection, ConnectionConfig, DatabaseDriver, DriverCapabilities, FastSqlError,
    PreparedStatement, QueryResult, Result, StatementResult, Value,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Calls observed by a [`RecordingConnection`], in order
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Prepare(String),
    Execute { sql: String, params: Vec<Value> },
    CloseStatement(String),
    CloseConnection,
}

#[derive(Default)]
struct MockState {
    calls: Mutex<Vec<Call>>,
    closed: AtomicBool,
    fail_prepare: AtomicBool,
    fail_execute: AtomicBool,
    fail_statement_close: AtomicBool,
    executes: AtomicUsize,
    hold_prepares: AtomicBool,
    held_prepares: AtomicUsize,
    prepare_gate: Notify,
}

impl MockState {
    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FastSqlError::Connection("mock connection is closed".into()));
        }
        Ok(())
    }
}

/// Connection that records every call and can be told to fail
#[derive(Clone, Default)]
pub(crate) struct RecordingConnection {
    state: Arc<MockState>,
}

impl RecordingConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().clone()
    }

    pub(crate) fn prepares(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Prepare(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn executes(&self) -> Vec<(String, Vec<Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Execute { sql, params } => Some((sql, params)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn execute_count(&self) -> usize {
        self.state.executes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_prepare(&self, fail: bool) {
        self.state.fail_prepare.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_execute(&self, fail: bool) {
        self.state.fail_execute.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_statement_close(&self, fail: bool) {
        self.state.fail_statement_close.store(fail, Ordering::SeqCst);
    }

    /// Make every later `prepare` wait until [`Self::release_prepare`]
    pub(crate) fn hold_prepares(&self, hold: bool) {
        self.state.hold_prepares.store(hold, Ordering::SeqCst);
    }

    /// Number of `prepare` calls that have reached the gate
    pub(crate) fn held_prepares(&self) -> usize {
        self.state.held_prepares.load(Ordering::SeqCst)
    }

    /// Let one held `prepare` continue
    pub(crate) fn release_prepare(&self) {
        self.state.prepare_gate.notify_one();
    }

    pub(crate) fn shared(&self) -> Arc<dyn Connection> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn driver_name(&self) -> &str {
        "recording"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.state.ensure_open()?;
        self.state.record(Call::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(StatementResult::affected(1))
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.state.ensure_open()?;
        Ok(QueryResult::empty())
    }

    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>> {
        self.state.ensure_open()?;
        if self.state.hold_prepares.load(Ordering::SeqCst) {
            self.state.held_prepares.fetch_add(1, Ordering::SeqCst);
            self.state.prepare_gate.notified().await;
        }
        if self.state.fail_prepare.load(Ordering::SeqCst) {
            return Err(FastSqlError::Query("prepare rejected".into()));
        }
        self.state.record(Call::Prepare(sql.to_string()));
        Ok(Arc::new(RecordingStatement {
            sql: sql.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.record(Call::CloseConnection);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

struct RecordingStatement {
    sql: String,
    state: Arc<MockState>,
}

#[async_trait]
impl PreparedStatement for RecordingStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute(&self, params: &[Value]) -> Result<StatementResult> {
        self.state.ensure_open()?;
        if self.state.fail_execute.load(Ordering::SeqCst) {
            return Err(FastSqlError::Query("execute rejected".into()));
        }
        self.state.executes.fetch_add(1, Ordering::SeqCst);
        self.state.record(Call::Execute {
            sql: self.sql.clone(),
            params: params.to_vec(),
        });
        let rows = self.sql.matches("),(").count() + 1;
        Ok(StatementResult::affected(rows as u64))
    }

    async fn query(&self, _params: &[Value]) -> Result<QueryResult> {
        self.state.ensure_open()?;
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        self.state.record(Call::CloseStatement(self.sql.clone()));
        if self.state.fail_statement_close.load(Ordering::SeqCst) {
            return Err(FastSqlError::Driver("statement close rejected".into()));
        }
        Ok(())
    }
}

/// Driver that hands out one [`RecordingConnection`] with chosen capabilities
pub(crate) struct RecordingDriver {
    pub(crate) connection: RecordingConnection,
    pub(crate) capabilities: DriverCapabilities,
}

#[async_trait]
impl DatabaseDriver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn capabilities(&self) -> DriverCapabilities {
        self.capabilities.clone()
    }

    async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        Ok(self.connection.shared())
    }

    fn parse_connection_string(&self, _conn_str: &str) -> Result<ConnectionConfig> {
        Ok(ConnectionConfig::new("recording"))
    }

    fn build_connection_string(&self, _config: &ConnectionConfig) -> String {
        String::new()
    }
}

/// Install a test subscriber once so `RUST_LOG=fastsql=debug` shows engine logs
pub(crate) fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
