//! The batch engine: accumulators, flushing and shutdown

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fastsql_core::{Connection, PreparedStatement, QueryResult, StatementResult, Value};
use fastsql_drivers::DriverRegistry;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::accumulator::BatchAccumulator;
use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use crate::statement_cache::StatementCache;
use crate::stats::{BatchStats, StatsCounters};

type SharedBatch = Arc<AsyncMutex<BatchAccumulator>>;

/// Buffers single-row INSERTs per statement and writes them as multi-row
/// prepared INSERTs.
///
/// All methods take `&self`; share the engine behind an [`Arc`] to insert
/// from several tasks. Rows for the same statement are serialized by that
/// statement's accumulator lock, while different statements proceed
/// independently.
pub struct BatchEngine {
    connection: Arc<dyn Connection>,
    config: BatchConfig,
    batches: Mutex<IndexMap<String, SharedBatch>>,
    statements: StatementCache,
    named: StatementCache,
    counters: StatsCounters,
    closed: AtomicBool,
}

impl BatchEngine {
    /// Connect through a built-in driver and batch `flush_threshold` rows per statement
    pub async fn open(driver: &str, connection_string: &str, flush_threshold: usize) -> Result<Self> {
        Self::open_with_config(driver, connection_string, BatchConfig::new(flush_threshold)).await
    }

    /// Connect through a built-in driver with a full configuration
    pub async fn open_with_config(
        driver: &str,
        connection_string: &str,
        config: BatchConfig,
    ) -> Result<Self> {
        Self::open_with_registry(&DriverRegistry::with_defaults(), driver, connection_string, config)
            .await
    }

    /// Connect through a driver looked up in `registry`
    pub async fn open_with_registry(
        registry: &DriverRegistry,
        driver: &str,
        connection_string: &str,
        config: BatchConfig,
    ) -> Result<Self> {
        config.validate()?;
        let Some(database_driver) = registry.get(driver) else {
            return Err(BatchError::UnknownDriver(driver.to_string()));
        };

        let capabilities = database_driver.capabilities();
        if !capabilities.supports_prepared_statements || !capabilities.supports_multi_row_insert {
            return Err(BatchError::Configuration(format!(
                "Driver '{}' cannot run multi-row prepared INSERTs",
                driver
            )));
        }
        let config = match (config.max_parameters(), capabilities.max_parameters) {
            (None, Some(limit)) => config.with_max_parameters(limit),
            _ => config,
        };

        let connection = registry.connect(driver, connection_string).await?;
        tracing::info!(
            driver = %driver,
            flush_threshold = config.flush_threshold(),
            max_parameters = ?config.max_parameters(),
            "batch engine connected"
        );
        Self::new(connection, config)
    }

    /// Wrap an already open connection
    pub fn new(connection: Arc<dyn Connection>, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connection,
            config,
            batches: Mutex::new(IndexMap::new()),
            statements: StatementCache::new("batch"),
            named: StatementCache::new("named"),
            counters: StatsCounters::default(),
            closed: AtomicBool::new(false),
        })
    }

    /// Buffer one row for `query`, flushing that statement once it holds
    /// `flush_threshold` rows.
    ///
    /// `query` must be a single-row INSERT with one placeholder per entry in
    /// `params`. Statements are grouped by their trimmed text. When a
    /// parameter limit is configured, pending rows are flushed early so a
    /// batch never binds more parameters than the limit allows.
    #[tracing::instrument(
        skip(self, query, params),
        fields(sql_preview = %query.chars().take(100).collect::<String>(), params = params.len())
    )]
    pub async fn insert(&self, query: &str, params: &[Value]) -> Result<()> {
        self.ensure_open()?;
        let batch = self.batch_for(query.trim())?;

        let mut acc = batch.lock().await;
        // close() may have drained this accumulator while we waited for it
        self.ensure_open()?;

        if let Some(limit) = self.config.max_parameters() {
            if params.len() > limit {
                return Err(BatchError::Configuration(format!(
                    "A row with {} parameters exceeds the limit of {} per statement",
                    params.len(),
                    limit
                )));
            }
            if acc.columns_per_row() == Some(params.len())
                && acc.pending_params().len() + params.len() > limit
            {
                tracing::debug!(rows = acc.row_count(), limit, "flushing before parameter limit");
                self.flush_batch(&mut acc).await?;
            }
        }

        acc.accumulate(params)?;
        self.counters.row_buffered();
        tracing::debug!(rows = acc.row_count(), "row buffered");

        if acc.row_count() >= self.config.flush_threshold() {
            self.flush_batch(&mut acc).await?;
        }
        Ok(())
    }

    /// Write every buffered row for `query` now.
    ///
    /// Unknown statements and statements with nothing buffered are a no-op.
    /// On failure the rows stay buffered and the flush can be retried.
    pub async fn flush(&self, query: &str) -> Result<()> {
        self.ensure_open()?;
        let Some(batch) = self.batches.lock().get(query.trim()).cloned() else {
            return Ok(());
        };
        let mut acc = batch.lock().await;
        // close() owns whatever is left once it has started
        self.ensure_open()?;
        self.flush_batch(&mut acc).await
    }

    /// Flush every statement in the order it was first seen, stopping at the
    /// first failure. Statements after the failing one keep their rows.
    pub async fn flush_all(&self) -> Result<()> {
        self.ensure_open()?;
        let batches: Vec<SharedBatch> = self.batches.lock().values().cloned().collect();
        for batch in batches {
            let mut acc = batch.lock().await;
            self.ensure_open()?;
            self.flush_batch(&mut acc).await?;
        }
        Ok(())
    }

    /// Flush pending rows, release every prepared statement and close the
    /// connection.
    ///
    /// Further inserts and flushes fail with [`BatchError::Closed`]. Closing twice is a
    /// no-op. The first flush error wins over statement release failures,
    /// which in turn win over a connection close error.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let batches: Vec<SharedBatch> = self
            .batches
            .lock()
            .drain(..)
            .map(|(_, batch)| batch)
            .collect();

        let mut flush_error = None;
        for batch in batches {
            let mut acc = batch.lock().await;
            if acc.is_empty() {
                continue;
            }

            if self.config.flush_on_close() {
                if let Err(e) = self.flush_batch(&mut acc).await {
                    tracing::warn!(error = %e, rows = acc.row_count(), "flush during close failed");
                    self.counters.rows_discarded(acc.row_count());
                    acc.reset();
                    flush_error.get_or_insert(e);
                }
            } else {
                tracing::warn!(rows = acc.row_count(), "discarding pending rows on close");
                self.counters.rows_discarded(acc.row_count());
                acc.reset();
            }
        }

        let (batch_errors, named_errors) =
            tokio::join!(self.statements.close_all(), self.named.close_all());
        let release_errors: Vec<_> = batch_errors.into_iter().chain(named_errors).collect();

        let close_result = self.connection.close().await;
        tracing::info!(
            flush_failed = flush_error.is_some(),
            release_failures = release_errors.len(),
            "batch engine closed"
        );

        if let Some(e) = flush_error {
            return Err(e);
        }
        if !release_errors.is_empty() {
            return Err(BatchError::CloseFailure(release_errors));
        }
        close_result?;
        Ok(())
    }

    /// Prepare `sql` and keep it under `name` until the engine closes.
    ///
    /// Preparing a name again with the same SQL returns the existing
    /// statement; different SQL replaces and releases it.
    pub async fn prepare_named(&self, name: &str, sql: &str) -> Result<Arc<dyn PreparedStatement>> {
        self.ensure_open()?;
        self.named
            .prepare_keyed(self.connection.as_ref(), name, sql)
            .await
            .map_err(|source| BatchError::PrepareFailure {
                sql: sql.to_string(),
                source,
            })
    }

    /// A statement previously registered with [`Self::prepare_named`]
    pub async fn named(&self, name: &str) -> Option<Arc<dyn PreparedStatement>> {
        self.named.get(name).await
    }

    /// Run a statement directly on the connection, bypassing batching
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_open()?;
        Ok(self.connection.execute(sql, params).await?)
    }

    /// Run a query directly on the connection
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        Ok(self.connection.query(sql, params).await?)
    }

    pub async fn ping(&self) -> Result<()> {
        self.ensure_open()?;
        Ok(self.connection.ping().await?)
    }

    /// The underlying connection
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn flush_threshold(&self) -> usize {
        self.config.flush_threshold()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Rows currently buffered for `query`
    pub async fn pending_rows(&self, query: &str) -> usize {
        let Some(batch) = self.batches.lock().get(query.trim()).cloned() else {
            return 0;
        };
        let acc = batch.lock().await;
        acc.row_count()
    }

    /// Number of distinct statements being batched
    pub fn shapes(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn stats(&self) -> BatchStats {
        self.counters
            .snapshot(self.statements.prepare_count(), self.shapes())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BatchError::Closed);
        }
        Ok(())
    }

    /// Find or register the accumulator for `key`. The statement is split
    /// before registering so a malformed query leaves nothing behind.
    fn batch_for(&self, key: &str) -> Result<SharedBatch> {
        if let Some(batch) = self.batches.lock().get(key).cloned() {
            return Ok(batch);
        }

        let mut acc = BatchAccumulator::new(key);
        acc.shape()?;

        let mut batches = self.batches.lock();
        let batch = batches
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(acc)));
        Ok(Arc::clone(batch))
    }

    #[tracing::instrument(skip(self, acc), fields(rows = acc.row_count()))]
    async fn flush_batch(&self, acc: &mut BatchAccumulator) -> Result<()> {
        let Some(sql) = acc.build_collapsed_statement() else {
            return Ok(());
        };
        let rows = acc.row_count();

        let stmt = match self
            .statements
            .get_or_prepare(self.connection.as_ref(), &sql)
            .await
        {
            Ok(stmt) => stmt,
            Err(source) => {
                self.counters.flush_failed();
                tracing::error!(
                    sql_preview = %sql.chars().take(100).collect::<String>(),
                    error = %source,
                    "failed to prepare batch statement"
                );
                return Err(BatchError::PrepareFailure { sql, source });
            }
        };

        match stmt.execute(acc.pending_params()).await {
            Ok(result) => {
                tracing::debug!(
                    sql_preview = %sql.chars().take(100).collect::<String>(),
                    affected_rows = result.affected_rows,
                    "batch flushed"
                );
                acc.reset();
                self.counters.flushed(rows);
                Ok(())
            }
            Err(source) => {
                self.counters.flush_failed();
                tracing::error!(error = %source, "failed to execute batch statement");
                Err(BatchError::ExecuteFailure { rows, source })
            }
        }
    }
}
