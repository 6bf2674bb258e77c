//! SQLite implementation of StorageExecutor.

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use model_adapter::{
    ConnectionConfig, DatabaseConnection, InsertOutcome, MappedType, Model, PrimaryKeyPredicate,
    Registry, Row, SaveOutcome, SaveRequest, StatementHandle, StorageError, StorageExecutor,
};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params_from_iter};
use tracing::{debug, info, trace, warn};

use crate::bind::{failure, parameters, read_row};

struct ConnectionState {
    conn: Connection,
    generation: u64,
}

/// A single writable SQLite connection plus the types mapped onto it.
///
/// The connection is serialized behind a mutex; compiled statements live in
/// rusqlite's per-connection statement cache and are addressed by their SQL.
pub struct SqliteDatabase {
    config: ConnectionConfig,
    registry: Registry,
    state: Mutex<ConnectionState>,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("generation", &self.connection_generation())
            .finish()
    }
}

fn open(config: &ConnectionConfig) -> Result<Connection, StorageError> {
    let conn = match config {
        ConnectionConfig::Path(path) => Connection::open(path),
        ConnectionConfig::InMemory => Connection::open_in_memory(),
    }
    .map_err(failure)?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT).map_err(failure)?;
    Ok(conn)
}

fn create_tables(conn: &Connection, statements: &[String]) -> Result<(), StorageError> {
    for sql in statements {
        conn.execute_batch(sql).map_err(failure)?;
    }
    Ok(())
}

fn run_insert(
    conn: &Connection,
    statement: &StatementHandle,
    values: &Row,
) -> Result<InsertOutcome, StorageError> {
    if values.len() != statement.parameter_count() {
        return Err(StorageError::Configuration(format!(
            "Insert into {} expects {} values, got {}",
            statement.table(),
            statement.parameter_count(),
            values.len()
        )));
    }

    let rows = conn
        .prepare_cached(statement.sql())
        .and_then(|mut stmt| stmt.execute(params_from_iter(parameters(values.values()))))
        .map_err(failure)?;
    let rows_affected = rows as u64;
    let generated_id = (rows_affected > 0).then(|| conn.last_insert_rowid());

    trace!(table = statement.table(), rows_affected, generated_id, "insert");
    Ok(InsertOutcome {
        rows_affected,
        generated_id,
    })
}

fn run_update(
    conn: &Connection,
    mapping: &MappedType,
    values: &Row,
    predicate: &PrimaryKeyPredicate,
) -> Result<u64, StorageError> {
    let sql = mapping.update_sql(&predicate.where_clause());
    let mut params = parameters(values.values());
    params.extend(parameters(&predicate.parameters()?));

    let rows = conn
        .prepare_cached(&sql)
        .and_then(|mut stmt| stmt.execute(params_from_iter(params)))
        .map_err(failure)?;

    trace!(table = mapping.table, rows, "update");
    Ok(rows as u64)
}

fn run_exists(
    conn: &Connection,
    mapping: &MappedType,
    predicate: &PrimaryKeyPredicate,
) -> Result<bool, StorageError> {
    let sql = mapping.exists_sql(&predicate.where_clause());
    let params = parameters(&predicate.parameters()?);

    conn.prepare_cached(&sql)
        .and_then(|mut stmt| stmt.query_row(params_from_iter(params), |row| row.get::<_, bool>(0)))
        .map_err(failure)
}

impl SqliteDatabase {
    /// Validate `T`'s mapping and make it routable through this database.
    ///
    /// Tables are created by [`DatabaseConnection::initialize`].
    pub fn register<T: Model + 'static>(&self) -> Result<&'static MappedType, StorageError> {
        self.registry.register::<T>()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Replace the connection with a freshly opened one.
    ///
    /// Tables of registered types are recreated if missing. Statements
    /// compiled against the previous connection are refused afterwards.
    pub fn reopen(&self) -> Result<u64, StorageError> {
        let conn = open(&self.config)?;
        create_tables(&conn, &self.registry.creation_statements())?;

        let mut state = self.lock();
        state.conn = conn;
        state.generation += 1;
        info!(generation = state.generation, "reopened sqlite connection");
        Ok(state.generation)
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DatabaseConnection for SqliteDatabase {
    fn connect(config: impl Into<ConnectionConfig>) -> Result<Self, StorageError> {
        let config = config.into();
        let conn = open(&config)?;
        debug!(config = ?config, "opened sqlite connection");

        Ok(Self {
            config,
            registry: Registry::new(),
            state: Mutex::new(ConnectionState {
                conn,
                generation: 0,
            }),
        })
    }

    fn initialize(&self) -> Result<(), StorageError> {
        let statements = self.registry.creation_statements();
        create_tables(&self.lock().conn, &statements)
            .inspect_err(|e| warn!(error = %e, "table creation failed"))?;
        info!(tables = statements.len(), "initialized sqlite schema");
        Ok(())
    }
}

impl StorageExecutor for SqliteDatabase {
    fn connection_generation(&self) -> u64 {
        self.lock().generation
    }

    fn compile_statement(
        &self,
        mapping: &MappedType,
        sql: &str,
    ) -> Result<StatementHandle, StorageError> {
        let registered = self.registry.mapping_for_table(mapping.table)?;
        let state = self.lock();
        let parameter_count = state
            .conn
            .prepare_cached(sql)
            .map(|stmt| stmt.parameter_count())
            .map_err(failure)?;

        debug!(
            table = registered.table,
            generation = state.generation,
            parameter_count,
            "prepared statement"
        );
        Ok(StatementHandle::new(
            registered.table,
            sql,
            parameter_count,
            state.generation,
        ))
    }

    fn insert(
        &self,
        statement: &StatementHandle,
        values: &Row,
    ) -> Result<InsertOutcome, StorageError> {
        let state = self.lock();
        statement.ensure_current(state.generation)?;
        run_insert(&state.conn, statement, values)
    }

    fn update(
        &self,
        mapping: &MappedType,
        values: &Row,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<u64, StorageError> {
        run_update(&self.lock().conn, mapping, values, predicate)
    }

    fn delete(
        &self,
        mapping: &MappedType,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<u64, StorageError> {
        let sql = mapping.delete_sql(&predicate.where_clause());
        let params = parameters(&predicate.parameters()?);

        let rows = self
            .lock()
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(params)))
            .map_err(failure)?;

        trace!(table = mapping.table, rows, "delete");
        Ok(rows as u64)
    }

    fn exists(
        &self,
        mapping: &MappedType,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<bool, StorageError> {
        run_exists(&self.lock().conn, mapping, predicate)
    }

    fn fetch_one(
        &self,
        mapping: &MappedType,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<Option<Row>, StorageError> {
        let sql = format!("{} LIMIT 1", mapping.select_sql(&predicate.where_clause()));
        let params = parameters(&predicate.parameters()?);

        self.lock()
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| {
                stmt.query_row(params_from_iter(params), |row| read_row(mapping, row))
                    .optional()
            })
            .map_err(failure)
    }

    fn save(&self, request: SaveRequest<'_>) -> Result<SaveOutcome, StorageError> {
        let mut state = self.lock();
        request.statement.ensure_current(state.generation)?;

        let tx = state
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(failure)?;

        let outcome = if run_exists(&tx, request.mapping, request.predicate)? {
            SaveOutcome::Updated(run_update(
                &tx,
                request.mapping,
                request.update_values,
                request.predicate,
            )?)
        } else {
            SaveOutcome::Inserted(run_insert(&tx, request.statement, request.insert_values)?)
        };

        tx.commit().map_err(failure)?;
        Ok(outcome)
    }
}
