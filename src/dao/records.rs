use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{Instrument, instrument};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{ConsumptionRecord, NewRecordType, RecordFilterInputType},
};

/**
 * Database response type for querying consumption records.
 */
pub type QueryRecordDbResp = (i64, DateTime<Utc>, String, String, String, String, i64, i64, Option<String>);

/**
 * SQL statement creating the consumption records table. AUTOINCREMENT keeps
 * deleted ids from being reused.
 */
const CREATE_RECORDS_TABLE: &str = "CREATE TABLE IF NOT EXISTS consumption_records (
                                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                                 timestamp DATETIME NOT NULL,
                                 date TEXT NOT NULL,
                                 day TEXT NOT NULL,
                                 line TEXT NOT NULL,
                                 shift_leader TEXT NOT NULL,
                                 rippon INTEGER NOT NULL,
                                 labels INTEGER NOT NULL,
                                 notes TEXT)";

/**
 * SQL statements creating the indexes used by the list filters and ordering.
 */
const CREATE_RECORDS_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS ix_consumption_records_timestamp ON consumption_records (timestamp)",
    "CREATE INDEX IF NOT EXISTS ix_consumption_records_date ON consumption_records (date)",
    "CREATE INDEX IF NOT EXISTS ix_consumption_records_line ON consumption_records (line)",
];

/**
 * SQL query to retrieve records, newest first, with optional exact-match
 * date and line filters. The id tiebreak keeps same-second inserts stable.
 */
const QUERY_RECORDS_LIST: &str = "SELECT id, timestamp, date, day, line, shift_leader, rippon, labels, notes
                                 FROM consumption_records
                                 WHERE (?1 IS NULL OR date = ?1) AND (?2 IS NULL OR line = ?2)
                                 ORDER BY timestamp DESC, id DESC";

/**
 * SQL query to retrieve the full record set in creation order, used by the
 * exporters.
 */
const QUERY_RECORDS_LIST_ASC: &str = "SELECT id, timestamp, date, day, line, shift_leader, rippon, labels, notes
                                 FROM consumption_records
                                 ORDER BY timestamp ASC, id ASC";

/**
 * SQL query to add a new record.
 */
const ADD_RECORD: &str = "INSERT INTO consumption_records (timestamp, date, day, line, shift_leader, rippon, labels, notes) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/**
 * SQL query to delete a record.
 */
const DELETE_RECORD: &str = "DELETE FROM consumption_records WHERE id = ?1";

/**
 * DAO for consumption record database operations.
 */
pub struct RecordsDao {}

impl RecordsDao {
    /**
     * Creates a new instance of `RecordsDao`.
     *
     * # Returns
     * A new instance of `RecordsDao`.
     */
    pub fn new() -> Self {
        RecordsDao {}
    }

    /**
     * Creates the records table and its indexes if they do not exist.
     * Run once at startup before the server accepts requests.
     *
     * # Arguments
     * `connection_pool`: The database connection pool.
     *
     * # Returns
     * A result indicating success or failure of the operation.
     */
    pub async fn create_schema(&self, connection_pool: &Pool<Sqlite>) -> Result<(), ApplicationError> {
        sqlx::query(CREATE_RECORDS_TABLE)
            .execute(connection_pool)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create records table: {err}")))?;
        for statement in CREATE_RECORDS_INDEXES {
            sqlx::query(statement)
                .execute(connection_pool)
                .await
                .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create records index: {err}")))?;
        }
        Ok(())
    }

    /**
     * Retrieves records matching the optional date and line filters, newest
     * timestamp first.
     *
     * # Arguments
     * `connection`: The database connection.
     * `filter_params`: Optional exact-match filters, AND semantics.
     *
     * # Returns
     * A Result containing the matching records or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_record_list(&self, connection: &mut SqliteConnection, filter_params: &RecordFilterInputType) -> Result<Vec<ConsumptionRecord>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryRecordDbResp> = sqlx::query_as(QUERY_RECORDS_LIST)
            .bind(filter_params.date.as_deref())
            .bind(filter_params.line.as_deref())
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get record list: {err}")))?;
        Ok(results.into_iter().map(ConsumptionRecord::from).collect())
    }

    /**
     * Retrieves the full record set in ascending creation order.
     *
     * # Arguments
     * `connection`: The database connection.
     *
     * # Returns
     * A Result containing all records or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_record_list_ascending(&self, connection: &mut SqliteConnection) -> Result<Vec<ConsumptionRecord>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryRecordDbResp> = sqlx::query_as(QUERY_RECORDS_LIST_ASC)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get ascending record list: {err}")))?;
        Ok(results.into_iter().map(ConsumptionRecord::from).collect())
    }

    /**
     * Adds a new record to the database.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `new_record`: The record to be inserted.
     *
     * # Returns
     * A result containing the assigned record id or an `ApplicationError`.
     */
    #[instrument(skip(self, transaction, new_record), fields(result))]
    pub async fn add_record(&self, transaction: &mut SqliteConnection, new_record: &NewRecordType) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(ADD_RECORD)
            .bind(new_record.timestamp)
            .bind(&new_record.date)
            .bind(&new_record.day)
            .bind(&new_record.line)
            .bind(&new_record.shift_leader)
            .bind(new_record.rippon)
            .bind(new_record.labels)
            .bind(&new_record.notes)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to add record: {err}")))?;
        Ok(result.last_insert_rowid())
    }

    /**
     * Deletes a record from the database by its ID.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `record_id`: The ID of the record to be deleted.
     *
     * # Returns
     * A result indicating success or failure of the operation.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn delete_record(&self, transaction: &mut SqliteConnection, record_id: i64) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(DELETE_RECORD)
            .bind(record_id)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to delete record: {err}")))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Record with ID {} not found for deletion", record_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Record not found".to_string()));
        }
        if result.rows_affected() > 1 {
            tracing::warn!("Multiple records attempted deleted. Rolled back");
            return Err(ApplicationError::new(ErrorType::Application, "Multiple records attempted deleted. Rolled back".to_string()));
        }
        Ok(())
    }
}
