use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::{
    dao::records::RecordsDao,
    model::{
        apperror::{ApplicationError, ErrorType},
        config::InventoryConfig,
        models::{AveragesOutputType, ConsumptionRecord, DEFAULT_LINES, InventoryOutputType, NewRecordType, QuantityPair, RecordAddInputType, RecordFilterInputType, StatsOutputType, TotalsOutputType},
    },
};

/**
 * Header row of the CSV export. The column order is part of the external
 * contract and must not change.
 */
const CSV_HEADER: [&str; 7] = ["Date", "Day", "Production Line", "Rippon Used", "Labels Used", "Shift Leader", "Notes"];

/**
 * Represents the service for managing consumption records.
 */
pub struct ConsumptionService {
    /**
     * The DAO for record operations.
     */
    records_dao: RecordsDao,
    /**
     * Connection pool for database operations.
     */
    connection_pool: Pool<Sqlite>,
    /**
     * Configured inventory capacities for the remaining-stock calculation.
     */
    inventory: InventoryConfig,
}

impl ConsumptionService {
    /**
     * Creates a new instance of `ConsumptionService`.
     *
     * # Arguments
     * `records_dao`: The DAO for record operations.
     * `connection_pool`: Connection pool for database operations.
     * `inventory`: Configured inventory capacities.
     *
     * # Returns
     * A new instance of `ConsumptionService`.
     */
    pub fn new(records_dao: RecordsDao, connection_pool: Pool<Sqlite>, inventory: InventoryConfig) -> Self {
        ConsumptionService { records_dao, connection_pool, inventory }
    }

    /**
     * Retrieves records matching the optional filters, newest first.
     *
     * # Arguments
     * `filter_params`: Optional date and line filters.
     *
     * # Returns
     * A Result containing the matching records or an `ApplicationError`.
     */
    pub async fn get_record_list(&self, filter_params: &RecordFilterInputType) -> Result<Vec<ConsumptionRecord>, ApplicationError> {
        let mut connection = self.acquire_connection().await?;
        self.records_dao.get_record_list(&mut connection, filter_params).await
    }

    /**
     * Retrieves the full record set in creation order, used by the exporters.
     *
     * # Returns
     * A Result containing all records or an `ApplicationError`.
     */
    pub async fn get_record_list_ascending(&self) -> Result<Vec<ConsumptionRecord>, ApplicationError> {
        let mut connection = self.acquire_connection().await?;
        self.records_dao.get_record_list_ascending(&mut connection).await
    }

    /**
     * Adds a new record. The creation timestamp is assigned here and the
     * `date` and `day` columns are derived from it.
     *
     * # Arguments
     * `record_add_input`: The validated input for the record to be added.
     *
     * # Returns
     * A Result containing the created record or an `ApplicationError`.
     */
    pub async fn add_record(&self, record_add_input: RecordAddInputType) -> Result<ConsumptionRecord, ApplicationError> {
        let new_record = NewRecordType::new(record_add_input, Utc::now());
        let mut transaction = self.connection_pool.begin().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to begin transaction: {err}")))?;
        let record_id = match self.records_dao.add_record(&mut transaction, &new_record).await {
            Ok(record_id) => {
                transaction.commit().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to commit transaction: {err}")))?;
                record_id
            }
            Err(err) => {
                transaction.rollback().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to rollback transaction: {err}")))?;
                return Err(err);
            }
        };
        Ok(ConsumptionRecord {
            id: record_id,
            timestamp: new_record.timestamp,
            date: new_record.date,
            day: new_record.day,
            line: new_record.line,
            shift_leader: new_record.shift_leader,
            rippon: new_record.rippon,
            labels: new_record.labels,
            notes: Some(new_record.notes),
        })
    }

    /**
     * Deletes a record by its ID. Deletion is permanent.
     *
     * # Arguments
     * `record_id`: The ID of the record to be deleted.
     *
     * # Returns
     * A Result indicating success or an `ApplicationError`.
     */
    pub async fn delete_record(&self, record_id: i64) -> Result<(), ApplicationError> {
        let mut transaction = self.connection_pool.begin().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to begin transaction: {err}")))?;
        match self.records_dao.delete_record(&mut transaction, record_id).await {
            Ok(()) => transaction.commit().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to commit transaction: {err}")))?,
            Err(err) => {
                transaction.rollback().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to rollback transaction: {err}")))?;
                return Err(err);
            }
        }
        Ok(())
    }

    /**
     * Computes the dashboard aggregates over the current record set.
     * Recomputed by full scan on every call; nothing is cached.
     *
     * # Returns
     * A Result containing the aggregates or an `ApplicationError`.
     */
    pub async fn get_statistics(&self) -> Result<StatsOutputType, ApplicationError> {
        let mut connection = self.acquire_connection().await?;
        let records = self.records_dao.get_record_list(&mut connection, &RecordFilterInputType::default()).await?;
        Ok(aggregate(&records, &self.inventory))
    }

    /**
     * Serializes the full record set to CSV in creation order.
     *
     * # Returns
     * A Result containing the CSV text or an `ApplicationError`.
     */
    pub async fn export_csv(&self) -> Result<String, ApplicationError> {
        let records = self.get_record_list_ascending().await?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER).map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to write CSV header: {err}")))?;
        for record in &records {
            let rippon = record.rippon.to_string();
            let labels = record.labels.to_string();
            writer
                .write_record([
                    record.date.as_str(),
                    record.day.as_str(),
                    record.line.as_str(),
                    rippon.as_str(),
                    labels.as_str(),
                    record.shift_leader.as_str(),
                    record.notes.as_deref().unwrap_or(""),
                ])
                .map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to write CSV row: {err}")))?;
        }
        let bytes = writer.into_inner().map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to flush CSV writer: {err}")))?;
        String::from_utf8(bytes).map_err(|err| ApplicationError::new(ErrorType::Application, format!("CSV output was not valid UTF-8: {err}")))
    }

    async fn acquire_connection(&self) -> Result<sqlx::pool::PoolConnection<Sqlite>, ApplicationError> {
        self.connection_pool.acquire().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to acquire database connection: {err}")))
    }
}

/**
 * Computes the dashboard aggregates from a record snapshot.
 *
 * The per-line breakdown is seeded with the default line set at zero;
 * unknown lines are added on demand. Remaining inventory floors at zero.
 * Averages divide by the number of distinct dates, minimum one.
 *
 * # Arguments
 * `records`: The record snapshot.
 * `inventory`: The configured capacities.
 *
 * # Returns
 * The computed `StatsOutputType`.
 */
pub fn aggregate(records: &[ConsumptionRecord], inventory: &InventoryConfig) -> StatsOutputType {
    let total_rippon: i64 = records.iter().map(|record| record.rippon).sum();
    let total_labels: i64 = records.iter().map(|record| record.labels).sum();

    let mut by_date: BTreeMap<String, QuantityPair> = BTreeMap::new();
    for record in records {
        let entry = by_date.entry(record.date.clone()).or_default();
        entry.rippon += record.rippon;
        entry.labels += record.labels;
    }

    let mut by_line: BTreeMap<String, QuantityPair> = DEFAULT_LINES.iter().map(|line| ((*line).to_string(), QuantityPair::default())).collect();
    for record in records {
        let entry = by_line.entry(record.line.clone()).or_default();
        entry.rippon += record.rippon;
        entry.labels += record.labels;
    }

    let distinct_dates: BTreeSet<&str> = records.iter().map(|record| record.date.as_str()).collect();
    let days = distinct_dates.len().max(1);

    StatsOutputType {
        totals: TotalsOutputType { rippon: total_rippon, labels: total_labels, records_count: records.len() as i64 },
        by_date,
        by_line,
        inventory: InventoryOutputType {
            rippon_capacity: inventory.rippon_capacity,
            labels_capacity: inventory.labels_capacity,
            rippon_remaining: (inventory.rippon_capacity - total_rippon).max(0),
            labels_remaining: (inventory.labels_capacity - total_labels).max(0),
        },
        averages: AveragesOutputType { daily_rippon: total_rippon as f64 / days as f64, daily_labels: total_labels as f64 / days as f64 },
    }
}
