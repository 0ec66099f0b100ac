use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Production lines always present in the per-line breakdown, even with no
 * recorded consumption. Records may reference lines outside this set.
 */
pub const DEFAULT_LINES: [&str; 6] = ["Line 1", "Line 2", "Line 3", "Line 4", "Line 6", "Line 7"];

/**
 * A persisted consumption record. One entry per shift-line usage report.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRecord {
    /**
     * Unique identifier, assigned by the database at insertion. Never reused.
     */
    pub id: i64,
    /**
     * Creation time in UTC.
     */
    pub timestamp: DateTime<Utc>,
    /**
     * Calendar date derived from the timestamp, format YYYY-MM-DD.
     */
    pub date: String,
    /**
     * Full weekday name derived from the timestamp.
     */
    pub day: String,
    /**
     * Production line identifier.
     */
    pub line: String,
    /**
     * Name of the responsible shift leader.
     */
    pub shift_leader: String,
    /**
     * Rippon quantity consumed.
     */
    pub rippon: i64,
    /**
     * Labels quantity consumed.
     */
    pub labels: i64,
    /**
     * Optional free-text notes.
     */
    pub notes: Option<String>,
}

/**
 * Converts a database row tuple into a `ConsumptionRecord`.
 */
impl From<(i64, DateTime<Utc>, String, String, String, String, i64, i64, Option<String>)> for ConsumptionRecord {
    fn from(row: (i64, DateTime<Utc>, String, String, String, String, i64, i64, Option<String>)) -> Self {
        ConsumptionRecord { id: row.0, timestamp: row.1, date: row.2, day: row.3, line: row.4, shift_leader: row.5, rippon: row.6, labels: row.7, notes: row.8 }
    }
}

/**
 * Canonical input for creating a record, after alias resolution at the
 * API boundary.
 */
#[derive(Debug, Clone)]
pub struct RecordAddInputType {
    pub line: String,
    pub shift_leader: String,
    pub rippon: i64,
    pub labels: i64,
    pub notes: String,
}

impl RecordAddInputType {
    /**
     * Validates and normalizes the input.
     *
     * Trims `line` and `shift_leader` and rejects either being empty after
     * trimming. Negative quantities normalize to zero.
     *
     * # Returns
     * The normalized input or an `ApplicationError` of type `Validation`.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        let line = self.line.trim().to_string();
        let shift_leader = self.shift_leader.trim().to_string();
        if line.is_empty() {
            return Err(ApplicationError::new(ErrorType::Validation, "Missing required field: productionLine".to_string()));
        }
        if shift_leader.is_empty() {
            return Err(ApplicationError::new(ErrorType::Validation, "Missing required field: shiftLeader".to_string()));
        }
        Ok(RecordAddInputType { line, shift_leader, rippon: self.rippon.max(0), labels: self.labels.max(0), notes: self.notes })
    }
}

/**
 * A record ready for insertion. The timestamp is assigned by the service and
 * `date`/`day` are derived from it, never supplied by the client.
 */
#[derive(Debug, Clone)]
pub struct NewRecordType {
    pub timestamp: DateTime<Utc>,
    pub date: String,
    pub day: String,
    pub line: String,
    pub shift_leader: String,
    pub rippon: i64,
    pub labels: i64,
    pub notes: String,
}

impl NewRecordType {
    /**
     * Builds a new record from validated input and the creation time.
     *
     * # Arguments
     * `input`: The validated add input.
     * `timestamp`: The creation time, used to derive `date` and `day`.
     */
    pub fn new(input: RecordAddInputType, timestamp: DateTime<Utc>) -> Self {
        NewRecordType {
            timestamp,
            date: timestamp.format("%Y-%m-%d").to_string(),
            day: timestamp.format("%A").to_string(),
            line: input.line,
            shift_leader: input.shift_leader,
            rippon: input.rippon,
            labels: input.labels,
            notes: input.notes,
        }
    }
}

/**
 * Filter parameters for listing records. Both filters are optional and
 * combine with AND semantics.
 */
#[derive(Debug, Clone, Default)]
pub struct RecordFilterInputType {
    pub date: Option<String>,
    pub line: Option<String>,
}

/**
 * A rippon/labels quantity pair used by the grouped breakdowns.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantityPair {
    pub rippon: i64,
    pub labels: i64,
}

/**
 * Summed quantities and record count across the full record set.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsOutputType {
    pub rippon: i64,
    pub labels: i64,
    pub records_count: i64,
}

/**
 * Remaining inventory against the configured capacities.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryOutputType {
    pub rippon_capacity: i64,
    pub labels_capacity: i64,
    pub rippon_remaining: i64,
    pub labels_remaining: i64,
}

/**
 * Average daily consumption over the distinct dates observed.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct AveragesOutputType {
    pub daily_rippon: f64,
    pub daily_labels: f64,
}

/**
 * Full aggregation output for the dashboard.
 */
#[derive(Debug, Clone)]
pub struct StatsOutputType {
    pub totals: TotalsOutputType,
    pub by_date: BTreeMap<String, QuantityPair>,
    pub by_line: BTreeMap<String, QuantityPair>,
    pub inventory: InventoryOutputType,
    pub averages: AveragesOutputType,
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn input(line: &str, shift_leader: &str) -> RecordAddInputType {
        RecordAddInputType { line: line.to_string(), shift_leader: shift_leader.to_string(), rippon: 5, labels: 3, notes: String::new() }
    }

    #[test]
    fn test_validate_trims_fields() {
        let validated = input("  Line 1  ", " Alice ").validate().unwrap();
        assert_eq!(validated.line, "Line 1");
        assert_eq!(validated.shift_leader, "Alice");
    }

    #[test]
    fn test_validate_rejects_empty_line() {
        let result = input("   ", "Alice").validate();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().error_type, ErrorType::Validation);
    }

    #[test]
    fn test_validate_rejects_empty_shift_leader() {
        let result = input("Line 1", "").validate();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().error_type, ErrorType::Validation);
    }

    #[test]
    fn test_validate_clamps_negative_quantities() {
        let mut raw = input("Line 1", "Alice");
        raw.rippon = -4;
        raw.labels = -1;
        let validated = raw.validate().unwrap();
        assert_eq!(validated.rippon, 0);
        assert_eq!(validated.labels, 0);
    }

    #[test]
    fn test_new_record_derives_date_and_day() {
        let timestamp = Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0).unwrap();
        let record = NewRecordType::new(input("Line 1", "Alice").validate().unwrap(), timestamp);
        assert_eq!(record.date, "2025-06-02");
        assert_eq!(record.day, "Monday");
    }
}
