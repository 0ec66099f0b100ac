use std::collections::BTreeMap;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{AveragesOutputType, ConsumptionRecord, InventoryOutputType, QuantityPair, RecordAddInputType, RecordFilterInputType, StatsOutputType, TotalsOutputType},
};

/***************** Records:list models *********************/

/**
 * Query parameters for listing records.
 *
 * Both filters are optional exact matches and combine with AND semantics.
 */
#[derive(Debug, Deserialize)]
pub struct RecordsFilterQuery {
    pub date: Option<String>,
    pub line: Option<String>,
}

impl From<RecordsFilterQuery> for RecordFilterInputType {
    fn from(query: RecordsFilterQuery) -> Self {
        RecordFilterInputType { date: query.date.filter(|value| !value.is_empty()), line: query.line.filter(|value| !value.is_empty()) }
    }
}

/***************** Records:add models *********************/

/**
 * Request structure for creating a record.
 *
 * Clients may use either alias for the line and quantity fields
 * (`productionLine`/`line`, `ripponAmount`/`rippon`, `labelAmount`/`labels`),
 * and may post JSON or form data. Quantities arrive as raw JSON values
 * because the dashboard posts form-input strings. Alias resolution happens
 * once, in the conversion to `RecordAddInputType`.
 */
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordAddRequest {
    pub production_line: Option<String>,
    pub line: Option<String>,
    pub shift_leader: Option<String>,
    pub rippon_amount: Option<Value>,
    pub rippon: Option<Value>,
    pub label_amount: Option<Value>,
    pub labels: Option<Value>,
    pub notes: Option<String>,
}

/**
 * Converts the incoming request into the canonical input type. The primary
 * alias wins when both are present.
 */
impl From<RecordAddRequest> for RecordAddInputType {
    fn from(request: RecordAddRequest) -> Self {
        RecordAddInputType {
            line: resolve_alias(request.production_line, request.line),
            shift_leader: request.shift_leader.unwrap_or_default(),
            rippon: resolve_quantity(request.rippon_amount.filter(|value| !value.is_null()).or(request.rippon)),
            labels: resolve_quantity(request.label_amount.filter(|value| !value.is_null()).or(request.labels)),
            notes: request.notes.unwrap_or_default(),
        }
    }
}

/**
 * Picks the primary alias unless it is absent or empty.
 */
fn resolve_alias(primary: Option<String>, fallback: Option<String>) -> String {
    primary.filter(|value| !value.is_empty()).or(fallback).unwrap_or_default()
}

/**
 * Coerces a quantity value to a non-negative base. Numbers pass through,
 * numeric strings parse, everything else (absent, null, unparseable)
 * coerces to zero. Lenient by design; validation never rejects quantities.
 */
fn resolve_quantity(value: Option<Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number.as_i64().unwrap_or_else(|| number.as_f64().map_or(0, |float| float as i64)),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/**
 * Response structure for a single record. This shape is the external
 * contract; the timestamp renders as `YYYY-MM-DD HH:MM` and absent notes
 * render as the empty string.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub id: i64,
    pub timestamp: String,
    pub date: String,
    pub day: String,
    pub line: String,
    pub shift_leader: String,
    pub rippon: i64,
    pub labels: i64,
    pub notes: String,
}

impl From<ConsumptionRecord> for RecordResponse {
    fn from(record: ConsumptionRecord) -> Self {
        RecordResponse {
            id: record.id,
            timestamp: record.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            date: record.date,
            day: record.day,
            line: record.line,
            shift_leader: record.shift_leader,
            rippon: record.rippon,
            labels: record.labels,
            notes: record.notes.unwrap_or_default(),
        }
    }
}

/***************** Records:delete models *********************/

/**
 * Response structure for a successful deletion.
 */
#[derive(Debug, Serialize)]
pub struct DeleteRecordResponse {
    pub success: bool,
}

/***************** Stats models *********************/

/**
 * Response structure for the dashboard aggregates.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    totals: TotalsResponse,
    by_date: BTreeMap<String, QuantityPairResponse>,
    by_line: BTreeMap<String, QuantityPairResponse>,
    inventory: InventoryResponse,
    averages: AveragesResponse,
}

impl From<StatsOutputType> for StatsResponse {
    fn from(output: StatsOutputType) -> Self {
        StatsResponse {
            totals: TotalsResponse::from(output.totals),
            by_date: output.by_date.into_iter().map(|(date, pair)| (date, QuantityPairResponse::from(pair))).collect(),
            by_line: output.by_line.into_iter().map(|(line, pair)| (line, QuantityPairResponse::from(pair))).collect(),
            inventory: InventoryResponse::from(output.inventory),
            averages: AveragesResponse::from(output.averages),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsResponse {
    pub rippon: i64,
    pub labels: i64,
    pub records_count: i64,
}

impl From<TotalsOutputType> for TotalsResponse {
    fn from(totals: TotalsOutputType) -> Self {
        TotalsResponse { rippon: totals.rippon, labels: totals.labels, records_count: totals.records_count }
    }
}

#[derive(Debug, Serialize)]
pub struct QuantityPairResponse {
    pub rippon: i64,
    pub labels: i64,
}

impl From<QuantityPair> for QuantityPairResponse {
    fn from(pair: QuantityPair) -> Self {
        QuantityPairResponse { rippon: pair.rippon, labels: pair.labels }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub rippon_capacity: i64,
    pub labels_capacity: i64,
    pub rippon_remaining: i64,
    pub labels_remaining: i64,
}

impl From<InventoryOutputType> for InventoryResponse {
    fn from(inventory: InventoryOutputType) -> Self {
        InventoryResponse {
            rippon_capacity: inventory.rippon_capacity,
            labels_capacity: inventory.labels_capacity,
            rippon_remaining: inventory.rippon_remaining,
            labels_remaining: inventory.labels_remaining,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AveragesResponse {
    pub daily_rippon: f64,
    pub daily_labels: f64,
}

impl From<AveragesOutputType> for AveragesResponse {
    fn from(averages: AveragesOutputType) -> Self {
        AveragesResponse { daily_rippon: averages.daily_rippon, daily_labels: averages.daily_labels }
    }
}

/***************** Error models *********************/

/**
 * Custom error response for the application.
 */
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /**
     * The error code associated with the error type.
     */
    pub code: u16,
    /**
     * A human-readable message describing the error.
     */
    pub message: String,
}

impl ResponseError for ApplicationError {
    /**
     * Generates an error response for the application error.
     */
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse { code: get_error_code(&self.error_type), message: self.message.clone() };
        HttpResponse::build(get_statuscode(&self.error_type)).json(&error_response)
    }

    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::Validation => StatusCode::BAD_REQUEST,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorType::Initialization => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorType::Application => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/**
 * Maps application errors to error codes.
 *
 * # Arguments
 * `application_error`: The type of error that occurred.
 *
 * # Returns
 * The corresponding error code.
 */
fn get_error_code(application_error: &ErrorType) -> u16 {
    match application_error {
        ErrorType::Validation => 1000,
        ErrorType::NotFound => 1001,
        ErrorType::DatabaseError => 1002,
        ErrorType::Initialization => 1003,
        ErrorType::Application => 1004,
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_resolve_quantity_lenient_coercion() {
        assert_eq!(resolve_quantity(Some(json!(5))), 5);
        assert_eq!(resolve_quantity(Some(json!("7"))), 7);
        assert_eq!(resolve_quantity(Some(json!(" 3 "))), 3);
        assert_eq!(resolve_quantity(Some(json!("not a number"))), 0);
        assert_eq!(resolve_quantity(Some(json!(""))), 0);
        assert_eq!(resolve_quantity(Some(Value::Null)), 0);
        assert_eq!(resolve_quantity(None), 0);
    }

    #[test]
    fn test_alias_resolution_primary_wins() {
        let request = RecordAddRequest {
            production_line: Some("Line 1".to_string()),
            line: Some("Line 2".to_string()),
            shift_leader: Some("Alice".to_string()),
            rippon_amount: Some(json!(5)),
            rippon: Some(json!(9)),
            label_amount: None,
            labels: Some(json!(3)),
            ..RecordAddRequest::default()
        };
        let input = RecordAddInputType::from(request);
        assert_eq!(input.line, "Line 1");
        assert_eq!(input.rippon, 5);
        assert_eq!(input.labels, 3);
    }

    #[test]
    fn test_alias_resolution_falls_back_to_secondary() {
        let request = RecordAddRequest { line: Some("Line 4".to_string()), shift_leader: Some("Alice".to_string()), rippon: Some(json!("2")), ..RecordAddRequest::default() };
        let input = RecordAddInputType::from(request);
        assert_eq!(input.line, "Line 4");
        assert_eq!(input.rippon, 2);
        assert_eq!(input.labels, 0);
        assert_eq!(input.notes, "");
    }

    #[test]
    fn test_record_add_request_deserializes_from_json() {
        let request: RecordAddRequest = serde_json::from_value(json!({
            "productionLine": "Line 1",
            "shiftLeader": "Alice",
            "ripponAmount": "5",
            "labelAmount": 3,
            "notes": "torn reel"
        }))
        .unwrap();
        let input = RecordAddInputType::from(request);
        assert_eq!(input.line, "Line 1");
        assert_eq!(input.shift_leader, "Alice");
        assert_eq!(input.rippon, 5);
        assert_eq!(input.labels, 3);
        assert_eq!(input.notes, "torn reel");
    }

    #[test]
    fn test_record_response_external_shape() {
        let record = ConsumptionRecord {
            id: 7,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 45).unwrap(),
            date: "2025-06-02".to_string(),
            day: "Monday".to_string(),
            line: "Line 1".to_string(),
            shift_leader: "Alice".to_string(),
            rippon: 5,
            labels: 3,
            notes: None,
        };
        let response = RecordResponse::from(record);
        assert_eq!(response.timestamp, "2025-06-02 14:30");
        assert_eq!(response.notes, "");
        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized["shiftLeader"], "Alice");
        assert_eq!(serialized["rippon"], 5);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(get_statuscode(&ErrorType::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(get_statuscode(&ErrorType::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(get_statuscode(&ErrorType::DatabaseError), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
