use actix_files::NamedFile;
use actix_web::{
    Either, HttpRequest, HttpResponse, delete, get, post,
    web::{self, Form, Json, Path},
};
use tracing::{Instrument, instrument};

use crate::{
    api::{
        rest::{DeleteRecordResponse, RecordAddRequest, RecordResponse, RecordsFilterQuery, StatsResponse},
        state::AppState,
    },
    model::{
        apperror::ApplicationError,
        models::{RecordAddInputType, RecordFilterInputType},
    },
};

/**
 * Attachment filename of the CSV export.
 */
const CSV_EXPORT_FILENAME: &str = "material_consumption.csv";

/**
 * Endpoint to retrieve consumption records, newest first. Accepts optional
 * `date` and `line` query filters.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "listRecords", trace_id = get_trace_id(&http_request), result))]
#[get("/api/records")]
pub async fn records_list(http_request: HttpRequest, filter: web::Query<RecordsFilterQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let filter_params = RecordFilterInputType::from(filter.into_inner());
    let records = app_state.consumption_service.get_record_list(&filter_params).instrument(span).await?;
    Ok(HttpResponse::Ok().json(records.into_iter().map(RecordResponse::from).collect::<Vec<_>>()))
}

/**
 * Endpoint to create a record. Accepts a JSON or form body with the
 * documented field aliases; responds 201 with the created record.
 */
#[instrument(level = "info", skip(http_request, app_state, request_body), fields(service = "addRecord", trace_id = get_trace_id(&http_request), result))]
#[post("/api/records")]
pub async fn record_add(
    http_request: HttpRequest,
    request_body: Either<Json<RecordAddRequest>, Form<RecordAddRequest>>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let record_add_input = RecordAddInputType::from(request_body.into_inner()).validate()?;
    let record = app_state.consumption_service.add_record(record_add_input).instrument(span).await?;
    Ok(HttpResponse::Created().json(RecordResponse::from(record)))
}

/**
 * Endpoint to delete a record by id. Deletion is permanent.
 */
#[instrument(skip(http_request, app_state), fields(service = "deleteRecord", trace_id = get_trace_id(&http_request), result))]
#[delete("/api/records/{recordId}")]
pub async fn record_delete(path: Path<i64>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let record_id = path.into_inner();
    app_state.consumption_service.delete_record(record_id).instrument(span).await?;
    Ok(HttpResponse::Ok().json(DeleteRecordResponse { success: true }))
}

/**
 * Endpoint to retrieve the dashboard aggregates.
 */
#[instrument(skip(http_request, app_state), fields(service = "getStats", trace_id = get_trace_id(&http_request), result))]
#[get("/api/stats")]
pub async fn stats_get(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let stats = app_state.consumption_service.get_statistics().instrument(span).await?;
    Ok(HttpResponse::Ok().json(StatsResponse::from(stats)))
}

/**
 * Endpoint to download the record set as a CSV attachment, in creation order.
 */
#[instrument(skip(http_request, app_state), fields(service = "exportCsv", trace_id = get_trace_id(&http_request), result))]
#[get("/export/csv")]
pub async fn export_csv(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let csv_text = app_state.consumption_service.export_csv().instrument(span).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((actix_web::http::header::CONTENT_DISPOSITION, format!("attachment; filename={CSV_EXPORT_FILENAME}")))
        .body(csv_text))
}

/**
 * Endpoint to retrieve the full record set as JSON, in creation order.
 */
#[instrument(skip(http_request, app_state), fields(service = "exportJson", trace_id = get_trace_id(&http_request), result))]
#[get("/export/json")]
pub async fn export_json(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let records = app_state.consumption_service.get_record_list_ascending().instrument(span).await?;
    Ok(HttpResponse::Ok().json(records.into_iter().map(RecordResponse::from).collect::<Vec<_>>()))
}

/**
 * Serves the dashboard page shell.
 */
#[get("/")]
pub async fn index() -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open_async("./static/index.html").await?)
}

/**
 * Retrieves the trace ID from the HTTP request headers.
 * If the trace ID is not present, a new UUID is generated.
 */
fn get_trace_id(http_request: &HttpRequest) -> String {
    http_request.headers().get("X-Trace-ID")
        .and_then(|v| v.to_str().ok().map(std::string::ToString::to_string))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod test {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::{dao::records::RecordsDao, model::config::InventoryConfig, service::consumption::ConsumptionService};

    use super::*;

    /**
     * Single-connection pool so every query sees the same in-memory database.
     */
    async fn init_state() -> web::Data<AppState> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let records_dao = RecordsDao::new();
        records_dao.create_schema(&pool).await.unwrap();
        let consumption_service = ConsumptionService::new(records_dao, pool, InventoryConfig { rippon_capacity: 50, labels_capacity: 30 });
        web::Data::new(AppState::new(consumption_service))
    }

    macro_rules! init_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .service(records_list)
                    .service(record_add)
                    .service(record_delete)
                    .service(stats_get)
                    .service(export_csv)
                    .service(export_json),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_add_record_then_stats_scenario() {
        let state = init_state().await;
        let app = init_app!(state);

        let request = test::TestRequest::post().uri("/api/records").set_json(json!({"line": "Line 1", "shiftLeader": "Alice", "rippon": 5, "labels": 3})).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(response).await;
        assert_eq!(created["rippon"], 5);
        assert_eq!(created["labels"], 3);
        assert_eq!(created["shiftLeader"], "Alice");

        let request = test::TestRequest::get().uri("/api/stats").to_request();
        let stats: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(stats["totals"]["rippon"], 5);
        assert_eq!(stats["byLine"]["Line 1"], json!({"rippon": 5, "labels": 3}));
    }

    #[actix_web::test]
    async fn test_add_record_accepts_form_body_and_aliases() {
        let state = init_state().await;
        let app = init_app!(state);

        let request = test::TestRequest::post()
            .uri("/api/records")
            .set_form([("productionLine", "Line 2"), ("shiftLeader", "Bob"), ("ripponAmount", "4"), ("labelAmount", "2")])
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(response).await;
        assert_eq!(created["line"], "Line 2");
        assert_eq!(created["rippon"], 4);
        assert_eq!(created["labels"], 2);
    }

    #[actix_web::test]
    async fn test_add_record_blank_shift_leader_rejected_and_not_persisted() {
        let state = init_state().await;
        let app = init_app!(state);

        let request = test::TestRequest::post().uri("/api/records").set_json(json!({"line": "Line 1", "shiftLeader": "   ", "rippon": 5})).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = test::TestRequest::get().uri("/api/records").to_request();
        let records: Vec<Value> = test::call_and_read_body_json(&app, request).await;
        assert!(records.is_empty());
    }

    #[actix_web::test]
    async fn test_records_list_filters_by_date_and_line() {
        let state = init_state().await;
        let app = init_app!(state);

        for (line, rippon) in [("Line 1", 5), ("Line 2", 2)] {
            let request = test::TestRequest::post().uri("/api/records").set_json(json!({"line": line, "shiftLeader": "Alice", "rippon": rippon})).to_request();
            let response = test::call_service(&app, request).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let request = test::TestRequest::get().uri("/api/records?line=Line%201").to_request();
        let records: Vec<Value> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["rippon"], 5);

        let request = test::TestRequest::get().uri("/api/records?line=Line%201&date=1999-01-01").to_request();
        let records: Vec<Value> = test::call_and_read_body_json(&app, request).await;
        assert!(records.is_empty());
    }

    #[actix_web::test]
    async fn test_delete_record_success_and_unknown_id() {
        let state = init_state().await;
        let app = init_app!(state);

        let request = test::TestRequest::post().uri("/api/records").set_json(json!({"line": "Line 1", "shiftLeader": "Alice"})).to_request();
        let created: Value = test::call_and_read_body_json(&app, request).await;
        let record_id = created["id"].as_i64().unwrap();

        let request = test::TestRequest::delete().uri(&format!("/api/records/{record_id}")).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["success"], true);

        let request = test::TestRequest::delete().uri(&format!("/api/records/{record_id}")).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_stats_empty_store_reports_full_capacity() {
        let state = init_state().await;
        let app = init_app!(state);

        let request = test::TestRequest::get().uri("/api/stats").to_request();
        let stats: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(stats["inventory"], json!({"ripponCapacity": 50, "labelsCapacity": 30, "ripponRemaining": 50, "labelsRemaining": 30}));
        assert_eq!(stats["totals"]["recordsCount"], 0);
        assert_eq!(stats["averages"]["dailyRippon"], 0.0);
        assert_eq!(stats["byLine"].as_object().unwrap().len(), 6);
    }

    #[actix_web::test]
    async fn test_export_csv_attachment() {
        let state = init_state().await;
        let app = init_app!(state);

        let request = test::TestRequest::post().uri("/api/records").set_json(json!({"line": "Line 1", "shiftLeader": "Alice", "rippon": 5, "labels": 3})).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let request = test::TestRequest::get().uri("/export/csv").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Content-Disposition").unwrap(), "attachment; filename=material_consumption.csv");
        let body = test::read_body(response).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("Date,Day,Production Line,Rippon Used,Labels Used,Shift Leader,Notes\n"));
        assert!(text.contains("Line 1,5,3,Alice,"));
    }

    #[actix_web::test]
    async fn test_export_json_ascending_order() {
        let state = init_state().await;
        let app = init_app!(state);

        for line in ["Line 1", "Line 2"] {
            let request = test::TestRequest::post().uri("/api/records").set_json(json!({"line": line, "shiftLeader": "Alice", "rippon": 1})).to_request();
            let response = test::call_service(&app, request).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let request = test::TestRequest::get().uri("/export/json").to_request();
        let records: Vec<Value> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["line"], "Line 1");
        assert_eq!(records[1]["line"], "Line 2");
        assert!(records[0]["id"].as_i64().unwrap() < records[1]["id"].as_i64().unwrap());
    }

    #[actix_web::test]
    async fn test_get_trace_id_exists() {
        let request = test::TestRequest::default().insert_header(("X-Trace-ID", "test")).to_http_request();
        let trace_id = get_trace_id(&request);
        assert_eq!(trace_id, "test");
    }

    #[actix_web::test]
    async fn test_get_trace_id_not_exists() {
        let request = test::TestRequest::default().to_http_request();
        let trace_id = get_trace_id(&request);
        assert!(!trace_id.is_empty());
    }
}
