//! Table HTTP Routes
//!
//! One handler per gateway operation. Handlers only unpack the request and
//! shape the response; every decision lives in [`TableGateway`].

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;
use serde_json::Value;

use crate::libs::error::{GatewayError, GatewayResult};
use crate::libs::gateway::TableGateway;
use crate::libs::schema::{Record, TableColumns, TableData, TableSummary};

// ==================
// Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct InsertResponse {
    pub message: String,
    pub inserted_id: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub rows_affected: u64,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

// ==================
// Table Routes
// ==================

pub fn table_routes(gateway: Arc<TableGateway>) -> Router {
    Router::new()
        .route("/tables", get(list_tables_handler))
        .route("/table/:name", get(get_table_data_handler))
        .route("/table/:name/columns", get(get_columns_handler))
        .route("/table/:name/count", get(count_records_handler))
        .route("/table/:name/record/:id", get(get_record_handler))
        .route("/table/:name/update/:id", put(update_record_handler))
        .route("/insert/:name", post(insert_record_handler))
        .with_state(gateway)
}

/// Unpack a JSON body. A missing JSON content type is always a 400; a body
/// that does not parse is reported through `malformed`.
fn json_body(
    payload: Result<Json<Value>, JsonRejection>,
    malformed: fn(String) -> GatewayError,
) -> GatewayResult<Value> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Err(GatewayError::Validation(
            "Content-Type must be application/json".into(),
        )),
        Err(rejection @ (JsonRejection::JsonSyntaxError(_) | JsonRejection::JsonDataError(_))) => {
            Err(malformed(rejection.body_text()))
        }
        Err(rejection) => Err(GatewayError::Validation(rejection.body_text())),
    }
}

// ==================
// Handlers
// ==================

async fn list_tables_handler(
    State(gateway): State<Arc<TableGateway>>,
) -> GatewayResult<Json<Vec<TableSummary>>> {
    Ok(Json(gateway.list_tables().await?))
}

async fn get_columns_handler(
    State(gateway): State<Arc<TableGateway>>,
    Path(name): Path<String>,
) -> GatewayResult<Json<TableColumns>> {
    Ok(Json(gateway.get_columns(&name).await?))
}

async fn get_table_data_handler(
    State(gateway): State<Arc<TableGateway>>,
    Path(name): Path<String>,
) -> GatewayResult<Json<TableData>> {
    Ok(Json(gateway.get_table_data(&name).await?))
}

async fn get_record_handler(
    State(gateway): State<Arc<TableGateway>>,
    Path((name, id)): Path<(String, String)>,
) -> GatewayResult<Json<Record>> {
    Ok(Json(gateway.get_record(&name, &id).await?))
}

async fn insert_record_handler(
    State(gateway): State<Arc<TableGateway>>,
    Path(name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> GatewayResult<(StatusCode, Json<InsertResponse>)> {
    // an unparseable insert body is a server error, not a validation error
    let payload = json_body(payload, GatewayError::Server)?;
    let inserted_id = gateway.insert_record(&name, &payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(InsertResponse {
            message: "Data inserted successfully".to_string(),
            inserted_id,
        }),
    ))
}

async fn update_record_handler(
    State(gateway): State<Arc<TableGateway>>,
    Path((name, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> GatewayResult<Json<UpdateResponse>> {
    let payload = json_body(payload, GatewayError::Validation)?;
    let rows_affected = gateway.update_record(&name, &id, &payload).await?;
    Ok(Json(UpdateResponse {
        message: "Data updated successfully".to_string(),
        rows_affected,
    }))
}

async fn count_records_handler(
    State(gateway): State<Arc<TableGateway>>,
    Path(name): Path<String>,
) -> GatewayResult<Json<CountResponse>> {
    Ok(Json(CountResponse {
        count: gateway.count_records(&name).await?,
    }))
}
