//! JSON bodies of the content routes.

use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::application::error::ErrorReport;
use crate::domain::content::{ContentEntry, ContentFields};
use crate::domain::variant::VariantDecision;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

fn personalization(decision: &VariantDecision) -> (Value, Value) {
    (
        Value::Bool(decision.is_personalized()),
        decision
            .as_str()
            .map_or(Value::Null, |param| Value::String(param.to_string())),
    )
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// `{...fields, personalized, variantParam}`; the metadata wins over same-named fields.
pub(super) fn entry(mut fields: ContentFields, decision: &VariantDecision) -> Response {
    let (personalized, variant_param) = personalization(decision);
    fields.insert("personalized".to_string(), personalized);
    fields.insert("variantParam".to_string(), variant_param);
    (StatusCode::OK, Json(Value::Object(fields))).into_response()
}

pub(super) fn collection(
    entries: Vec<ContentEntry>,
    count: u64,
    decision: &VariantDecision,
) -> Response {
    let (personalized, variant_param) = personalization(decision);
    let entries: Vec<Value> = entries.into_iter().map(ContentEntry::into_value).collect();
    let body = json!({
        "entries": entries,
        "count": count,
        "personalized": personalized,
        "variantParam": variant_param,
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// No-data body reflecting the requested variant.
pub(super) fn no_data(status: StatusCode, message: &str, decision: &VariantDecision) -> Response {
    let (personalized, variant_param) = personalization(decision);
    no_data_body(status, message, personalized, variant_param)
}

/// No-data body for a recovered upstream failure; personalization is reported off.
pub(super) fn recovered(message: &str) -> Response {
    no_data_body(StatusCode::OK, message, Value::Bool(false), Value::Null)
}

fn no_data_body(
    status: StatusCode,
    message: &str,
    personalized: Value,
    variant_param: Value,
) -> Response {
    let mut body = Map::new();
    body.insert("message".to_string(), Value::String(message.to_string()));
    body.insert("personalized".to_string(), personalized);
    body.insert("variantParam".to_string(), variant_param);
    body.insert("timestamp".to_string(), Value::String(timestamp()));
    (status, Json(Value::Object(body))).into_response()
}

/// `500 {message, error, personalized:false, timestamp}` with the error chain attached for logging.
pub(super) fn failure(source: &'static str, message: &str, error: &dyn StdError) -> Response {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let body = json!({
        "message": message,
        "error": error.to_string(),
        "personalized": false,
        "timestamp": timestamp(),
    });
    let mut response = (status, Json(body)).into_response();
    ErrorReport::from_error(source, error).attach(&mut response);
    response
}

pub(super) fn unexpected(source: &'static str, error: &dyn StdError) -> Response {
    failure(source, INTERNAL_ERROR_MESSAGE, error)
}
