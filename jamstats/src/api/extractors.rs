use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::JamError;

/// `axum::Json` whose rejections answer in the v1 error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(JamError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for JamError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> JamError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            if let Some(field) = extract_missing_field(&message) {
                JamError::Validation(format!("Missing required field: {field}"))
            } else {
                JamError::Validation(format!("Invalid request body: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            JamError::Validation(format!("JSON syntax error: {err}"))
        }
        JsonRejection::MissingJsonContentType(_) => {
            JamError::Validation("Missing `Content-Type: application/json` header".to_string())
        }
        JsonRejection::BytesRejection(_) => {
            JamError::Internal("Failed to read request body".to_string())
        }
        _ => JamError::Validation(rejection.body_text()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}
