//! Wire types of the cloud document API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use duofolio_core::sync::RemoteDocument;

#[derive(Debug, Clone, Deserialize)]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<RemoteDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddDocumentRequest<'a> {
    pub partition: &'a str,
    pub data: &'a Map<String, Value>,
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    pub code: String,
    pub message: String,
}
