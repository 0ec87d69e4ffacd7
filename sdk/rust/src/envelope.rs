//! Response envelopes shared by every backend resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success envelope: `{ "data": T, ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<T> ResponseData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
            status: None,
            timestamp: None,
        }
    }

    /// Transform the payload while keeping the envelope metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseData<U> {
        ResponseData {
            data: f(self.data),
            message: self.message,
            status: self.status,
            timestamp: self.timestamp,
        }
    }
}

/// Envelope for operations whose payload is irrelevant (delete, bulk updates).
/// A missing or `null` `data` field decodes as `None`.
pub type Acknowledged = ResponseData<Option<Value>>;

/// One page of a paged collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    /// Zero-based page index.
    #[serde(default, alias = "page")]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

impl<T> PagedResponse<T> {
    /// Wrap a complete collection as the only page.
    pub fn single_page(content: Vec<T>) -> Self {
        let len = content.len();
        Self {
            total_elements: len as u64,
            total_pages: u32::from(len > 0),
            number: 0,
            size: len as u32,
            content,
        }
    }
}

/// Structured error body returned by the backend on failure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_errors: Option<Vec<String>>,
}
