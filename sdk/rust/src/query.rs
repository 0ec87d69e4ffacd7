//! Query-string encoding for list, search and export requests.
//!
//! Paged list requests follow the backend's `partialList` convention:
//! `page`, `size`, then `orderBy`/`directive` when a sort is active, then one
//! parameter per column filter keyed by the filter id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded;

use crate::ResourceId;

/// Parameters owned by the paging protocol. Column filters may not shadow them.
pub const RESERVED_KEYS: [&str; 4] = ["page", "size", "orderBy", "directive"];

/// A single sort instruction (table column id + direction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub id: String,
    #[serde(default)]
    pub desc: bool,
}

impl SortSpec {
    pub fn asc(id: impl Into<String>) -> Self {
        Self { id: id.into(), desc: false }
    }

    pub fn desc(id: impl Into<String>) -> Self {
        Self { id: id.into(), desc: true }
    }

    fn directive(&self) -> &'static str {
        if self.desc {
            "desc"
        } else {
            "asc"
        }
    }
}

/// A column filter as produced by a data table (`id` → arbitrary value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub id: String,
    pub value: Value,
}

impl ColumnFilter {
    pub fn new(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// Paging, sorting and filtering state of a list screen.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page_index: u32,
    pub page_size: u32,
    #[serde(default)]
    pub sorting: Vec<SortSpec>,
    #[serde(default)]
    pub column_filters: Vec<ColumnFilter>,
}

impl ListQuery {
    pub fn new(page_index: u32, page_size: u32) -> Self {
        Self {
            page_index,
            page_size,
            ..Self::default()
        }
    }

    pub fn sort_by(mut self, sort: SortSpec) -> Self {
        self.sorting.push(sort);
        self
    }

    pub fn filter(mut self, id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.column_filters.push(ColumnFilter::new(id, value));
        self
    }

    /// Ordered key/value pairs for the `partialList` request.
    ///
    /// Only the first sort entry is sent. A later filter with the same id
    /// replaces an earlier one.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page_index.to_string()),
            ("size".to_string(), self.page_size.to_string()),
        ];

        if let Some(sort) = self.sorting.first().filter(|s| !s.id.is_empty()) {
            pairs.push(("orderBy".to_string(), sort.id.clone()));
            pairs.push(("directive".to_string(), sort.directive().to_string()));
        }

        for filter in &self.column_filters {
            if RESERVED_KEYS.contains(&filter.id.as_str()) {
                tracing::warn!(filter = %filter.id, "Dropping column filter that shadows a paging parameter");
                continue;
            }
            let value = filter_value(&filter.value);
            match pairs.iter_mut().find(|(key, _)| *key == filter.id) {
                Some(existing) => existing.1 = value,
                None => pairs.push((filter.id.clone(), value)),
            }
        }

        pairs
    }

    pub fn to_query_string(&self) -> String {
        encode_pairs(self.to_pairs())
    }
}

/// Stringify a filter value the way a browser form would.
///
/// Strings are sent verbatim, arrays are joined with `,`, everything else uses
/// its JSON text (`true`, `42`, `null`).
pub fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(filter_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// URL-encode key/value pairs (`application/x-www-form-urlencoded`).
pub fn encode_pairs<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Query for `export`: `type`, `scope`, then one `ids` entry per id.
pub fn export_query(kind: &str, scope: &str, ids: &[ResourceId]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.append_pair("type", kind).append_pair("scope", scope);
    for id in ids {
        serializer.append_pair("ids", &id.to_string());
    }
    serializer.finish()
}

/// Query for `findBy`, stringifying every value.
pub fn params_query<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: ToString,
{
    encode_pairs(
        params
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_string(), value.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paged_query_with_sort_and_filter() {
        let query = ListQuery::new(2, 10)
            .sort_by(SortSpec::desc("name"))
            .filter("category", "Java");

        assert_eq!(
            query.to_query_string(),
            "page=2&size=10&orderBy=name&directive=desc&category=Java"
        );
    }

    #[test]
    fn test_no_sort_omits_order_and_directive() {
        let query = ListQuery::new(0, 25);
        assert_eq!(query.to_query_string(), "page=0&size=25");

        let blank_sort = ListQuery::new(0, 25).sort_by(SortSpec::asc(""));
        assert_eq!(blank_sort.to_query_string(), "page=0&size=25");
    }

    #[test]
    fn test_ascending_sort_uses_first_entry_only() {
        let query = ListQuery::new(1, 5)
            .sort_by(SortSpec::asc("createdAt"))
            .sort_by(SortSpec::desc("title"));
        assert_eq!(
            query.to_query_string(),
            "page=1&size=5&orderBy=createdAt&directive=asc"
        );
    }

    #[test]
    fn test_filter_values_are_stringified() {
        let query = ListQuery::new(0, 10)
            .filter("featured", true)
            .filter("tags", json!(["rust", "axum"]))
            .filter("title", "hello world");
        assert_eq!(
            query.to_query_string(),
            "page=0&size=10&featured=true&tags=rust%2Caxum&title=hello+world"
        );
    }

    #[test]
    fn test_reserved_filter_ids_are_dropped_and_duplicates_replaced() {
        let query = ListQuery::new(3, 10)
            .filter("page", 99)
            .filter("status", "draft")
            .filter("status", "published");
        assert_eq!(query.to_query_string(), "page=3&size=10&status=published");
    }

    #[test]
    fn test_list_query_deserializes_table_state() {
        let query: ListQuery = serde_json::from_value(json!({
            "pageIndex": 2,
            "pageSize": 10,
            "sorting": [{"id": "name", "desc": true}],
            "columnFilters": [{"id": "category", "value": "Java"}]
        }))
        .unwrap();
        assert_eq!(
            query.to_query_string(),
            "page=2&size=10&orderBy=name&directive=desc&category=Java"
        );
    }

    #[test]
    fn test_export_query_repeats_ids() {
        assert_eq!(
            export_query("pdf", "selected", &[1, 2, 3]),
            "type=pdf&scope=selected&ids=1&ids=2&ids=3"
        );
        assert_eq!(export_query("csv", "all", &[]), "type=csv&scope=all");
    }

    #[test]
    fn test_params_query() {
        let query = params_query([("email", "a@b.io".to_string()), ("active", true.to_string())]);
        assert_eq!(query, "email=a%40b.io&active=true");
    }
}
