use super::repr::quote;
use crate::schema::SchemaMapping;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field selection of a semantic request
///
/// The shape picks the clause: a single field renders "the field is ...", a list renders
/// "the fields are [...]" in the given order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fields {
    Single(String),
    Many(Vec<String>),
}

impl Fields {
    pub fn single(field: impl Into<String>) -> Self {
        Fields::Single(field.into())
    }

    pub fn many<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fields::Many(fields.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Fields {
    fn from(field: &str) -> Self {
        Fields::single(field)
    }
}

impl From<String> for Fields {
    fn from(field: String) -> Self {
        Fields::Single(field)
    }
}

impl From<Vec<String>> for Fields {
    fn from(fields: Vec<String>) -> Self {
        Fields::Many(fields)
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fields::Single(field) => write!(f, "{}", field),
            Fields::Many(fields) => {
                let quoted: Vec<String> = fields.iter().map(|s| quote(s)).collect();
                write!(f, "[{}]", quoted.join(", "))
            }
        }
    }
}

/// Database parameters of a semantic request
///
/// `database_name` and `table_name` are optional at construction so that their absence
/// surfaces as a validation failure when the prompt is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,
    /// Additional named values offered to the template, text or list of text
    #[serde(flatten)]
    pub extra: BTreeMap<String, Fields>,
}

impl DbParams {
    pub fn new(database_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            database_name: Some(database_name.into()),
            table_name: Some(table_name.into()),
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Fields>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Names of the parameters that are present
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        if self.database_name.is_some() {
            keys.push("database_name");
        }
        if self.table_name.is_some() {
            keys.push("table_name");
        }
        if self.fields.is_some() {
            keys.push("fields");
        }
        keys.extend(self.extra.keys().map(String::as_str));
        keys
    }
}

/// Semantic request for a query in some dialect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
    pub query_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programming_language: Option<String>,
    #[serde(default)]
    pub db_params: DbParams,
}

impl QueryRequest {
    pub fn new(prompt: impl Into<String>, query_type: impl Into<String>, db_params: DbParams) -> Self {
        Self {
            prompt: prompt.into(),
            query_type: query_type.into(),
            programming_language: None,
            db_params,
        }
    }

    pub fn with_programming_language(mut self, language: impl Into<String>) -> Self {
        self.programming_language = Some(language.into());
        self
    }
}

/// Semantic request that also carries the introspected database schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexQueryRequest {
    #[serde(flatten)]
    pub query: QueryRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_mapping: Option<SchemaMapping>,
}

impl ComplexQueryRequest {
    pub fn new(query: QueryRequest, schema_mapping: SchemaMapping) -> Self {
        Self {
            query,
            schema_mapping: Some(schema_mapping),
        }
    }
}

/// Request to narrate a result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationRequest {
    pub prompt: String,
    pub data: String,
    pub original_prompt: String,
}

impl NarrationRequest {
    pub fn new(
        prompt: impl Into<String>,
        data: impl Into<String>,
        original_prompt: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            data: data.into(),
            original_prompt: original_prompt.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_display() {
        assert_eq!(Fields::single("product_name").to_string(), "product_name");
        assert_eq!(
            Fields::many(["product_name", "product_description"]).to_string(),
            "['product_name', 'product_description']"
        );
        assert_eq!(Fields::Many(vec![]).to_string(), "[]");
    }

    #[test]
    fn test_fields_deserialize_by_shape() {
        let single: Fields = serde_json::from_str(r#""product_name""#).unwrap();
        assert_eq!(single, Fields::single("product_name"));

        let many: Fields = serde_json::from_str(r#"["b", "a"]"#).unwrap();
        assert_eq!(many, Fields::many(["b", "a"]));
    }

    #[test]
    fn test_db_params_from_json() {
        let params: DbParams = serde_json::from_str(
            r#"{"database_name": "postgres", "fields": ["category_name"], "schema": "public"}"#,
        )
        .unwrap();

        assert_eq!(params.database_name.as_deref(), Some("postgres"));
        assert!(params.table_name.is_none());
        assert_eq!(params.fields, Some(Fields::many(["category_name"])));
        assert_eq!(params.extra.get("schema"), Some(&Fields::single("public")));
        assert_eq!(params.keys(), vec!["database_name", "fields", "schema"]);
    }

    #[test]
    fn test_db_params_list_valued_extra() {
        let params: DbParams = serde_json::from_str(
            r#"{"database_name":"postgres","table_name":"products","fields":["product_name"],"columns":["a","b"]}"#,
        )
        .unwrap();

        let columns = params.extra.get("columns").unwrap();
        assert_eq!(columns, &Fields::many(["a", "b"]));
        assert_eq!(columns.to_string(), "['a', 'b']");
        assert_eq!(params.fields, Some(Fields::many(["product_name"])));
    }

    #[test]
    fn test_query_request_from_json() {
        let request: QueryRequest = serde_json::from_str(
            r#"{
                "prompt": "list products",
                "query_type": "Postgres",
                "db_params": {"database_name": "postgres", "table_name": "products", "fields": "product_name"}
            }"#,
        )
        .unwrap();

        assert_eq!(request.query_type, "Postgres");
        assert!(request.programming_language.is_none());
        assert_eq!(request.db_params.fields, Some(Fields::single("product_name")));
    }
}
