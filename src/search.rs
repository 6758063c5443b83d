//! Search Index Commands
//!
//! Stateless builders for the store's full-text index command set and a
//! parser for its search replies. Nothing here talks to a store.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{CoordError, Result, StoreError};
use crate::store::Reply;

// == Schema ==
/// Indexed field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Numeric,
    Geo,
    Tag,
}

impl FieldType {
    fn keyword(self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Numeric => "NUMERIC",
            FieldType::Geo => "GEO",
            FieldType::Tag => "TAG",
        }
    }
}

/// Type and options of one indexed field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub sortable: bool,
    pub no_stem: bool,
    pub no_index: bool,
    pub weight: Option<f64>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            sortable: false,
            no_stem: false,
            no_index: false,
            weight: None,
        }
    }

    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn no_stem(mut self) -> Self {
        self.no_stem = true;
        self
    }

    pub fn no_index(mut self) -> Self {
        self.no_index = true;
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Ordered set of indexed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSchema {
    fields: Vec<(String, FieldSpec)>,
}

impl IndexSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing an earlier one with the same name.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        self.fields.retain(|(existing, _)| *existing != name);
        self.fields.push((name, spec));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `SCHEMA name TYPE [NOSTEM] [WEIGHT w] [SORTABLE] [NOINDEX] ...`
    pub fn schema_args(&self) -> Vec<String> {
        let mut args = vec!["SCHEMA".to_string()];
        for (name, spec) in &self.fields {
            args.push(name.clone());
            args.push(spec.field_type.keyword().to_string());
            if spec.no_stem {
                args.push("NOSTEM".to_string());
            }
            if let Some(weight) = spec.weight {
                args.push("WEIGHT".to_string());
                args.push(weight.to_string());
            }
            if spec.sortable {
                args.push("SORTABLE".to_string());
            }
            if spec.no_index {
                args.push("NOINDEX".to_string());
            }
        }
        args
    }
}

// == Commands ==
fn validate_index(index: &str) -> Result<()> {
    if index.is_empty() {
        return Err(CoordError::validation("index must be a string with length"));
    }
    Ok(())
}

/// Arguments to create `index` with `schema`.
pub fn create_index_args(index: &str, schema: &IndexSchema) -> Result<Vec<String>> {
    validate_index(index)?;
    if schema.is_empty() {
        return Err(CoordError::validation("schema must have at least one field"));
    }
    let mut args = vec!["FT.CREATE".to_string(), index.to_string()];
    args.extend(schema.schema_args());
    Ok(args)
}

/// Arguments to look up index metadata; an error reply means it is absent.
pub fn index_info_args(index: &str) -> Result<Vec<String>> {
    validate_index(index)?;
    Ok(vec!["FT.INFO".to_string(), index.to_string()])
}

/// Arguments to add or replace a document. Fields outside the schema are
/// dropped.
pub fn add_document_args<'a, I>(
    index: &str,
    doc_id: &str,
    schema: &IndexSchema,
    fields: I,
) -> Result<Vec<String>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    validate_index(index)?;
    if doc_id.is_empty() {
        return Err(CoordError::validation("document id must be a string with length"));
    }

    let mut args = vec![
        "FT.ADD".to_string(),
        index.to_string(),
        doc_id.to_string(),
        "1.0".to_string(),
        "REPLACE".to_string(),
        "FIELDS".to_string(),
    ];
    for (name, value) in fields {
        if schema.contains(name) {
            args.push(name.to_string());
            args.push(value.to_string());
        }
    }
    Ok(args)
}

/// Arguments to remove a document from `index`.
pub fn remove_document_args(index: &str, doc_id: &str) -> Result<Vec<String>> {
    validate_index(index)?;
    if doc_id.is_empty() {
        return Err(CoordError::validation("document id must be a string with length"));
    }
    Ok(vec!["FT.DEL".to_string(), index.to_string(), doc_id.to_string()])
}

// == Search ==
/// Paging for a search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub offset: usize,
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
        }
    }
}

/// Ids of matching documents and the total hit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    pub total: u64,
    pub page: usize,
    pub ids: Vec<String>,
}

/// Arguments for an id-only search.
pub fn search_args(index: &str, query: &str, options: SearchOptions) -> Result<Vec<String>> {
    validate_index(index)?;
    if options.limit == 0 {
        return Err(CoordError::validation("limit must be greater than 0"));
    }
    Ok(vec![
        "FT.SEARCH".to_string(),
        index.to_string(),
        query.to_string(),
        "NOCONTENT".to_string(),
        "LIMIT".to_string(),
        options.offset.to_string(),
        options.limit.to_string(),
    ])
}

/// Parses an id-only search reply: `[total, id, id, ...]`.
pub fn parse_search_reply(reply: &[Reply], options: SearchOptions) -> Result<SearchResults> {
    let (first, rest) = reply
        .split_first()
        .ok_or_else(|| StoreError::Protocol("empty search reply".to_string()))?;
    let total = first
        .as_int()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| StoreError::Protocol(format!("bad search total {first:?}")))?;

    let ids = rest
        .iter()
        .map(|item| match item {
            Reply::Bulk(id) => Ok(id.clone()),
            other => Err(StoreError::Protocol(format!("bad document id {other:?}"))),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(SearchResults {
        total,
        page: options.offset / options.limit.max(1),
        ids,
    })
}

/// Folds a flat `[k1, v1, k2, v2, ...]` reply into a map.
pub fn pairs_to_map(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    if pairs.len() % 2 != 0 {
        return Err(CoordError::validation("pairs must have an even length"));
    }
    Ok(pairs
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}
