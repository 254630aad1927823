//! # Documents
//!
//! Store-agnostic document values, field updates, filters and batched writes.
//! Adapters share the pure helpers here so every backend applies updates and
//! evaluates filters identically.

use crate::error::{StoreError, StoreResult};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A schemaless record body, keyed by field name.
pub type Document = Map<String, Value>;

/// A single field mutation inside `update_fields`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Replace the field with a literal value.
    Set(Value),
    /// Append the value to an array field unless already present.
    AddToSet(Value),
    /// Remove every occurrence of the value from an array field.
    RemoveFromSet(Value),
}

pub type FieldUpdates = Vec<(String, FieldUpdate)>;

/// Query predicate on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// Field value is one of the listed values.
    In(String, Vec<Value>),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
}

impl Filter {
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(f, _)
            | Filter::In(f, _)
            | Filter::Gt(f, _)
            | Filter::Gte(f, _)
            | Filter::Lt(f, _)
            | Filter::Lte(f, _) => f,
        }
    }

    /// Evaluates the predicate. A missing field never matches.
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(self.field()) else {
            return false;
        };
        match self {
            Filter::Eq(_, v) => compare(actual, v) == Some(Ordering::Equal),
            Filter::In(_, vs) => vs.iter().any(|v| compare(actual, v) == Some(Ordering::Equal)),
            Filter::Gt(_, v) => compare(actual, v) == Some(Ordering::Greater),
            Filter::Gte(_, v) => matches!(
                compare(actual, v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(_, v) => compare(actual, v) == Some(Ordering::Less),
            Filter::Lte(_, v) => matches!(compare(actual, v), Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

/// Orders two scalar JSON values of the same kind. Mixed kinds are unordered.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// One write inside an atomic `commit_batch`.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create-if-absent. Fails the batch when the record exists.
    Create {
        collection: String,
        id: String,
        fields: Document,
    },
    /// Overwrite, or merge top-level fields into, a record.
    Set {
        collection: String,
        id: String,
        fields: Document,
        merge: bool,
    },
    /// Field-level updates. Fails the batch when the record is missing.
    Update {
        collection: String,
        id: String,
        updates: FieldUpdates,
    },
}

impl WriteOp {
    pub fn create(collection: &str, id: &str, fields: Document) -> Self {
        WriteOp::Create {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        }
    }

    pub fn set(collection: &str, id: &str, fields: Document, merge: bool) -> Self {
        WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
            merge,
        }
    }

    pub fn update(collection: &str, id: &str, updates: FieldUpdates) -> Self {
        WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            updates,
        }
    }

    pub fn target(&self) -> (&str, &str) {
        match self {
            WriteOp::Create { collection, id, .. }
            | WriteOp::Set { collection, id, .. }
            | WriteOp::Update { collection, id, .. } => (collection, id),
        }
    }
}

/// Applies field updates in order. `AddToSet`/`RemoveFromSet` coerce non-array fields to arrays.
pub fn apply_updates(doc: &mut Document, updates: &[(String, FieldUpdate)]) {
    for (field, update) in updates {
        match update {
            FieldUpdate::Set(value) => {
                doc.insert(field.clone(), value.clone());
            }
            FieldUpdate::AddToSet(value) => {
                let mut items = take_array(doc, field);
                if !items.contains(value) {
                    items.push(value.clone());
                }
                doc.insert(field.clone(), Value::Array(items));
            }
            FieldUpdate::RemoveFromSet(value) => {
                let mut items = take_array(doc, field);
                items.retain(|v| v != value);
                doc.insert(field.clone(), Value::Array(items));
            }
        }
    }
}

fn take_array(doc: &mut Document, field: &str) -> Vec<Value> {
    match doc.remove(field) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Computes a record body after `op`, given the body currently stored (if any).
pub fn apply_write(current: Option<Document>, op: WriteOp) -> StoreResult<Document> {
    match op {
        WriteOp::Create {
            collection,
            id,
            fields,
        } => match current {
            Some(_) => Err(StoreError::AlreadyExists { collection, id }),
            None => Ok(fields),
        },
        WriteOp::Set { fields, merge, .. } => match current {
            Some(mut existing) if merge => {
                merge_fields(&mut existing, fields);
                Ok(existing)
            }
            _ => Ok(fields),
        },
        WriteOp::Update {
            collection,
            id,
            updates,
        } => match current {
            Some(mut doc) => {
                apply_updates(&mut doc, &updates);
                Ok(doc)
            }
            None => Err(StoreError::Missing { collection, id }),
        },
    }
}

/// Merges top-level fields of `incoming` into `existing`.
pub fn merge_fields(existing: &mut Document, incoming: Document) {
    for (k, v) in incoming {
        existing.insert(k, v);
    }
}
