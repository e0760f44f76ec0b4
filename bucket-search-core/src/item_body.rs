//! # item_body: nested JSON builder for Cloud Search item payloads
//!
//! [`ItemBody`] addresses fields of a JSON tree with `/`-separated paths, so
//! `item/metadata/title` reaches `{"item": {"metadata": {"title": ...}}}`.
//!
//! Writes create every missing intermediate mapping. Reads come in two
//! flavours:
//! - [`ItemBody::try_get`] never touches the tree.
//! - [`ItemBody::get`] keeps the legacy behaviour of materialising the path as
//!   empty mappings while walking it, and returns `{}` for missing leaves.
//!
//! Paths are split on `/` without further validation: `a//b` addresses the
//! empty-string key between `a` and `b`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, PartialEq)]
pub struct ItemBody {
    body: Value,
}

impl Default for ItemBody {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemBody {
    pub fn new() -> Self {
        Self {
            body: empty_object(),
        }
    }

    /// Wraps an existing document, typically the item template.
    ///
    /// The root must be a JSON object.
    pub fn from_template(template: Value) -> Result<Self> {
        if !template.is_object() {
            return Err(SyncError::Config(
                "item template must be a JSON object".to_string(),
            ));
        }
        Ok(Self { body: template })
    }

    /// Assigns `value` at `path`, creating intermediate mappings.
    ///
    /// An intermediate segment that currently holds a non-object value is
    /// replaced by an empty mapping.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let mut tokens: Vec<&str> = path.split('/').collect();
        // split always yields at least one token
        let last = tokens.pop().unwrap_or_default();
        let mut el = &mut self.body;
        for key in tokens {
            el = as_object_mut(el)
                .entry(key.to_owned())
                .or_insert_with(empty_object);
        }
        as_object_mut(el).insert(last.to_owned(), value.into());
    }

    /// Byte strings are stored as UTF-8 text.
    pub fn set_bytes(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SyncError::Encoding(format!("value for {path} is not UTF-8: {e}")))?;
        self.set(path, text);
        Ok(())
    }

    /// Converts any serde-serialisable value before assigning it.
    pub fn set_serializable<T: Serialize + ?Sized>(&mut self, path: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| SyncError::Encoding(format!("value for {path}: {e}")))?;
        self.set(path, value);
        Ok(())
    }

    /// Legacy read: materialises missing segments as `{}` and returns the leaf.
    pub fn get(&mut self, path: &str) -> &Value {
        self.get_or_create(path)
    }

    pub fn get_or_create(&mut self, path: &str) -> &mut Value {
        let mut el = &mut self.body;
        for key in path.split('/') {
            el = as_object_mut(el)
                .entry(key.to_owned())
                .or_insert_with(empty_object);
        }
        el
    }

    pub fn try_get(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .try_fold(&self.body, |el, key| el.as_object()?.get(key))
    }

    /// Compact JSON text of the whole tree.
    pub fn as_string(&self) -> Result<String> {
        serde_json::to_string(&self.body).map_err(|e| SyncError::Encoding(e.to_string()))
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn as_object_mut(el: &mut Value) -> &mut Map<String, Value> {
    if !el.is_object() {
        *el = empty_object();
    }
    match el {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}
