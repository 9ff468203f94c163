//! Explicitly bound parameters.

use crate::error::QueryResult;
use crate::value::{ParamType, Value};

/// A named parameter and its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct BindEntry {
    pub name: String,
    pub value: Value,
    pub ty: ParamType,
}

impl BindEntry {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            ty: value.param_type(),
            value,
        }
    }

    /// Create an entry, coercing the value to `ty`.
    pub fn typed(name: impl Into<String>, value: impl Into<Value>, ty: ParamType) -> QueryResult<Self> {
        Ok(Self {
            name: name.into(),
            value: value.into().coerce(ty)?,
            ty,
        })
    }
}

/// Binds registered on one query. Auto-generated names are `Bind_<n>` with
/// `n` counting up for the lifetime of the table.
///
/// Explicit names that collide with generated ones overwrite them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindTable {
    entries: Vec<BindEntry>,
    counter: usize,
}

impl BindTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value under a generated name and return that name.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        let name = self.next_name();
        self.insert(BindEntry::new(name.clone(), value));
        name
    }

    /// Bind (or rebind) a value under an explicit name.
    pub fn insert(&mut self, entry: BindEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&BindEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of names generated so far. Render-time names continue from here.
    pub fn counter(&self) -> usize {
        self.counter
    }

    fn next_name(&mut self) -> String {
        self.counter += 1;
        format!("Bind_{}", self.counter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BindEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.counter = 0;
    }
}
