//! Declared result shapes.
//!
//! A [`Selection`] lists the fields a query needs. It drives both
//! normalization of a network result and reading a result back from the
//! store, so a cached read and a fetched result agree on field storage keys.

use serde_json::Value;
use std::collections::BTreeMap;

/// Query variables by name.
pub type Variables = BTreeMap<String, Value>;

/// An argument passed to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A literal value.
    Literal(Value),
    /// The value of a query variable.
    Variable(String),
}

/// One selected field.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionField {
    pub name: String,
    pub alias: Option<String>,
    pub args: BTreeMap<String, ArgValue>,
    pub selection: Option<Selection>,
}

impl SelectionField {
    /// A leaf field without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            args: BTreeMap::new(),
            selection: None,
        }
    }

    /// Sets the response alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds an argument.
    pub fn arg(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    /// Sets the sub-selection.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Key under which the field appears in a result.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Key under which the field is stored in a record.
    ///
    /// `name` without arguments, otherwise `name({...})` with arguments in
    /// name order. Arguments bound to absent variables are omitted.
    pub fn storage_key(&self, variables: &Variables) -> String {
        let resolved: serde_json::Map<String, Value> = self
            .args
            .iter()
            .filter_map(|(name, arg)| {
                let value = match arg {
                    ArgValue::Literal(v) => Some(v.clone()),
                    ArgValue::Variable(var) => variables.get(var).cloned(),
                };
                value.map(|v| (name.clone(), v))
            })
            .collect();

        if resolved.is_empty() {
            self.name.clone()
        } else {
            format!("{}({})", self.name, Value::Object(resolved))
        }
    }
}

/// Ordered list of selected fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    fields: Vec<SelectionField>,
}

impl Selection {
    /// Empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a leaf field.
    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.field(SelectionField::new(name))
    }

    /// Adds a field with a sub-selection.
    pub fn object(self, name: impl Into<String>, selection: Selection) -> Self {
        self.field(SelectionField::new(name).with_selection(selection))
    }

    /// Adds a fully specified field.
    pub fn field(mut self, field: SelectionField) -> Self {
        self.fields.push(field);
        self
    }

    /// Selected fields in declaration order.
    pub fn fields(&self) -> &[SelectionField] {
        &self.fields
    }

    /// Finds the field that produces `response_key`.
    pub fn find(&self, response_key: &str) -> Option<&SelectionField> {
        self.fields.iter().find(|f| f.response_key() == response_key)
    }
}
