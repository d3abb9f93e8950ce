// Column Metadata
//
// This module defines the column metadata stored in the catalog.

use serde::{Deserialize, Serialize};

use crate::common::types::AttrType;

/// Metadata for one column of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    name: String,
    /// Column value type
    attr_type: AttrType,
    /// Whether this column can hold NULL
    nullable: bool,
    /// System columns are invisible to wildcard expansion
    system: bool,
}

impl Column {
    /// Create a new user-visible column
    pub fn new(name: impl Into<String>, attr_type: AttrType, nullable: bool) -> Self {
        Column {
            name: name.into(),
            attr_type,
            nullable,
            system: false,
        }
    }

    /// Create a system column (hidden from `*` expansion)
    pub fn system(name: impl Into<String>, attr_type: AttrType) -> Self {
        Column {
            name: name.into(),
            attr_type,
            nullable: false,
            system: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_system(&self) -> bool {
        self.system
    }
}
