// Attribute Types
//
// This module defines the type tags carried by values and columns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type tag for a value or a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrType {
    Ints,
    Floats,
    Chars,
    Dates,
    Booleans,
    Null,
}

impl AttrType {
    /// Parse a SQL type name into an AttrType
    pub fn from_sql_name(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INT" | "INTEGER" => Some(AttrType::Ints),
            "FLOAT" | "REAL" | "DOUBLE" => Some(AttrType::Floats),
            "CHAR" | "CHARS" | "TEXT" | "VARCHAR" => Some(AttrType::Chars),
            "DATE" => Some(AttrType::Dates),
            "BOOL" | "BOOLEAN" => Some(AttrType::Booleans),
            _ => None,
        }
    }

    /// Whether arithmetic is defined for this type
    pub fn is_numeric(&self) -> bool {
        matches!(self, AttrType::Ints | AttrType::Floats)
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrType::Ints => "INT",
            AttrType::Floats => "FLOAT",
            AttrType::Chars => "CHARS",
            AttrType::Dates => "DATE",
            AttrType::Booleans => "BOOLEAN",
            AttrType::Null => "NULL",
        };
        write!(f, "{}", name)
    }
}
