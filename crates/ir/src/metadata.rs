// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Shared scalar data types
//!
//! [`DataType`] is the one piece of "catalog metadata" the SQL IR itself
//! needs: dialect quoting (see [`crate::dialect::QuoteStyle::quote_value`])
//! has to know whether a value is numeric or textual. Table/column/star
//! metadata lives in `rolap-schema`, which depends on this crate rather
//! than the other way around.

use serde::{Deserialize, Serialize};

/// SQL data types, unified across dialects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DataType {
    Integer,
    BigInt,
    SmallInt,
    TinyInt,
    Decimal,
    Float,
    Double,

    Varchar(Option<usize>),
    Char(Option<usize>),
    Text,

    Date,
    Time,
    DateTime,
    Timestamp,

    Boolean,

    /// Unknown/engine-specific type, carrying the original type name.
    Other(String),
}

impl DataType {
    /// Whether literal values of this type render unquoted in SQL text.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Integer
                | DataType::BigInt
                | DataType::SmallInt
                | DataType::TinyInt
                | DataType::Decimal
                | DataType::Float
                | DataType::Double
        )
    }
}
