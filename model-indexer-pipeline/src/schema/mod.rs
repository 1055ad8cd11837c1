//! Schema resolver seam.
//!
//! Introspecting the data store is the host's job. The resolver only has to
//! list the columns of a record type; the descriptor builder turns them into
//! attribute fields.

use crate::record::RecordType;
use model_indexer_shared::SearchFieldType;

/// Column types reported by a schema resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Date,
    DateTime,
    Boolean,
    NullBoolean,
    Decimal,
    Float,
    SmallInteger,
    PositiveSmallInteger,
    Integer,
    PositiveInteger,
    Auto,
    BigInteger,
    GenericIpAddress,
    Char,
    Text,
    Other(String),
}

impl ColumnType {
    /// The search field type a column of this type is indexed as.
    pub fn search_type(&self) -> SearchFieldType {
        match self {
            Self::Date | Self::DateTime => SearchFieldType::Date,
            Self::Boolean | Self::NullBoolean => SearchFieldType::Boolean,
            Self::Decimal | Self::Float => SearchFieldType::Float,
            Self::SmallInteger | Self::PositiveSmallInteger => SearchFieldType::Short,
            Self::Integer | Self::PositiveInteger | Self::Auto => SearchFieldType::Integer,
            Self::BigInteger => SearchFieldType::Long,
            Self::GenericIpAddress => SearchFieldType::Ip,
            Self::Char | Self::Text | Self::Other(_) => SearchFieldType::Text,
        }
    }
}

/// One column of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    /// Foreign keys and other relations are never indexed implicitly.
    pub is_relation: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_relation: false,
        }
    }

    pub fn relation(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Other("relation".to_string()),
            is_relation: true,
        }
    }
}

/// Lists the columns of a record type, in declaration order.
pub trait SchemaResolver: Send + Sync {
    fn columns(&self, record_type: &RecordType) -> Vec<Column>;
}
