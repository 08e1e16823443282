//! Values tagged with a declared SQL type.

use crate::data_type::DataType;
use crate::value::SqlValue;

/// A value paired with the SQL type it should be declared as.
///
/// Request parameters are passed as `TypedValue`s so the session client can
/// declare them with the right length, precision and scale. One constructor
/// exists per type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    /// The value.
    pub value: SqlValue,
    /// The declared type.
    pub data_type: DataType,
}

macro_rules! plain {
    ($($(#[$doc:meta])* $name:ident => $tag:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(value: impl Into<SqlValue>) -> Self {
                Self::new(DataType::$tag, value)
            }
        )*
    };
}

macro_rules! sized {
    ($($(#[$doc:meta])* $name:ident => $tag:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(length: u16, value: impl Into<SqlValue>) -> Self {
                Self::new(DataType::$tag { length }, value)
            }
        )*
    };
}

macro_rules! scaled {
    ($($(#[$doc:meta])* $name:ident => $tag:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(scale: u8, value: impl Into<SqlValue>) -> Self {
                Self::new(DataType::$tag { scale }, value)
            }
        )*
    };
}

impl TypedValue {
    /// Tag a value with an explicit type.
    pub fn new(data_type: DataType, value: impl Into<SqlValue>) -> Self {
        Self {
            value: value.into(),
            data_type,
        }
    }

    plain! {
        /// BIT.
        bit => Bit,
        /// TINYINT.
        tiny_int => TinyInt,
        /// SMALLINT.
        small_int => SmallInt,
        /// INT.
        int => Int,
        /// BIGINT.
        big_int => BigInt,
        /// SMALLMONEY.
        small_money => SmallMoney,
        /// MONEY.
        money => Money,
        /// FLOAT.
        float => Float,
        /// REAL.
        real => Real,
        /// DATE.
        date => Date,
        /// SMALLDATETIME.
        small_date_time => SmallDateTime,
        /// DATETIME.
        date_time => DateTime,
        /// TEXT.
        text => Text,
        /// NTEXT.
        ntext => NText,
        /// IMAGE.
        image => Image,
        /// Untyped NULL.
        null => Null,
        /// Table-valued parameter.
        tvp => Tvp,
        /// User-defined type.
        udt => Udt,
        /// UNIQUEIDENTIFIER.
        unique_identifier => UniqueIdentifier,
        /// XML.
        xml => Xml,
    }

    sized! {
        /// CHAR(length).
        char => Char,
        /// VARCHAR(length).
        varchar => VarChar,
        /// NCHAR(length).
        nchar => NChar,
        /// NVARCHAR(length).
        nvarchar => NVarChar,
        /// BINARY(length).
        binary => Binary,
        /// VARBINARY(length).
        varbinary => VarBinary,
    }

    scaled! {
        /// DATETIME2(scale).
        date_time2 => DateTime2,
        /// DATETIMEOFFSET(scale).
        date_time_offset => DateTimeOffset,
        /// TIME(scale).
        time => Time,
    }

    /// NUMERIC(precision, scale).
    pub fn numeric(precision: u8, scale: u8, value: impl Into<SqlValue>) -> Self {
        Self::new(DataType::Numeric { precision, scale }, value)
    }

    /// DECIMAL(precision, scale).
    pub fn decimal(precision: u8, scale: u8, value: impl Into<SqlValue>) -> Self {
        Self::new(DataType::Decimal { precision, scale }, value)
    }
}
