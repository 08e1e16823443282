//! SQL Server type tags.
//!
//! A [`DataType`] describes how a parameter or bulk-load column is declared
//! to the server: the base type plus its length, precision or scale. Tags
//! carry no behavior beyond describing themselves; the session client maps
//! them onto the wire.

use std::fmt;

use crate::error::TypeError;

/// Length sentinel meaning `(MAX)`.
pub const MAX_LENGTH: u16 = u16::MAX;

/// Broad family a [`DataType`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// BIT, integers, NUMERIC/DECIMAL, MONEY.
    ExactNumeric,
    /// FLOAT and REAL.
    ApproximateNumeric,
    /// Date and time types.
    DateTime,
    /// Single-byte character strings.
    Character,
    /// Unicode character strings.
    Unicode,
    /// Binary strings.
    Binary,
    /// NULL, TVP, UDT, UNIQUEIDENTIFIER, XML.
    Other,
}

/// A SQL Server type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DataType {
    /// BIT.
    Bit,
    /// TINYINT.
    TinyInt,
    /// SMALLINT.
    SmallInt,
    /// INT.
    Int,
    /// BIGINT.
    BigInt,
    /// NUMERIC with precision and scale.
    Numeric {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// DECIMAL with precision and scale.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// SMALLMONEY.
    SmallMoney,
    /// MONEY.
    Money,
    /// FLOAT.
    Float,
    /// REAL.
    Real,
    /// DATE.
    Date,
    /// SMALLDATETIME.
    SmallDateTime,
    /// DATETIME.
    DateTime,
    /// DATETIME2 with fractional seconds scale.
    DateTime2 {
        /// Fractional seconds precision (0-7).
        scale: u8,
    },
    /// DATETIMEOFFSET with fractional seconds scale.
    DateTimeOffset {
        /// Fractional seconds precision (0-7).
        scale: u8,
    },
    /// TIME with fractional seconds scale.
    Time {
        /// Fractional seconds precision (0-7).
        scale: u8,
    },
    /// CHAR.
    Char {
        /// Length in bytes.
        length: u16,
    },
    /// VARCHAR. Use [`MAX_LENGTH`] for `VARCHAR(MAX)`.
    VarChar {
        /// Maximum length in bytes.
        length: u16,
    },
    /// TEXT.
    Text,
    /// NCHAR.
    NChar {
        /// Length in characters.
        length: u16,
    },
    /// NVARCHAR. Use [`MAX_LENGTH`] for `NVARCHAR(MAX)`.
    NVarChar {
        /// Maximum length in characters.
        length: u16,
    },
    /// NTEXT.
    NText,
    /// BINARY.
    Binary {
        /// Length in bytes.
        length: u16,
    },
    /// VARBINARY. Use [`MAX_LENGTH`] for `VARBINARY(MAX)`.
    VarBinary {
        /// Maximum length in bytes.
        length: u16,
    },
    /// IMAGE.
    Image,
    /// Untyped NULL.
    Null,
    /// Table-valued parameter.
    Tvp,
    /// CLR user-defined type.
    Udt,
    /// UNIQUEIDENTIFIER.
    UniqueIdentifier,
    /// XML.
    Xml,
}

impl DataType {
    /// The family this type belongs to.
    #[must_use]
    pub const fn category(&self) -> TypeCategory {
        match self {
            Self::Bit
            | Self::TinyInt
            | Self::SmallInt
            | Self::Int
            | Self::BigInt
            | Self::Numeric { .. }
            | Self::Decimal { .. }
            | Self::SmallMoney
            | Self::Money => TypeCategory::ExactNumeric,
            Self::Float | Self::Real => TypeCategory::ApproximateNumeric,
            Self::Date
            | Self::SmallDateTime
            | Self::DateTime
            | Self::DateTime2 { .. }
            | Self::DateTimeOffset { .. }
            | Self::Time { .. } => TypeCategory::DateTime,
            Self::Char { .. } | Self::VarChar { .. } | Self::Text => TypeCategory::Character,
            Self::NChar { .. } | Self::NVarChar { .. } | Self::NText => TypeCategory::Unicode,
            Self::Binary { .. } | Self::VarBinary { .. } | Self::Image => TypeCategory::Binary,
            Self::Null | Self::Tvp | Self::Udt | Self::UniqueIdentifier | Self::Xml => {
                TypeCategory::Other
            }
        }
    }

    /// Declared length for character and binary types.
    #[must_use]
    pub const fn length(&self) -> Option<u16> {
        match *self {
            Self::Char { length }
            | Self::VarChar { length }
            | Self::NChar { length }
            | Self::NVarChar { length }
            | Self::Binary { length }
            | Self::VarBinary { length } => Some(length),
            _ => None,
        }
    }

    /// Declared precision for NUMERIC and DECIMAL.
    #[must_use]
    pub const fn precision(&self) -> Option<u8> {
        match *self {
            Self::Numeric { precision, .. } | Self::Decimal { precision, .. } => Some(precision),
            _ => None,
        }
    }

    /// Declared scale for NUMERIC, DECIMAL and the scaled time types.
    #[must_use]
    pub const fn scale(&self) -> Option<u8> {
        match *self {
            Self::Numeric { scale, .. }
            | Self::Decimal { scale, .. }
            | Self::DateTime2 { scale }
            | Self::DateTimeOffset { scale }
            | Self::Time { scale } => Some(scale),
            _ => None,
        }
    }

    /// Parse a type declaration such as `INT`, `NVARCHAR(100)`,
    /// `NVARCHAR(MAX)` or `DECIMAL(18, 2)`.
    ///
    /// Parameterized types fall back to SQL Server's defaults when the
    /// arguments are omitted.
    pub fn from_sql_type(sql_type: &str) -> Result<Self, TypeError> {
        let unknown = || TypeError::UnknownSqlType(sql_type.to_string());
        let declaration = sql_type.trim().to_uppercase();

        let (name, args) = match declaration.split_once('(') {
            Some((name, rest)) => {
                let inner = rest.strip_suffix(')').ok_or_else(unknown)?;
                let args: Vec<&str> = inner.split(',').map(str::trim).collect();
                (name.trim(), args)
            }
            None => (declaration.as_str(), Vec::new()),
        };

        let length = |default: u16| -> Result<u16, TypeError> {
            match args.first() {
                None => Ok(default),
                Some(arg) if arg.eq_ignore_ascii_case("MAX") => Ok(MAX_LENGTH),
                Some(arg) => arg.parse().map_err(|_| unknown()),
            }
        };
        let scale = || -> Result<u8, TypeError> {
            match args.first() {
                None => Ok(7),
                Some(arg) => arg.parse().map_err(|_| unknown()),
            }
        };
        let precision_scale = || -> Result<(u8, u8), TypeError> {
            let precision = match args.first() {
                None => 18,
                Some(arg) => arg.parse().map_err(|_| unknown())?,
            };
            let scale = match args.get(1) {
                None => 0,
                Some(arg) => arg.parse().map_err(|_| unknown())?,
            };
            Ok((precision, scale))
        };

        let data_type = match name {
            "BIT" => Self::Bit,
            "TINYINT" => Self::TinyInt,
            "SMALLINT" => Self::SmallInt,
            "INT" | "INTEGER" => Self::Int,
            "BIGINT" => Self::BigInt,
            "NUMERIC" => {
                let (precision, scale) = precision_scale()?;
                Self::Numeric { precision, scale }
            }
            "DECIMAL" => {
                let (precision, scale) = precision_scale()?;
                Self::Decimal { precision, scale }
            }
            "SMALLMONEY" => Self::SmallMoney,
            "MONEY" => Self::Money,
            "FLOAT" => Self::Float,
            "REAL" => Self::Real,
            "DATE" => Self::Date,
            "SMALLDATETIME" => Self::SmallDateTime,
            "DATETIME" => Self::DateTime,
            "DATETIME2" => Self::DateTime2 { scale: scale()? },
            "DATETIMEOFFSET" => Self::DateTimeOffset { scale: scale()? },
            "TIME" => Self::Time { scale: scale()? },
            "CHAR" => Self::Char { length: length(1)? },
            "VARCHAR" => Self::VarChar {
                length: length(8000)?,
            },
            "TEXT" => Self::Text,
            "NCHAR" => Self::NChar { length: length(1)? },
            "NVARCHAR" => Self::NVarChar {
                length: length(4000)?,
            },
            "NTEXT" => Self::NText,
            "BINARY" => Self::Binary { length: length(1)? },
            "VARBINARY" => Self::VarBinary {
                length: length(8000)?,
            },
            "IMAGE" => Self::Image,
            "UNIQUEIDENTIFIER" => Self::UniqueIdentifier,
            "XML" => Self::Xml,
            _ => return Err(unknown()),
        };

        Ok(data_type)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Bit => "BIT",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Int => "INT",
            Self::BigInt => "BIGINT",
            Self::Numeric { .. } => "NUMERIC",
            Self::Decimal { .. } => "DECIMAL",
            Self::SmallMoney => "SMALLMONEY",
            Self::Money => "MONEY",
            Self::Float => "FLOAT",
            Self::Real => "REAL",
            Self::Date => "DATE",
            Self::SmallDateTime => "SMALLDATETIME",
            Self::DateTime => "DATETIME",
            Self::DateTime2 { .. } => "DATETIME2",
            Self::DateTimeOffset { .. } => "DATETIMEOFFSET",
            Self::Time { .. } => "TIME",
            Self::Char { .. } => "CHAR",
            Self::VarChar { .. } => "VARCHAR",
            Self::Text => "TEXT",
            Self::NChar { .. } => "NCHAR",
            Self::NVarChar { .. } => "NVARCHAR",
            Self::NText => "NTEXT",
            Self::Binary { .. } => "BINARY",
            Self::VarBinary { .. } => "VARBINARY",
            Self::Image => "IMAGE",
            Self::Null => "NULL",
            Self::Tvp => "TABLE",
            Self::Udt => "UDT",
            Self::UniqueIdentifier => "UNIQUEIDENTIFIER",
            Self::Xml => "XML",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if let (Some(precision), Some(scale)) = (self.precision(), self.scale()) {
            return write!(f, "({precision}, {scale})");
        }
        if let Some(scale) = self.scale() {
            return write!(f, "({scale})");
        }
        match self.length() {
            Some(MAX_LENGTH) => f.write_str("(MAX)"),
            Some(length) => write!(f, "({length})"),
            None => Ok(()),
        }
    }
}

impl std::str::FromStr for DataType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_sql_type(s)
    }
}
