//! Conversion from [`SqlValue`] into Rust types.

use bytes::Bytes;

use crate::error::TypeError;
use crate::value::SqlValue;

/// Types that can be read out of a [`SqlValue`].
pub trait FromSql: Sized {
    /// Convert a non-NULL value. NULL yields [`TypeError::UnexpectedNull`].
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError>;

    /// Convert a value that may be NULL.
    fn from_sql_nullable(value: &SqlValue) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_sql(value).map(Some)
        }
    }
}

fn mismatch(expected: &'static str, value: &SqlValue) -> TypeError {
    if value.is_null() {
        TypeError::UnexpectedNull
    } else {
        TypeError::TypeMismatch {
            expected,
            actual: value.type_name().to_string(),
        }
    }
}

macro_rules! from_integer {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromSql for $ty {
                fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
                    let wide = value.as_i64().ok_or_else(|| mismatch($name, value))?;
                    <$ty>::try_from(wide).map_err(|_| TypeError::OutOfRange { target: $name })
                }
            }
        )*
    };
}

from_integer! {
    u8 => "u8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u32 => "u32",
    u64 => "u64",
}

impl FromSql for bool {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Bool(v) => Ok(*v),
            other => match other.as_i64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(mismatch("bool", other)),
            },
        }
    }
}

impl FromSql for f64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Float(v) => Ok(*v),
            SqlValue::Real(v) => Ok(f64::from(*v)),
            other => other
                .as_i64()
                .map(|v| v as f64)
                .ok_or_else(|| mismatch("f64", other)),
        }
    }
}

impl FromSql for f32 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Real(v) => Ok(*v),
            other => Err(mismatch("f32", other)),
        }
    }
}

impl FromSql for String {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatch("String", value))
    }
}

impl FromSql for Bytes {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Binary(b) => Ok(b.clone()),
            other => Err(mismatch("Bytes", other)),
        }
    }
}

impl FromSql for Vec<u8> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        Bytes::from_sql(value).map(|b| b.to_vec())
    }
}

impl FromSql for SqlValue {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        Ok(value.clone())
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        T::from_sql_nullable(value)
    }
}

macro_rules! from_variant {
    ($($ty:ty => $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl FromSql for $ty {
                fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
                    match value {
                        SqlValue::$variant(v) => Ok(v.clone()),
                        other => Err(mismatch($name, other)),
                    }
                }
            }
        )*
    };
}

#[cfg(feature = "decimal")]
from_variant! { rust_decimal::Decimal => Decimal, "Decimal" }

#[cfg(feature = "uuid")]
from_variant! { uuid::Uuid => Uuid, "Uuid" }

#[cfg(feature = "chrono")]
from_variant! {
    chrono::NaiveDate => Date, "NaiveDate";
    chrono::NaiveTime => Time, "NaiveTime";
    chrono::NaiveDateTime => DateTime, "NaiveDateTime";
    chrono::DateTime<chrono::FixedOffset> => DateTimeOffset, "DateTime<FixedOffset>";
}
