//! # tedium-types
//!
//! Value and type-tag definitions shared by the tedium crates.
//!
//! - [`SqlValue`] is the dynamically typed value carried in rows, parameters
//!   and bulk-load buffers.
//! - [`DataType`] is the fixed set of SQL Server type tags (exact and
//!   approximate numerics, date/time, character, unicode, binary and the
//!   "other" group) together with their length, precision and scale.
//! - [`TypedValue`] pairs a value with a type tag, which is how request
//!   parameters are declared.
//! - [`FromSql`] converts a [`SqlValue`] back into a Rust type.
//!
//! ## Example
//!
//! ```rust
//! use tedium_types::{DataType, SqlValue, TypedValue};
//!
//! let id = TypedValue::int(42);
//! assert_eq!(id.data_type, DataType::Int);
//!
//! let name = TypedValue::nvarchar(50, "widget");
//! assert_eq!(name.data_type.length(), Some(50));
//! assert_eq!(name.value, SqlValue::String("widget".into()));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod data_type;
pub mod error;
pub mod from_sql;
pub mod typed;
pub mod value;

pub use data_type::{DataType, TypeCategory};
pub use error::TypeError;
pub use from_sql::FromSql;
pub use typed::TypedValue;
pub use value::SqlValue;
