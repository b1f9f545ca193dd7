//! Core data types and models

pub mod record;
pub mod schema;
pub mod temporal;
pub mod value;

pub use record::*;
pub use schema::*;
pub use temporal::*;
pub use value::*;
