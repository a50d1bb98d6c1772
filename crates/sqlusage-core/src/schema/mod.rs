//! Schema management module

mod builder;
mod catalog;

pub use builder::CatalogBuilder;
pub use catalog::{Catalog, TableDef};
