#![warn(clippy::all)]
#![doc = include_str!("../README.md")]

// Modules that make up the catalog explorer library.
mod args;
mod column_filter;
mod documents;
mod error;
mod file_extension;
mod pipeline;
mod predicate;
mod prefilter;
mod row;
mod schema;
mod session;
mod settings;
mod sort;
mod traits;
mod value;

// Publicly expose the contents of these modules.
pub use self::{
    // add to lib
    args::{Arguments, FilterInput},
    column_filter::*,
    documents::*,
    error::*,
    file_extension::*,
    pipeline::*,
    predicate::*,
    prefilter::*,
    row::*,
    schema::*,
    session::*,
    settings::*,
    sort::*,
    traits::*,
    value::*,
};
