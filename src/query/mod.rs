//! Query compilation: `QueryBuilder` chains predicates, sort, paging and aggregation stages
//! into an immutable `Query` consumed by `Repository`.

mod builder;
mod compiled;
mod lookup;

pub use builder::QueryBuilder;
pub use compiled::{FilterMode, Query};
pub use lookup::LookupModel;
