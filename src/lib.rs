//! `docrepo`: a typed repository and fluent query builder over a document store.
//!
//! ```no_run
//! use docrepo::{MemoryEngine, QueryBuilder, Repository, field_keys};
//! use serde::{Deserialize, Serialize};
//!
//! field_keys! {
//!     pub enum UserField {
//!         Status => "status",
//!         Age => "age",
//!     }
//! }
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     status: String,
//!     age: i32,
//! }
//!
//! # async fn demo() -> Result<(), docrepo::RepoError> {
//! let engine = MemoryEngine::new();
//! let users: Repository<User, _> = Repository::new(engine.create_collection("users"));
//! users.save(&User { status: "active".into(), age: 30 }, None).await?;
//! let query = QueryBuilder::new()
//!     .equal_string(UserField::Status, "active")
//!     .greater_than(UserField::Age, 18)
//!     .sort_desc(UserField::Age)
//!     .limit(10)
//!     .build()?;
//! let adults = users.find_all(&query).await?;
//! # let _ = adults;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod logger;
pub mod query;
pub mod repository;
pub mod store;
pub mod types;
pub mod utils;

pub use config::{LogConfig, RepositoryConfig, Settings};
pub use errors::{CompileError, ConfigError, RepoError, StoreError};
pub use query::{FilterMode, LookupModel, Query, QueryBuilder};
pub use repository::Repository;
pub use store::{DocumentCursor, MemoryCollection, MemoryEngine, Store};
pub use types::{Field, FieldKey, parse_object_id};
