//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL persistence for the hospital engine,
//! implemented with SQLx repositories over a shared connection pool.
//!
//! # Architecture
//!
//! The repositories follow a load/run/persist shape: lock the rows involved,
//! rebuild the domain aggregate, run the domain operation, and write back
//! whatever it produced, all inside one transaction. Concurrency-sensitive
//! stock decrements additionally run as conditional updates
//! (`WHERE stock_quantity >= $n`) so a batch can never go negative even if a
//! lock is missed.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool_from_url, InventoryRepository};
//!
//! let pool = create_pool_from_url("postgres://localhost/hospital").await?;
//! let repo = InventoryRepository::new(pool);
//! ```

pub mod error;
pub mod pool;
pub mod repositories;

pub use error::{DatabaseError, EngineError};
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::{BillingRepository, InventoryRepository};
