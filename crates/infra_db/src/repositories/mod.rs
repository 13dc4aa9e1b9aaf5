//! Repository implementations
//!
//! Each repository owns a connection pool clone and runs its mutations in
//! transactions. Domain rules live in the domain crates; the repositories
//! lock rows, reload aggregates, run the domain logic, and persist the
//! result.

pub mod billing;
pub mod inventory;

pub use billing::BillingRepository;
pub use inventory::InventoryRepository;
