//! One-off maintenance jobs run against the destination database.

pub mod enrich;
pub mod remap;
pub mod reset;

pub use enrich::{enrich_orders, EnrichReport, MysqlOrderStore, OrderListing, OrderStore};
pub use remap::{remap_flow_id, RemapReport};
pub use reset::{reset_tables, ResetReport};
