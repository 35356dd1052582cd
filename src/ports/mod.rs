//! Port traits: the seams between domain logic and the outside world.

pub mod config_port;
pub mod feed_port;
pub mod ledger_port;
pub mod quote_store_port;
pub mod reference_port;
