pub mod checkout;
pub mod config;
pub mod diff;
pub mod error;
pub mod monitor;
pub mod registry;
pub mod store;
pub mod storefront;
pub mod terminal;
pub mod tracker;
