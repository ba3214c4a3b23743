//! Stock monitoring and checkout automation for Shopify-style storefronts.
//!
//! The engine watches product availability through the public `.json`
//! product feed, raises restock notifications, and can drive a hosted
//! checkout up to (never past) the payment step. Payment details are
//! never collected or transmitted; completing an order is always a
//! manual act by the user.

pub mod cli;
pub mod core;
pub mod notify;
