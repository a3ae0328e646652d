//! Backend-agnostic swap operations: quoting with price impact, fee
//! estimation, execution and availability, routed to the exchange serving
//! each chain.

pub mod config;
pub mod error;
pub mod price_impact;
pub mod service;

pub use config::SwapServiceConfig;
pub use error::SwapError;
pub use price_impact::{calculate_price_impact, price_impact};
pub use service::SwapService;
