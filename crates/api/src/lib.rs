//! dLEND API clients for external services.
//!
//! This crate provides the HTTP client for the Odos DEX aggregator used to
//! route seized collateral back into the repaid debt token, plus the
//! base-unit amount conversions the wire format requires.

pub mod amounts;
mod odos;

pub use amounts::{format_units, parse_units, AmountError};
pub use odos::{
    AssembledSwap, InputToken, OdosClient, OdosError, OutputToken, QuoteRequest, QuoteResponse,
    QUOTE_USER_ADDR,
};
