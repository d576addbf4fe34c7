//! Utility functions for text handling.

pub mod text;

pub use text::{contains_any, keywords, parse_growth_rates, parse_money_amounts, split_list};
