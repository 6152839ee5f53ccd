mod amounts;
mod helpers;

pub mod op;
mod secret;

pub use amounts::{AmountConversionError, Paise, Points, DEFAULT_CURRENCY_CODE};
pub use helpers::{parse_boolean_flag, parse_number};
pub use secret::Secret;
