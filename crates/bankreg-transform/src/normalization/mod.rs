//! Value-level normalization used by the rule engine:
//! - **text**: whitespace, case and character-class cleaning
//! - **numeric**: amount and integer parsing
//! - **date**: multi-format date parsing
//! - **vocabulary**: controlled-vocabulary resolution

pub mod date;
pub mod numeric;
pub mod text;
pub mod vocabulary;

pub use date::{DEFAULT_DATE_FORMATS, is_valid_format, parse_date};
pub use numeric::{parse_amount, parse_integer};
pub use text::{CaseFold, TextOptions, clean_text, normalize_code};
pub use vocabulary::{MatchMode, resolve_code};
