//! The prelude exports the word types and the helpers which are
//! useful when handling DPS8/M words.  Providing this prelude is the
//! main purpose of the base crate.
pub use super::bitfield::Field;
pub use super::error::*;
pub use super::subword::{
    join_halves, join_pair, left_half, right_half, sign_extend_15_to_18, split_pair,
};
pub use super::types::*;
pub use super::unsigned::*;
pub use super::{u15, u18, u24, u3, u36};
