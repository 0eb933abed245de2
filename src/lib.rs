pub mod diff;
pub mod error;
pub mod expression;
pub mod parse;
pub mod path;
pub mod pattern;
pub mod registry;
pub mod validate;
pub mod wasm;
