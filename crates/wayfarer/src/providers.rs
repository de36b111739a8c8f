pub mod anthropic;
pub mod base;
pub mod mock;
