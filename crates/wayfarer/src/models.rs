//! The objects passed around by the assistant loop.
//!
//! The internal transcript model is not an exact match for the wire format
//! of any one provider: provider modules convert to and from these structs
//! at the boundary, and the loop only ever sees the internal types.
pub mod message;
pub mod role;
pub mod tool;

pub use message::{Message, MessageContent, ToolOutput, ToolRequest};
pub use role::Role;
pub use tool::{Tool, ToolCall};
