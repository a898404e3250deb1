//! Session layer: subprocess ownership, prompt-delimited framing, and the
//! command/response primitive.

mod buffer;
mod channel;
pub mod config;
mod output;

pub use buffer::PromptBuffer;
pub use channel::SessionChannel;
pub use config::{PDB_PROMPT, SessionConfig};
pub use output::Output;
