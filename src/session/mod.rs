// ABOUTME: Session module — lifecycle engine, config, construction, and the error taxonomy
// ABOUTME: Re-export block mirrors the teacher's client module: flat public surface, modules stay private

mod builder;
mod engine;
mod error;
mod types;

pub use builder::SessionBuilder;
pub use engine::RelpSession;
pub use error::{AckError, ConnectError, RelpError};
pub use types::SessionOptions;
