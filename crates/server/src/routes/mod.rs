mod health;
mod orchestrate;
mod project;
pub mod sse;
mod team;

pub use health::*;
pub use orchestrate::*;
pub use project::*;
pub use team::*;
