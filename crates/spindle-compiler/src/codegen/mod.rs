pub mod builtins;
pub mod commands;
pub mod emitter;
pub mod graph_builder;
pub mod lua;

pub use emitter::{lower_conversation, LoweringContext};
pub use graph_builder::GraphBuilder;
