pub mod registration;

pub use registration::{infer_declaration, register};
