//! Host keyboard emulation and the canonical probe template

pub mod layout;
pub mod template;

pub use layout::{LayoutDefinition, LayoutError, LayoutProfile};
pub use template::Separator;
