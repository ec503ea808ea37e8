// Core engine and collaborators for the sheetsage analysis pipeline

pub mod analysis;
pub mod llm;
pub mod sheets;
pub mod types;
pub mod workflow;

pub use types::*;
