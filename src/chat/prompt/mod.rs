//! Prompt construction modules.

pub mod prompt_builder;
pub mod template;
pub mod token;

pub use prompt_builder::{
    HISTORY_PREFIX, build_prompt_messages, memory_message, to_request_messages,
};
pub use template::{
    INPUT_VAR, MARKER_GUIDE, TemplateVars, append_marker_guide, fill_template_with,
};
pub use token::{count_messages, estimate_token_length};
