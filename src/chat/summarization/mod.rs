//! Background summarization: long-term memory and session topics.

pub mod summarizer;
pub mod topic;

pub use summarizer::{SUMMARIZE_PROMPT, SummaryRequest, build_summary_request};
pub use topic::{
    SUMMARIZE_MIN_LEN, TOPIC_PROMPT, build_topic_request, should_generate_topic, topic_from_reply,
    trim_topic,
};
