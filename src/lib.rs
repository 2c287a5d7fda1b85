//! Chat sessions whose model replies can carry embedded widgets.
//!
//! A reply ending in a widget marker (`._map_Paris`, `._stock_AAPL_1d`, ...)
//! is stripped of its marker and enriched with a rendered widget.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(non_camel_case_types)]
#![deny(unused_must_use)]
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![deny(overflowing_literals)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::panic))]

/// Sessions, prompt assembly, memory and the chat store.
pub mod chat;
/// Widget marker detection and reply enrichment.
pub mod classifier;
/// Chat completion client.
pub mod llm;
/// HTTP server and API routes.
#[allow(clippy::missing_errors_doc, clippy::unused_async)]
pub mod server;
/// Entry helpers to start the server.
pub mod start_chat_widgets;
/// Widget data sources, caching and rendering.
pub mod widgets;
