//! Chat widgets server binary.
//! Run with: cargo run --bin chat-widgets-server

use std::process::ExitCode;

use chat_widgets::start_chat_widgets;

fn main() -> ExitCode {
    start_chat_widgets::run()
}
