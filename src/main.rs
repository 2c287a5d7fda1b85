//! Binary entrypoint that launches the chat widgets server.

use std::process::ExitCode;

use chat_widgets::start_chat_widgets;

fn main() -> ExitCode {
    start_chat_widgets::run()
}
