//! Template filling for system prompts and user input.

use chrono::Local;

use crate::llm::types::MessageContent;

/// Placeholder every input template must contain.
pub const INPUT_VAR: &str = "{{input}}";

/// Instructions teaching the model the widget marker syntax.
pub const MARKER_GUIDE: &str = r#"WIDGET MARKERS:
When one of the cases below applies, end your reply with exactly one marker, written directly after the final sentence with no space. Never add a marker otherwise.
- Numbers, math or calculations: "._calculator"
- A specific date, weekday or holiday: "._calendar_YYYY-MM-DD"
- Places or routes: "._map_<Place>" or "._map_<Place_One>__<Place_Two>" (use underscores for spaces)
- The user's bank accounts or balances: "._bank"
- Flights: "._flight__<FROM>__<TO>__YYYY-MM-DD" (airport ids such as JFK.AIRPORT)
- Hotels: "._hotel__<CHECK-IN YYYY-MM-DD>__<CHECK-OUT YYYY-MM-DD>__<City_Name>"
- Stock prices: "._stock_<TICKER>_<interval>" with interval one of 5m, 15m, 30m, 1h, 1d, 1wk, 1mo, 3mo
- Weather: "._weather_<latitude>_<longitude>" in decimal degrees

Examples:
"The first Monday of 2025 is January 6th._calendar_2025-01-06"
"Here is the route between both cities._map_New_York_City__Los_Angeles"
"25% of 100 is 25._calculator""#;

/// Values substituted into templates.
#[derive(Clone, Debug)]
pub struct TemplateVars<'a> {
    /// Provider label.
    pub provider: &'a str,
    /// Model name.
    pub model: &'a str,
    /// Current time, human readable.
    pub time: String,
    /// Interface language.
    pub lang: &'a str,
}

impl<'a> TemplateVars<'a> {
    /// Variables stamped with the current local time.
    #[must_use]
    pub fn now(provider: &'a str, model: &'a str, lang: &'a str) -> Self {
        Self {
            provider,
            model,
            time: Local::now().format("%a %b %d %Y %H:%M:%S %z").to_string(),
            lang,
        }
    }
}

/// Fill `template` with `input` and the variables.
///
/// An input that already starts with the template is passed through without
/// a second copy of it. A template lacking `{{input}}` gets it appended on a
/// new line. Variables are replaced before the input so text inside the input
/// is never substituted.
#[must_use]
pub fn fill_template_with(input: &str, template: &str, vars: &TemplateVars<'_>) -> String {
    let mut output = if input.starts_with(template) {
        String::new()
    } else {
        template.to_string()
    };

    if !output.contains(INPUT_VAR) {
        output.push('\n');
        output.push_str(INPUT_VAR);
    }

    output
        .replace("{{provider}}", vars.provider)
        .replace("{{model}}", vars.model)
        .replace("{{time}}", &vars.time)
        .replace("{{lang}}", vars.lang)
        .replace(INPUT_VAR, input)
}

/// Append the marker guide to a message body after a blank line.
pub fn append_marker_guide(content: &mut MessageContent) {
    content.push_str("\n\n");
    content.push_str(MARKER_GUIDE);
}
