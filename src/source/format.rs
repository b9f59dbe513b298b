use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// How the app name, process id and payload are combined into the delivered
/// message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// `app[process]: payload`
    #[default]
    Text,
    /// A JSON object carrying `heroku_app` and `heroku_process`. Object payloads
    /// are merged in; anything else lands under `message`.
    Json,
}

impl MessageFormat {
    pub fn render(self, app: &str, process: &str, payload: &str) -> String {
        match self {
            MessageFormat::Text => format!("{}[{}]: {}", app, process, payload),
            MessageFormat::Json => render_json(app, process, payload),
        }
    }
}

fn render_json(app: &str, process: &str, payload: &str) -> String {
    let head = format!(
        "{{\"heroku_app\":{},\"heroku_process\":{}",
        Value::from(app),
        Value::from(process)
    );

    let trimmed = payload.trim();
    match serde_json::from_str::<Map<String, Value>>(trimmed) {
        Ok(fields) if fields.is_empty() => format!("{}}}", head),
        // Splice the original text so field order and formatting survive
        Ok(_) => format!("{},{}", head, trimmed[1..].trim_start()),
        Err(_) => format!("{},\"message\":{}}}", head, Value::from(payload)),
    }
}

fn ansi_regex() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new("\x1b[^m]*m").expect("ANSI pattern is valid"))
}

/// Remove terminal colour sequences (`ESC[...m`).
pub fn strip_ansi(message: &str) -> String {
    ansi_regex().replace_all(message, "").into_owned()
}
