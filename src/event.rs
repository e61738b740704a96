//! Observable engine events
//!
//! Every settled transition surfaces as one event. The default console
//! reporter turns these into the fixed status lines; `--json` emits them
//! as NDJSON instead.

use serde::Serialize;

/// One observable transition of the engine
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    /// Watch mode entered; startup compiles have settled
    WatchStarted { roots: Vec<String> },
    /// An entry compiled and its output was written
    Compiled { input: String, output: String },
    /// An output file was deleted
    Deleted { output: String },
    /// An entry failed to compile
    CompileFailed {
        input: String,
        message: String,
        context: String,
    },
    /// Watch stopped
    Shutdown,
}

impl WatchEvent {
    /// NDJSON line for `--json` mode
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"event\":\"error\"}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_event_to_json() {
        let event = WatchEvent::Compiled {
            input: "test.scss".to_string(),
            output: "out.css".to_string(),
        };
        let json = event.to_json();
        assert!(json.contains("\"event\":\"compiled\""));
        assert!(json.contains("\"input\":\"test.scss\""));
        assert!(json.contains("\"output\":\"out.css\""));
    }

    #[test]
    fn deleted_event_to_json() {
        let event = WatchEvent::Deleted {
            output: "out.css".to_string(),
        };
        let json = event.to_json();
        assert!(json.contains("\"event\":\"deleted\""));
    }

    #[test]
    fn failed_event_escapes_message() {
        let event = WatchEvent::CompileFailed {
            input: "test.scss".to_string(),
            message: "expected \":\".".to_string(),
            context: String::new(),
        };
        let json = event.to_json();
        assert!(json.contains("\"event\":\"compile_failed\""));
        assert!(json.contains("expected \\\":\\\"."));
    }
}
