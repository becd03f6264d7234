use serde_json::Value;

/// Normalized outcome of one platform CLI invocation.
///
/// `raw` is the escape-stripped stdout text; `json` the parsed envelope
/// when the output was parseable. `status`, `name`, and `message` are
/// derived from the envelope (`status` falls back to the process exit
/// code when the envelope omits it).
#[derive(Debug, Clone)]
pub struct CliResult {
    pub raw: String,
    pub json: Option<Value>,
    pub status: i64,
    pub name: Option<String>,
    pub message: Option<String>,
}

impl CliResult {
    /// Wrap non-JSON output from a process that exited successfully.
    pub fn success_raw(raw: String) -> Self {
        Self {
            raw,
            json: None,
            status: 0,
            name: None,
            message: None,
        }
    }

    /// Derive status/name/message from a parsed envelope. `fallback_status`
    /// is used when the envelope has no `status` field (the process exit
    /// code on the failure path, `0` on the success path).
    pub fn from_envelope(json: Value, raw: String, fallback_status: i64) -> Self {
        let status = json
            .get("status")
            .and_then(Value::as_i64)
            .unwrap_or(fallback_status);
        let name = json
            .get("name")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let message = json
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        Self {
            raw,
            json: Some(json),
            status,
            name,
            message,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// The `result` payload of a success envelope.
    pub fn result(&self) -> Option<&Value> {
        self.json.as_ref().and_then(|json| json.get("result"))
    }

    /// Convenience accessor for the `result.id` field most record-style
    /// subcommands return.
    pub fn record_id(&self) -> Option<&str> {
        self.result()
            .and_then(|result| result.get("id"))
            .and_then(Value::as_str)
    }
}
