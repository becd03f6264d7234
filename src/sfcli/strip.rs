use once_cell::sync::Lazy;
use regex::Regex;

// CSI sequences, OSC sequences (BEL- or ST-terminated), and two-byte
// escapes. The platform CLI colors and animates its output even when
// asked for JSON.
static ESCAPE_SEQUENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:\][^\x07\x1B]*(?:\x07|\x1B\\)|\[[0-9;?]*[@-~]|[@-Z\\^_])")
        .expect("escape sequence pattern is valid")
});

/// Remove terminal escape sequences from captured process output.
pub fn strip_escape_sequences(input: &str) -> String {
    if !input.contains('\x1B') {
        return input.to_string();
    }
    ESCAPE_SEQUENCES.replace_all(input, "").into_owned()
}
