// Result/Error Serializer
//
// Exactly one envelope per invocation goes to stdout. Diagnostics go to
// stderr. Dispatch failures still exit 0; only load failures exit non-zero.

use crate::extensions::types::ErrorResult;
use std::io::{self, Write};

/// What a dispatch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// String result, written verbatim.
    Text(String),
    /// Non-string result, already JSON-encoded.
    Json(String),
    /// `null`/`undefined` result; nothing is written.
    Empty,
    /// Dispatch failure message.
    Error(String),
}

impl Envelope {
    /// Bytes destined for stdout.
    pub fn payload(&self) -> Option<String> {
        match self {
            Envelope::Text(text) | Envelope::Json(text) => Some(text.clone()),
            Envelope::Empty => None,
            Envelope::Error(message) => Some(ErrorResult::new(message.clone()).to_json()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error(_))
    }
}

/// Write the envelope to `out` and, for errors, a diagnostic line to `diag`.
pub fn emit<O: Write, D: Write>(
    envelope: &Envelope,
    method: &str,
    out: &mut O,
    diag: &mut D,
) -> io::Result<()> {
    if let Envelope::Error(message) = envelope {
        writeln!(diag, "failed to execute method: {} - {}", method, message)?;
        diag.flush()?;
    }

    match envelope.payload() {
        Some(payload) => {
            out.write_all(payload.as_bytes())?;
            out.flush()
        }
        None => {
            log::debug!("{} produced no output", method);
            Ok(())
        }
    }
}

/// Diagnostic for a fatal load failure. Nothing is written to stdout.
pub fn report_load_failure<D: Write>(diag: &mut D, error: &dyn std::fmt::Display) -> io::Result<()> {
    writeln!(diag, "failed to load extension: {}", error)?;
    diag.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(envelope: &Envelope) -> (String, String) {
        let mut out = Vec::new();
        let mut diag = Vec::new();
        emit(envelope, "homeContent", &mut out, &mut diag).unwrap();
        (String::from_utf8(out).unwrap(), String::from_utf8(diag).unwrap())
    }

    #[test]
    fn test_text_is_verbatim() {
        let (out, diag) = render(&Envelope::Text(r#"{"class":[]} "#.to_string()));
        assert_eq!(out, r#"{"class":[]} "#);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_empty_writes_nothing() {
        let (out, diag) = render(&Envelope::Empty);
        assert!(out.is_empty());
        assert!(diag.is_empty());
        assert_ne!(Envelope::Empty, Envelope::Text(String::new()));
    }

    #[test]
    fn test_error_shape_and_diagnostic() {
        let (out, diag) = render(&Envelope::Error("boom \"quoted\"".to_string()));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, serde_json::json!({"error": "boom \"quoted\""}));
        assert!(diag.contains("homeContent"));
        assert!(diag.contains("boom"));
    }

    #[test]
    fn test_load_failure_report() {
        let mut diag = Vec::new();
        report_load_failure(&mut diag, &"cannot read /x/site.js").unwrap();
        assert!(String::from_utf8(diag).unwrap().contains("/x/site.js"));
    }
}
