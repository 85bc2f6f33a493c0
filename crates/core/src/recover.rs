//! Payload recovery: turns an extracted value into structured data by way
//! of the decode capability, with a truncation-repair retry for payloads
//! that carry trailing garbage after valid JSON.

use serde_json::Value;

use crate::decoder::PayloadDecoder;
use crate::error::{FlipError, Result};
use crate::model::{ConfigRecord, ExtractedValue, Slot, BOOK_CONFIG_KEY};

/// Outcome of recovering one slot.
#[derive(Debug, PartialEq)]
pub enum Recovered {
    Structured(Value),
    /// Decode or parse failure; `capability` distinguishes a capability
    /// fault from a parse-after-decode failure.
    Failed { message: String, capability: bool },
    /// A plain string the slot's marker rule does not recognize as encoded;
    /// carries a short prefix for the diagnostic record.
    Unrecognized(String),
}

/// Promote a plain string to `Encoded` when the slot's rule matches.
pub fn classify(value: ExtractedValue, slot: Slot) -> ExtractedValue {
    match value {
        ExtractedValue::Plain(text) if slot.treats_as_encoded(&text) => {
            ExtractedValue::Encoded(text)
        }
        other => other,
    }
}

/// Recover one slot. Structured data passes through untouched and the
/// decoder is never invoked for it.
pub fn recover(value: ExtractedValue, slot: Slot, decoder: &dyn PayloadDecoder) -> Recovered {
    match classify(value, slot) {
        ExtractedValue::Structured(data) => Recovered::Structured(data),
        ExtractedValue::Encoded(ciphertext) => decode_and_parse(&ciphertext, slot, decoder),
        ExtractedValue::Plain(text) => {
            let prefix: String = text.chars().take(50).collect();
            Recovered::Unrecognized(format!("String: {prefix}"))
        }
        ExtractedValue::Missing => Recovered::Failed {
            message: "no value extracted".to_string(),
            capability: false,
        },
    }
}

/// Recovered config slot: the base record with decoded fields merged over
/// it, plus an optional diagnostic for the output's error field.
#[derive(Debug)]
pub struct ConfigRecovery {
    pub record: ConfigRecord,
    pub diagnostic: Option<String>,
}

/// Recover the config slot. The encoded material is either the whole
/// extracted value (when the document stored the config as one opaque
/// string) or its `bookConfig` field. A capability fault is fatal only
/// when no other config fields were extracted to fall back on.
pub fn recover_config(
    value: ExtractedValue,
    decoder: &dyn PayloadDecoder,
) -> Result<ConfigRecovery> {
    let (mut record, ciphertext) = match classify(value, Slot::Config) {
        ExtractedValue::Missing | ExtractedValue::Plain(_) => (ConfigRecord::new(), None),
        ExtractedValue::Encoded(text) => (ConfigRecord::new(), Some(text)),
        ExtractedValue::Structured(Value::Object(map)) => {
            let field = match map.get(BOOK_CONFIG_KEY) {
                Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
                _ => None,
            };
            (map, field)
        }
        ExtractedValue::Structured(other) => {
            tracing::warn!(kind = value_kind(&other), "config literal is not an object");
            (ConfigRecord::new(), None)
        }
    };

    let Some(ciphertext) = ciphertext else {
        return Ok(ConfigRecovery {
            record,
            diagnostic: None,
        });
    };

    tracing::debug!("decoding config payload");
    let diagnostic = match decode_and_parse(&ciphertext, Slot::Config, decoder) {
        Recovered::Structured(Value::Object(decoded)) => {
            for (key, field) in decoded {
                record.insert(key, field);
            }
            None
        }
        Recovered::Structured(other) => Some(format!(
            "decoded config is not an object (got {})",
            value_kind(&other)
        )),
        Recovered::Failed {
            message,
            capability,
        } => {
            let fallback_fields = record.keys().any(|key| key != BOOK_CONFIG_KEY);
            if capability && !fallback_fields {
                return Err(FlipError::ConfigUnrecoverable(message));
            }
            Some(message)
        }
        Recovered::Unrecognized(info) => Some(info),
    };

    Ok(ConfigRecovery { record, diagnostic })
}

fn decode_and_parse(ciphertext: &str, slot: Slot, decoder: &dyn PayloadDecoder) -> Recovered {
    let decoded = match decoder.decode(ciphertext) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(slot = slot.name(), %err, "decode capability failed");
            return Recovered::Failed {
                message: format!("decode failed: {err}"),
                capability: true,
            };
        }
    };

    match serde_json::from_str(&decoded) {
        Ok(parsed) => Recovered::Structured(parsed),
        Err(first) => {
            let delimiter = slot.closing_delimiter();
            match repair_truncation(&decoded, delimiter) {
                Some(trimmed) => match serde_json::from_str(trimmed) {
                    Ok(parsed) => {
                        tracing::warn!(
                            slot = slot.name(),
                            trimmed_bytes = decoded.len() - trimmed.len(),
                            "payload parsed after trailing-garbage trim"
                        );
                        Recovered::Structured(parsed)
                    }
                    Err(second) => Recovered::Failed {
                        message: format!("parse failed: {first} | repair failed: {second}"),
                        capability: false,
                    },
                },
                None => Recovered::Failed {
                    message: format!(
                        "parse failed: {first} | repair failed: no `{delimiter}` in payload"
                    ),
                    capability: false,
                },
            }
        }
    }
}

/// Trim everything after the last occurrence of the expected closing
/// delimiter. Recovers payloads where padding or a partial retransmission
/// follows valid JSON.
pub fn repair_truncation(text: &str, closing: char) -> Option<&str> {
    let last = text.rfind(closing)?;
    Some(&text[..last + closing.len_utf8()])
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
