use serde_json::Value;

/// Accumulating output record; serialized exactly once at the end of a run.
pub type ConfigRecord = serde_json::Map<String, Value>;

/// Binding names the publishing platform assigns in generated documents.
pub const PAGES_BINDING: &str = "fliphtml5_pages";
pub const CONFIG_BINDING: &str = "htmlConfig";

/// Field inside the config object that carries the encoded payload.
pub const BOOK_CONFIG_KEY: &str = "bookConfig";

/// Output field names.
pub const PAGES_KEY: &str = "pages";
pub const PAGES_ERROR_KEY: &str = "_pages_decoding_error";
pub const PAGES_TYPE_INFO_KEY: &str = "_pages_type_info";
pub const CONFIG_ERROR_KEY: &str = "_config_decoding_error";

/// Marker prefix on encoded page-list strings.
pub const ENCODED_PAGES_MARKER: char = 'v';

/// One payload value as it moves through the pipeline.
///
/// Extraction produces `Missing`, `Structured` or `Plain`; the recovery
/// stage promotes `Plain` to `Encoded` when the slot's marker rule matches.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedValue {
    Missing,
    Structured(Value),
    Encoded(String),
    Plain(String),
}

impl ExtractedValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, ExtractedValue::Missing)
    }

    /// Wrap a JSON value pulled out of an already-recovered record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => ExtractedValue::Missing,
            Value::String(text) => ExtractedValue::Plain(text),
            other => ExtractedValue::Structured(other),
        }
    }
}

/// The two named payload positions tracked through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Config,
    Pages,
}

impl Slot {
    pub fn name(self) -> &'static str {
        match self {
            Slot::Config => "config",
            Slot::Pages => "pages",
        }
    }

    /// Closing delimiter used by the truncation-repair retry.
    pub fn closing_delimiter(self) -> char {
        match self {
            Slot::Config => '}',
            Slot::Pages => ']',
        }
    }

    /// Whether a plain string in this slot should be handed to the decoder.
    ///
    /// The config slot treats any non-empty string as encoded; the page list
    /// only when it starts with the platform's marker prefix, so structured
    /// data captured earlier is never double-decoded.
    pub fn treats_as_encoded(self, text: &str) -> bool {
        match self {
            Slot::Config => !text.is_empty(),
            Slot::Pages => text.starts_with(ENCODED_PAGES_MARKER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pages_marker_rule() {
        assert!(Slot::Pages.treats_as_encoded("v0123abc"));
        assert!(!Slot::Pages.treats_as_encoded("0123abc"));
        assert!(!Slot::Pages.treats_as_encoded(""));
    }

    #[test]
    fn config_rule_rejects_empty() {
        assert!(Slot::Config.treats_as_encoded("anything"));
        assert!(!Slot::Config.treats_as_encoded(""));
    }

    #[test]
    fn from_value_classifies() {
        assert_eq!(
            ExtractedValue::from_value(Value::Null),
            ExtractedValue::Missing
        );
        assert_eq!(
            ExtractedValue::from_value(json!("vXYZ")),
            ExtractedValue::Plain("vXYZ".to_string())
        );
        assert_eq!(
            ExtractedValue::from_value(json!([1, 2])),
            ExtractedValue::Structured(json!([1, 2]))
        );
    }
}
