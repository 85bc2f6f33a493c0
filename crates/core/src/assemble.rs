//! Result assembly: merge the recovered slots into one output record and
//! serialize it. The record never re-exposes the pre-decode ciphertext.

use serde_json::Value;

use crate::error::Result;
use crate::model::{
    ConfigRecord, BOOK_CONFIG_KEY, CONFIG_ERROR_KEY, PAGES_BINDING, PAGES_ERROR_KEY, PAGES_KEY,
    PAGES_TYPE_INFO_KEY,
};
use crate::recover::{ConfigRecovery, Recovered};

pub fn assemble(config: ConfigRecovery, pages: Option<Recovered>) -> ConfigRecord {
    let ConfigRecovery {
        mut record,
        diagnostic,
    } = config;

    if let Some(message) = diagnostic {
        record.insert(CONFIG_ERROR_KEY.to_string(), Value::String(message));
    }

    if let Some(pages) = pages {
        // Whatever happens below supersedes a stale placeholder carried in
        // the base record under the platform's own field name.
        record.remove(PAGES_BINDING);
        match pages {
            Recovered::Structured(data) => {
                record.insert(PAGES_KEY.to_string(), data);
            }
            Recovered::Failed { message, .. } => {
                record.insert(PAGES_ERROR_KEY.to_string(), Value::String(message));
            }
            Recovered::Unrecognized(info) => {
                record.insert(PAGES_TYPE_INFO_KEY.to_string(), Value::String(info));
            }
        }
    }

    record.remove(BOOK_CONFIG_KEY);
    record
}

/// The program's one successful output: the record as a single JSON line.
pub fn to_json_line(record: &ConfigRecord) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}
