//! The whole pipeline: extract, recover each slot, assemble. One document
//! in, one record out; strictly sequential, no retries across stages.

use crate::decoder::PayloadDecoder;
use crate::error::Result;
use crate::extract::extract;
use crate::model::{ConfigRecord, ExtractedValue, Slot, PAGES_BINDING};
use crate::recover::{recover, recover_config};

pub fn process_document(doc: &str, decoder: &dyn PayloadDecoder) -> Result<ConfigRecord> {
    let extraction = extract(doc);

    let mut config = recover_config(extraction.config, decoder)?;

    // The page list may arrive through the document itself or nested inside
    // the just-decoded config; the extractor's finding takes priority.
    let pages_value = match extraction.pages {
        ExtractedValue::Missing => config
            .record
            .remove(PAGES_BINDING)
            .map(ExtractedValue::from_value)
            .unwrap_or(ExtractedValue::Missing),
        found => found,
    };

    let pages = match pages_value {
        ExtractedValue::Missing => None,
        value => Some(recover(value, Slot::Pages, decoder)),
    };

    Ok(crate::assemble::assemble(config, pages))
}
