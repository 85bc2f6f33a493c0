mod assemble;
mod decoder;
mod error;
mod extract;
mod literal;
mod model;
mod pipeline;
mod recover;

pub use assemble::{assemble, to_json_line};
pub use decoder::{
    default_bundle_name, CapabilityState, NativeDecoder, PayloadDecoder, READY_TIMEOUT,
};
pub use error::{FlipError, Result};
pub use extract::{extract, Extraction};
pub use literal::parse_loose;
pub use model::{
    ConfigRecord, ExtractedValue, Slot, BOOK_CONFIG_KEY, CONFIG_BINDING, CONFIG_ERROR_KEY,
    ENCODED_PAGES_MARKER, PAGES_BINDING, PAGES_ERROR_KEY, PAGES_KEY, PAGES_TYPE_INFO_KEY,
};
pub use pipeline::process_document;
pub use recover::{classify, recover, recover_config, repair_truncation, ConfigRecovery, Recovered};
