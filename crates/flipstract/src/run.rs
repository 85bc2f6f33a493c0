use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use flipstract_core::{process_document, to_json_line, NativeDecoder, READY_TIMEOUT};

use crate::logging;

/// Sequential pipeline run: read the document, bring up the decode
/// capability (bounded wait), process, serialize. Any error here reaches
/// `main` and turns into a non-zero exit with nothing on stdout.
pub fn run(input: &Path, decoder_bundle: &Path) -> Result<String> {
    let doc = fs::read_to_string(input)
        .with_context(|| format!("failed to read input document {}", input.display()))?;
    logging::verbose(format!("read {} bytes from {}", doc.len(), input.display()));

    logging::stage("decoder", format!("loading bundle {}", decoder_bundle.display()));
    let decoder = NativeDecoder::load(decoder_bundle, READY_TIMEOUT)
        .with_context(|| format!("decode capability at {}", decoder_bundle.display()))?;

    logging::stage("extract", "recovering payload");
    let record = process_document(&doc, &decoder)?;
    logging::stage("assemble", format!("{} fields in output record", record.len()));

    Ok(to_json_line(&record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn missing_input_fails_before_decoder_load() {
        let err = run(
            Path::new("/nonexistent/config.js"),
            Path::new("/nonexistent/libdestring.so"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to read input document"));
    }

    #[test]
    fn missing_decoder_bundle_fails() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("config.js");
        let mut file = fs::File::create(&input).unwrap();
        writeln!(file, r#"var fliphtml5_pages = [{{"id":1}}];"#).unwrap();
        let err = run(&input, &dir.path().join("libdestring.so")).unwrap_err();
        assert!(err.to_string().contains("decode capability"));
    }
}
