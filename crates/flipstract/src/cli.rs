use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};

use flipstract_core::default_bundle_name;

#[derive(Parser, Debug)]
#[command(
    name = "flipstract",
    about = "Extract the embedded page/config payload from a published flipbook document"
)]
pub struct Cli {
    /// Generated document to extract from (config.js or full page source).
    pub input: PathBuf,
    /// Decoder capability bundle. Defaults to the platform library name
    /// next to the input document.
    #[arg(long)]
    pub decoder: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Cli {
    pub fn decoder_path(&self) -> PathBuf {
        if let Some(path) = &self.decoder {
            return path.clone();
        }
        self.input
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .join(default_bundle_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_defaults_next_to_input() {
        let cli = Cli::parse_from(["flipstract", "/books/abc/config.js"]);
        let bundle = cli.decoder_path();
        assert!(bundle.starts_with("/books/abc"));
        assert!(bundle.to_string_lossy().contains("destring"));
    }

    #[test]
    fn explicit_decoder_wins() {
        let cli = Cli::parse_from([
            "flipstract",
            "config.js",
            "--decoder",
            "/opt/decoders/libdestring.so",
        ]);
        assert_eq!(
            cli.decoder_path(),
            PathBuf::from("/opt/decoders/libdestring.so")
        );
    }

    #[test]
    fn bare_input_resolves_to_cwd() {
        let cli = Cli::parse_from(["flipstract", "config.js"]);
        assert!(cli.decoder_path().starts_with("."));
    }
}
