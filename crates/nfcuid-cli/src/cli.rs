//! Command-line arguments.
//!
//! Flags override the values read from the configuration file; a flag that
//! is not given leaves the file value untouched.

use clap::Parser;
use nfcuid_core::constants::DEFAULT_CONFIG_FILE;
use nfcuid_core::{CharFlag, Config};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "nfcuid",
    version,
    about = "Types the UID of NFC cards presented to a PC/SC reader"
)]
pub struct Args {
    /// Reader number (1-based); 0 asks on start-up
    #[arg(long)]
    pub device: Option<usize>,

    /// Upper-case hex output
    #[arg(long)]
    pub caps_lock: bool,

    /// Reverse the UID byte order
    #[arg(long)]
    pub reverse: bool,

    /// Decimal output for 4-byte UIDs
    #[arg(long)]
    pub decimal: bool,

    /// Zero-pad decimal output to this many digits
    #[arg(long)]
    pub decimal_padding: Option<usize>,

    /// Character typed after the UID (none, space, tab, hyphen, enter, semicolon, colon, comma)
    #[arg(long)]
    pub end_char: Option<CharFlag>,

    /// Character typed between UID bytes in hex output
    #[arg(long)]
    pub in_char: Option<CharFlag>,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Directory for the log file
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Log to stdout only
    #[arg(long)]
    pub no_log_file: bool,

    /// Set by a self-restart
    #[arg(long, hide = true)]
    pub auto_restart: bool,
}

impl Args {
    /// Overlay the given flags on `config` and validate the result.
    pub fn apply(&self, mut config: Config) -> nfcuid_core::Result<Config> {
        let nfc = &mut config.nfc;
        if let Some(device) = self.device {
            nfc.device = device;
        }
        if self.caps_lock {
            nfc.caps_lock = true;
        }
        if self.reverse {
            nfc.reverse = true;
        }
        if self.decimal {
            nfc.decimal = true;
        }
        if let Some(padding) = self.decimal_padding {
            nfc.decimal_padding = padding;
        }
        if let Some(end_char) = self.end_char {
            nfc.end_char = end_char;
        }
        if let Some(in_char) = self.in_char {
            nfc.in_char = in_char;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load the configuration file and apply the flags.
    pub fn load_config(&self) -> nfcuid_core::Result<Config> {
        self.apply(Config::load(&self.config)?)
    }
}
