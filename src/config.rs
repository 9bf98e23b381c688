use serde::Deserialize;

use crate::{charset::Charsets, error::Error};

/// Where a listing comes from, which decides the dialects tried on it
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `LIST` output of an FTP server
    #[default]
    Ftp,
    /// An HTML autoindex page served over HTTP
    Http,
}

/// Settings shared by the listing parser and the path encoder.
///
/// Every entry point takes the configuration explicitly. It can be built
/// with the `with_*` setters or deserialized from any serde format.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server URL prefix, e.g. `ftp://example.org/pub/`
    pub host: String,
    /// Local encoding label. Names are handed out as UTF-8, so any other
    /// label is rejected when the charsets are resolved.
    pub iocharset: Option<String>,
    /// Server encoding label
    pub codepage: Option<String>,
    /// Block size reported for files, enables block accounting
    pub blksize: Option<u32>,
    /// Prepended to absolute symlink targets
    pub symlink_prefix: Option<String>,
    pub source: SourceKind,
    /// Verbosity of listing diagnostics, 0 disables them
    pub debug: u8,
}

impl Config {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_charsets(mut self, iocharset: &str, codepage: &str) -> Self {
        self.iocharset = Some(iocharset.to_owned());
        self.codepage = Some(codepage.to_owned());
        self
    }

    #[must_use]
    pub fn with_blksize(mut self, blksize: u32) -> Self {
        self.blksize = Some(blksize);
        self
    }

    #[must_use]
    pub fn with_symlink_prefix(mut self, prefix: &str) -> Self {
        self.symlink_prefix = Some(prefix.to_owned());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: u8) -> Self {
        self.debug = debug;
        self
    }

    /// Resolve the configured charset pair, `None` unless both are set
    pub fn charsets(&self) -> Result<Option<Charsets>, Error> {
        match (&self.iocharset, &self.codepage) {
            (Some(local), Some(server)) => Charsets::new(local, server).map(Some),
            _ => Ok(None),
        }
    }

    /// Symlink remap prefix, an empty one counts as unset
    #[must_use]
    pub fn symlink_prefix(&self) -> Option<&str> {
        self.symlink_prefix.as_deref().filter(|p| !p.is_empty())
    }

    /// Block size in use, zero counts as unset
    #[must_use]
    pub fn blksize(&self) -> Option<u32> {
        self.blksize.filter(|&b| b != 0)
    }

    #[must_use]
    pub fn is_http(&self) -> bool {
        self.source == SourceKind::Http
    }
}
