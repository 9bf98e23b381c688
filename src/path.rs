//! Server paths and URLs built from virtual filesystem paths.
//!
//! Virtual paths always start with `/`. Everything handed back is
//! percent-encoded with upper-case hex digits and owned by the caller.

use std::{borrow::Cow, fmt::Write};

use crate::{charset::Charsets, config::Config, error::Error};

/// Kept as is by the path builders
fn is_path_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b':' | b'/')
}

/// RFC 3986 unreserved characters plus the path separator
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'/')
}

fn encode_into(out: &mut String, bytes: &[u8], keep: fn(u8) -> bool) {
    for &b in bytes {
        if keep(b) {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
}

fn encode(bytes: &[u8], keep: fn(u8) -> bool) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    encode_into(&mut out, bytes, keep);
    out
}

/// Builds server paths for one configured host
#[derive(Debug, Clone)]
pub struct PathEncoder<'a> {
    host: &'a str,
    charsets: Option<Charsets>,
}

impl<'a> PathEncoder<'a> {
    pub fn new(config: &'a Config) -> Result<Self, Error> {
        Ok(Self {
            host: &config.host,
            charsets: config.charsets()?,
        })
    }

    fn to_server<'p>(&self, path: &'p [u8]) -> Cow<'p, [u8]> {
        match &self.charsets {
            Some(charsets) if !path.is_empty() => charsets.to_server(path),
            _ => Cow::Borrowed(path),
        }
    }

    fn relative(path: &[u8]) -> Result<&[u8], Error> {
        path.strip_prefix(b"/")
            .ok_or_else(|| Error::InvalidPath(String::from_utf8_lossy(path).into_owned()))
    }

    fn with_host(&self, path: &[u8], trailing: bool) -> String {
        let mut full = Vec::with_capacity(self.host.len() + path.len() + 1);
        full.extend_from_slice(self.host.as_bytes());
        full.extend_from_slice(path);
        if trailing && !path.is_empty() {
            full.push(b'/');
        }

        encode(&full, is_path_safe)
    }

    /// Last component of `path`
    #[must_use]
    pub fn file_name<P: AsRef<[u8]>>(&self, path: P) -> String {
        let path = path.as_ref();
        let name = path
            .iter()
            .rposition(|&b| b == b'/')
            .map_or(path, |at| &path[at + 1..]);
        encode(&self.to_server(name), is_path_safe)
    }

    /// URL of the file at `path`
    pub fn full_path<P: AsRef<[u8]>>(&self, path: P) -> Result<String, Error> {
        let path = Self::relative(path.as_ref())?;
        Ok(self.with_host(&self.to_server(path), false))
    }

    /// URL of the directory at `path`, with a trailing separator
    pub fn full_dir_path<P: AsRef<[u8]>>(&self, path: P) -> Result<String, Error> {
        let path = Self::relative(path.as_ref())?;
        Ok(self.with_host(&self.to_server(path), true))
    }

    /// URL of the directory containing `path`
    pub fn dir_path<P: AsRef<[u8]>>(&self, path: P) -> Result<String, Error> {
        let path = Self::relative(path.as_ref())?;
        let parent = path
            .iter()
            .rposition(|&b| b == b'/')
            .map_or(&path[..0], |at| &path[..at]);
        Ok(self.with_host(&self.to_server(parent), true))
    }

    /// Encode a URL already prefixed with the host; the host part is copied
    /// verbatim.
    #[must_use]
    pub fn to_uri<U: AsRef<[u8]>>(&self, url: U) -> String {
        let url = url.as_ref();
        let mut out = String::with_capacity(url.len() * 3);
        let rest = match url.strip_prefix(self.host.as_bytes()) {
            Some(rest) => {
                out.push_str(self.host);
                rest
            }
            None => url,
        };

        encode_into(&mut out, rest, is_unreserved);
        out
    }
}
