use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;

use crate::error::Error;

/// The encoding the server speaks, paired with the local one.
///
/// Local text is what Rust strings hold, so the local label has to name
/// UTF-8. Only the server side is ever recoded.
#[derive(Debug, Clone, Copy)]
pub struct Charsets {
    server: &'static Encoding,
}

fn lookup(label: &str) -> Result<&'static Encoding, Error> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::UnknownCharset(label.to_owned()))
}

fn text_bytes(text: Cow<'_, str>) -> Cow<'_, [u8]> {
    match text {
        Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
        Cow::Owned(text) => Cow::Owned(text.into_bytes()),
    }
}

impl Charsets {
    pub fn new(local: &str, server: &str) -> Result<Self, Error> {
        let local_encoding = lookup(local)?;
        if local_encoding != UTF_8 {
            return Err(Error::LocalCharset(local.to_owned()));
        }

        Ok(Self {
            server: lookup(server)?,
        })
    }

    /// Decode bytes received from the server into UTF-8
    #[must_use]
    pub fn to_local<'b>(&self, bytes: &'b [u8]) -> Cow<'b, [u8]> {
        if self.server == UTF_8 {
            return Cow::Borrowed(bytes);
        }

        let (text, had_errors) = self.server.decode_without_bom_handling(bytes);
        if had_errors {
            trace!("malformed {} input replaced", self.server.name());
        }
        text_bytes(text)
    }

    /// Encode UTF-8 text for the server. Bytes that are not UTF-8 are
    /// already in some other encoding and go out unchanged.
    #[must_use]
    pub fn to_server<'b>(&self, bytes: &'b [u8]) -> Cow<'b, [u8]> {
        let Ok(text) = std::str::from_utf8(bytes) else {
            return Cow::Borrowed(bytes);
        };

        let (encoded, _, unmappable) = self.server.encode(text);
        if unmappable {
            trace!("{} cannot represent {:?}", self.server.name(), text);
        }
        encoded
    }
}
