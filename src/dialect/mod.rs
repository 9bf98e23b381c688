//! Listing line dialects.
//!
//! Every dialect turns one line into a [`Parsed`] entry or rejects it. The
//! dialects are tried in a fixed order and the first one that accepts a
//! line wins, so rejecting is cheap and never an error.
//!
//! Lines are raw bytes: names are handed on exactly as the server sent
//! them unless a charset pair recoded the line first.

mod apache;
mod netware;
mod unix;
mod windows;

use chrono::{DateTime, Utc};

use crate::{config::SourceKind, record::FileRecord};

/// Inputs a dialect needs besides the line itself
#[derive(Debug, Clone, Copy)]
pub struct Context {
    blksize: Option<u32>,
    now: DateTime<Utc>,
    debug: u8,
}

impl Context {
    /// `now` is the reference point for listings that omit the year.
    /// A zero block size turns block accounting off.
    #[must_use]
    pub fn new(blksize: Option<u32>, now: DateTime<Utc>, debug: u8) -> Self {
        Self {
            blksize: blksize.filter(|&b| b != 0),
            now,
            debug,
        }
    }
}

/// One accepted listing line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub name: Vec<u8>,
    /// Present when the line spells out a symlink target
    pub link: Option<Vec<u8>>,
    pub record: FileRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `ls -l` style
    Unix,
    /// IIS / DOS style
    Windows,
    /// Reserved, accepts nothing
    Netware,
    /// HTML autoindex
    Apache,
}

const FTP_CHAIN: [Dialect; 3] = [Dialect::Unix, Dialect::Windows, Dialect::Netware];
const HTTP_CHAIN: [Dialect; 1] = [Dialect::Apache];

impl Dialect {
    /// Dialects tried for a source, in order
    #[must_use]
    pub fn chain(source: SourceKind) -> &'static [Dialect] {
        match source {
            SourceKind::Ftp => &FTP_CHAIN,
            SourceKind::Http => &HTTP_CHAIN,
        }
    }

    #[must_use]
    pub fn parse(self, line: &[u8], ctx: &Context) -> Option<Parsed> {
        match self {
            Self::Unix => unix::parse(line, ctx),
            Self::Windows => windows::parse(line, ctx),
            Self::Netware => netware::parse(line, ctx),
            Self::Apache => apache::parse(line, ctx),
        }
    }
}

/// Parse a line with the first dialect of the chain that accepts it
#[must_use]
pub fn parse_line(source: SourceKind, line: &[u8], ctx: &Context) -> Option<Parsed> {
    Dialect::chain(source).iter().find_map(|dialect| {
        let parsed = dialect.parse(line, ctx)?;
        if ctx.debug >= 2 {
            trace!(
                "{:?}: {:?}",
                dialect,
                String::from_utf8_lossy(&parsed.name)
            );
        }
        Some(parsed)
    })
}

#[cfg(test)]
pub(crate) fn test_context() -> Context {
    use chrono::TimeZone;

    Context::new(None, Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(), 0)
}

#[cfg(test)]
mod test_dialect {
    use super::*;

    #[test]
    fn test_ftp_chain_order() {
        assert_eq!(
            Dialect::chain(SourceKind::Ftp),
            &[Dialect::Unix, Dialect::Windows, Dialect::Netware]
        );
        assert_eq!(Dialect::chain(SourceKind::Http), &[Dialect::Apache]);
    }

    #[test]
    fn test_first_match_wins() {
        let ctx = test_context();
        let unix = parse_line(
            SourceKind::Ftp,
            b"-rw-r--r-- 1 ftp ftp 42 Jan 1 2020 a.txt",
            &ctx,
        )
        .unwrap();
        assert_eq!(unix.name, b"a.txt");
        assert_eq!(unix.record.size, 42);

        let win = parse_line(SourceKind::Ftp, b"01-02-20  03:04PM  77  b.txt", &ctx).unwrap();
        assert_eq!(win.name, b"b.txt");
        assert_eq!(win.record.size, 77);
    }

    #[test]
    fn test_radix_sizes_fall_through_to_windows() {
        let ctx = test_context();
        let hex = parse_line(SourceKind::Ftp, b"01-02-20  03:04PM  0x1f  hex.bin", &ctx).unwrap();
        assert_eq!(hex.name, b"hex.bin");
        assert_eq!(hex.record.size, 31);
        assert_eq!(hex.record.nlink, 1);

        let oct = parse_line(SourceKind::Ftp, b"01-02-20  03:04PM  017  oct.bin", &ctx).unwrap();
        assert_eq!(oct.name, b"oct.bin");
        assert_eq!(oct.record.size, 15);
    }

    #[test]
    fn test_zero_blksize_disables_blocks() {
        let ctx = Context::new(Some(0), test_context().now, 0);
        let parsed = Dialect::Unix
            .parse(b"-rw-r--r-- 1 u g 5000 Jan 1 2020 f", &ctx)
            .unwrap();
        assert_eq!(parsed.record.blksize, None);
        assert_eq!(parsed.record.blocks, 0);
    }

    #[test]
    fn test_noise_is_rejected() {
        let ctx = test_context();
        for line in ["", "total 12", "226 Transfer complete", "   "] {
            assert_eq!(
                parse_line(SourceKind::Ftp, line.as_bytes(), &ctx),
                None,
                "{line:?}"
            );
        }
    }

    #[test]
    fn test_http_source_ignores_ftp_dialects() {
        let ctx = test_context();
        let line = b"-rw-r--r-- 1 ftp ftp 42 Jan 1 2020 a.txt";
        assert_eq!(parse_line(SourceKind::Http, line, &ctx), None);
    }
}
