use once_cell::sync::Lazy;
use regex::bytes::Regex;

use super::{Context, Parsed};
use crate::{
    record::{FileMode, FileRecord, FileType},
    utils::{self, group, Tm, MONTHS},
};

/// Leading bytes of link target and link text that have to agree
const NAME_CHECK_LEN: usize = 10;

/// `<A ... HREF="href" ...>text</A> DD-Mon-YYYY HH:MM size`, matched
/// against folded markup from its first `<A `
static ANCHOR: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"(?x-u)
        ^<A[^H]+HREF="
        ([^"<>]+)["<][^>]*>     # href, then the rest of the tag
        ([^<]+)</A>\s*          # link text
        (\d{1,2})-([^-]+)-      # day, month
        (\d{1,4})\s*            # year
        (\d+):(\d+)\s+          # hour, minute
        (\S+)                   # size
        "#,
    )
    .ok()
});

static FRACTIONAL_SIZE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?-u)^(\d+)\.(\d+)([kKmMgG])").ok());

static UNIT_SIZE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?-u)^(\d+)([kKmMgG])").ok());

static PLAIN_SIZE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?-u)^\d+").ok());

/// Upper-case everything outside quoted spans so tag and attribute names
/// match in any case. A `'` or `"` toggles the quoted state.
fn fold_markup(line: &[u8]) -> Vec<u8> {
    let mut quoted = false;
    line.iter()
        .map(|&b| {
            if b == b'"' || b == b'\'' {
                quoted = !quoted;
            }
            if quoted {
                b
            } else {
                b.to_ascii_uppercase()
            }
        })
        .collect()
}

fn unit_bytes(unit: &[u8]) -> i64 {
    match unit.first().map(u8::to_ascii_uppercase) {
        Some(b'K') => 1 << 10,
        Some(b'M') => 1 << 20,
        Some(b'G') => 1 << 30,
        _ => 1,
    }
}

/// `1.5M`
fn fractional_size(text: &[u8]) -> Option<i64> {
    let caps = FRACTIONAL_SIZE.as_ref()?.captures(text)?;
    let whole = utils::number(group(&caps, 1)?)?;
    let tenth = utils::number(group(&caps, 2)?)?;
    let unit = unit_bytes(group(&caps, 3)?);

    Some(
        whole
            .saturating_mul(unit)
            .saturating_add(tenth.saturating_mul(unit) / 10),
    )
}

/// `12K`
fn unit_size(text: &[u8]) -> Option<i64> {
    let caps = UNIT_SIZE.as_ref()?.captures(text)?;
    let whole = utils::number(group(&caps, 1)?)?;

    Some(whole.saturating_mul(unit_bytes(group(&caps, 2)?)))
}

/// `1234`
fn plain_size(text: &[u8]) -> Option<i64> {
    utils::number(PLAIN_SIZE.as_ref()?.find(text)?.as_bytes())
}

/// Byte count of an autoindex size column, 0 when it is not a size (`-`)
pub(super) fn parse_size(text: &[u8]) -> u64 {
    fractional_size(text)
        .or_else(|| unit_size(text))
        .or_else(|| plain_size(text))
        .and_then(|size| u64::try_from(size).ok())
        .unwrap_or(0)
}

/// Zero based month, 12 when the name is not an English abbreviation
fn month_number(name: &[u8]) -> i64 {
    let mut month = 0;
    while month < MONTHS.len() {
        if MONTHS[month].as_bytes().eq_ignore_ascii_case(name) {
            break;
        }
        month += 1;
    }

    i64::try_from(month).unwrap_or_default()
}

struct Anchor<'a> {
    href: &'a [u8],
    text: &'a [u8],
    tm: Tm,
    size: &'a [u8],
}

fn scan_anchor(markup: &[u8]) -> Option<Anchor<'_>> {
    let start = markup.windows(3).position(|w| w == b"<A ")?;
    let caps = ANCHOR.as_ref()?.captures(&markup[start..])?;

    Some(Anchor {
        href: group(&caps, 1)?,
        text: group(&caps, 2)?,
        tm: Tm {
            year: utils::number(group(&caps, 5)?)?,
            mon: month_number(group(&caps, 4)?),
            mday: utils::number(group(&caps, 3)?)?,
            hour: utils::number(group(&caps, 6)?)?,
            min: utils::number(group(&caps, 7)?)?,
        },
        size: group(&caps, 8)?,
    })
}

fn same_name(href: &[u8], text: &[u8]) -> bool {
    let href = &href[..href.len().min(NAME_CHECK_LEN)];
    let text = &text[..text.len().min(NAME_CHECK_LEN)];
    href.eq_ignore_ascii_case(text)
}

pub(super) fn parse(line: &[u8], ctx: &Context) -> Option<Parsed> {
    let markup = fold_markup(line);
    let anchor = scan_anchor(&markup)?;

    // navigation links and column headers point elsewhere than they read
    if !same_name(anchor.href, anchor.text) {
        return None;
    }

    if ctx.debug >= 2 {
        trace!(
            "href: {} size: {}",
            String::from_utf8_lossy(anchor.href),
            String::from_utf8_lossy(anchor.size)
        );
    }

    let mut record = FileRecord {
        kind: FileType::Regular,
        mode: FileMode::READ,
        nlink: 1,
        size: parse_size(anchor.size),
        time: anchor.tm.timestamp(),
        ..Default::default()
    };

    let name = match anchor.href.strip_suffix(b"/") {
        Some(dir) => {
            record.kind = FileType::Dir;
            record.mode |= FileMode::EXEC;
            dir
        }
        None => anchor.href,
    };

    Some(Parsed {
        name: name.to_vec(),
        link: None,
        record,
    })
}
