use once_cell::sync::Lazy;
use regex::bytes::{Captures, Regex};

use super::{Context, Parsed};
use crate::{
    record::{FileMode, FileRecord, FileType},
    utils::{self, group, Tm},
};

const LINK_MARKER: &[u8] = b" -> ";

/// `mode nlink user group size month day year|time name`.
/// Exactly one blank follows the date, the name keeps any further ones.
static FULL: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?x-u)
        ^\s*(\S{1,11})\s+       # mode
        (\d+)[\x20\t]+          # link count
        \S{1,32}[\x20\t]+       # user
        \S{1,32}[\x20\t]+       # group
        (\d+)[\x20\t]+          # size
        (\S{1,3})[\x20\t]+      # month
        (\S{1,2})[\x20\t]+      # day
        (\S{1,5})[\x20\t]       # year or time
        (.+)$                   # name
        ",
    )
    .ok()
});

/// Same without the link count, which some servers leave out
static SHORT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?x-u)
        ^\s*(\S{1,11})\s+
        \S{1,32}[\x20\t]+
        \S{1,32}[\x20\t]+
        (\d+)[\x20\t]+
        (\S{1,3})[\x20\t]+
        (\S{1,2})[\x20\t]+
        (\S{1,5})[\x20\t]
        (.+)$
        ",
    )
    .ok()
});

struct Fields<'a> {
    mode: &'a [u8],
    nlink: u64,
    size: u64,
    month: &'a [u8],
    day: &'a [u8],
    year: &'a [u8],
    file: &'a [u8],
}

fn unsigned(digits: &[u8]) -> u64 {
    digits.iter().fold(0u64, |acc, &d| {
        acc.saturating_mul(10)
            .saturating_add(u64::from(d.wrapping_sub(b'0')))
    })
}

/// `caps` holds mode, size and the date and name groups from `first`
fn fields<'a>(caps: &Captures<'a>, nlink: u64, first: usize) -> Option<Fields<'a>> {
    Some(Fields {
        mode: group(caps, 1)?,
        nlink,
        size: unsigned(group(caps, first)?),
        month: group(caps, first + 1)?,
        day: group(caps, first + 2)?,
        year: group(caps, first + 3)?,
        file: group(caps, first + 4)?,
    })
}

fn scan(line: &[u8]) -> Option<Fields<'_>> {
    if let Some(caps) = FULL.as_ref()?.captures(line) {
        let nlink = unsigned(group(&caps, 2)?);
        return fields(&caps, nlink, 3);
    }

    let caps = SHORT.as_ref()?.captures(line)?;
    fields(&caps, 1, 2)
}

/// Type from the first mode character, permissions from the next nine.
/// Any character other than `-` grants the bit, missing ones do not.
pub(super) fn parse_mode(mode: &[u8]) -> (FileType, FileMode) {
    let kind = match mode.first() {
        Some(b'd') => FileType::Dir,
        Some(b'l') => FileType::Symlink,
        _ => FileType::Regular,
    };

    let bits = mode
        .iter()
        .skip(1)
        .take(9)
        .enumerate()
        .filter(|&(_, &c)| c != b'-')
        .fold(0u32, |bits, (i, _)| bits | 1u32 << (8 - i));

    (kind, FileMode::from_bits_truncate(bits))
}

fn split_link(file: &[u8]) -> (&[u8], Option<&[u8]>) {
    match file
        .windows(LINK_MARKER.len())
        .position(|w| w == LINK_MARKER)
    {
        Some(at) => (&file[..at], Some(&file[at + LINK_MARKER.len()..])),
        None => (file, None),
    }
}

fn timestamp(fields: &Fields<'_>, ctx: &Context) -> i64 {
    let mut tm = Tm::midnight(ctx.now);

    if fields.year.contains(&b':') {
        let current = tm.mon;
        let _ = utils::apply_clock(&mut tm, fields.year)
            .and_then(|()| utils::apply_month_day(&mut tm, fields.month, fields.day));

        // the year is only left out for roughly the last six months
        if current + 5 < tm.mon {
            if ctx.debug >= 2 {
                trace!("correct year: cur_mon: {}, file_mon: {}", current, tm.mon);
            }
            tm.year -= 1;
        }
    } else {
        let _ = utils::apply_year(&mut tm, fields.year)
            .and_then(|()| utils::apply_month_day(&mut tm, fields.month, fields.day));
    }

    tm.timestamp()
}

pub(super) fn parse(line: &[u8], ctx: &Context) -> Option<Parsed> {
    let fields = scan(line)?;
    let (name, link) = split_link(fields.file);

    let (kind, mode) = parse_mode(fields.mode);
    let mut record = FileRecord {
        kind,
        mode,
        nlink: fields.nlink,
        size: fields.size,
        time: timestamp(&fields, ctx),
        ..Default::default()
    };

    if let Some(blksize) = ctx.blksize {
        record.blksize = Some(blksize);
        record.blocks = utils::blocks(fields.size, blksize);
    }

    Some(Parsed {
        name: name.to_vec(),
        link: link.map(<[u8]>::to_vec),
        record,
    })
}
