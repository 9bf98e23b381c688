use once_cell::sync::Lazy;
use regex::bytes::Regex;

use super::{Context, Parsed};
use crate::{
    record::{FileRecord, FileType},
    utils::{self, group, Tm},
};

const DIR_MARKER: &[u8] = b"<DIR>";

/// `MM-DD-YY  HH:MMAM  <DIR>|size  name`
static LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?x-u)
        ^\s*(\S{1,8})[\x20\t]+  # date
        (\S{1,7})[\x20\t]+      # time
        (\S{1,32})[\x20\t]+     # size or <DIR>
        ([^\x20\t].*)$          # name
        ",
    )
    .ok()
});

pub(super) fn parse(line: &[u8], ctx: &Context) -> Option<Parsed> {
    let caps = LINE.as_ref()?.captures(line)?;
    let date = group(&caps, 1)?;
    let hour = group(&caps, 2)?;
    let size = group(&caps, 3)?;
    let file = group(&caps, 4)?;

    if ctx.debug >= 2 {
        trace!(
            "date: {} hour: {} size: {} file: {}",
            String::from_utf8_lossy(date),
            String::from_utf8_lossy(hour),
            String::from_utf8_lossy(size),
            String::from_utf8_lossy(file)
        );
    }

    let mut tm = Tm::midnight(ctx.now);
    let _ = utils::apply_short_date(&mut tm, date);
    let _ = utils::apply_meridiem_clock(&mut tm, hour);

    let mut record = FileRecord {
        nlink: 1,
        time: tm.timestamp(),
        ..Default::default()
    };

    if size == DIR_MARKER {
        record.kind = FileType::Dir;
    } else {
        record.kind = FileType::Regular;
        record.size = utils::parse_c_unsigned(size);
        if let Some(blksize) = ctx.blksize {
            record.blksize = Some(blksize);
            record.blocks = utils::blocks(record.size, blksize);
        }
    }

    Some(Parsed {
        name: file.to_vec(),
        link: None,
        record,
    })
}
