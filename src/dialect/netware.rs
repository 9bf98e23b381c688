use super::{Context, Parsed};

/// NetWare listings are recognised by name only; no line is ever accepted.
/// The slot stays in the FTP chain so the fallback order is explicit.
pub(super) fn parse(_line: &[u8], _ctx: &Context) -> Option<Parsed> {
    None
}
