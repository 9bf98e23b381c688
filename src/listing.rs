use chrono::{DateTime, Utc};
use std::{borrow::Cow, collections::VecDeque};

use crate::{
    charset::Charsets,
    config::Config,
    dialect::{self, Context, Parsed},
    error::Error,
    record::FileRecord,
};

/// Write side of the attribute cache.
///
/// Paths and link targets are bytes as the server sent them, recoded only
/// when a charset pair is configured. Implementations are shared between
/// concurrent filesystem requests and synchronise internally.
pub trait CacheWriter {
    /// Store the attributes of `path`
    fn add_attr(&self, path: &[u8], record: &FileRecord);

    /// Store the target of the symlink at `path`
    fn add_link(&self, path: &[u8], target: &[u8]);

    /// Nothing is written while disabled
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Receives every entry while a whole directory is enumerated
pub trait Filler {
    fn fill(&mut self, name: &[u8], record: &FileRecord);
}

impl<F> Filler for F
where
    F: FnMut(&[u8], &FileRecord),
{
    fn fill(&mut self, name: &[u8], record: &FileRecord) {
        self(name, record);
    }
}

/// What a caller wants out of one listing.
///
/// With a filler the whole directory is enumerated, otherwise entries go to
/// the cache. A named entry is resolved in either mode.
#[derive(Default)]
pub struct Request<'r> {
    name: Option<&'r [u8]>,
    record: Option<&'r mut FileRecord>,
    link: Option<(&'r mut Vec<u8>, usize)>,
    filler: Option<&'r mut dyn Filler>,
}

impl<'r> Request<'r> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry to resolve, the empty name is the directory itself
    #[must_use]
    pub fn name<N: AsRef<[u8]> + ?Sized>(mut self, name: &'r N) -> Self {
        self.name = Some(name.as_ref());
        self
    }

    /// Receives the attributes of the resolved entry
    #[must_use]
    pub fn record(mut self, record: &'r mut FileRecord) -> Self {
        self.record = Some(record);
        self
    }

    /// Receives symlink targets, at most `capacity - 1` bytes of them
    #[must_use]
    pub fn link(mut self, buf: &'r mut Vec<u8>, capacity: usize) -> Self {
        self.link = Some((buf, capacity));
        self
    }

    #[must_use]
    pub fn filler(mut self, filler: &'r mut dyn Filler) -> Self {
        self.filler = Some(filler);
        self
    }
}

/// Replace `buf` with as much of `target` as a C buffer of `capacity`
/// bytes would hold
fn copy_link(buf: &mut Vec<u8>, target: &[u8], capacity: usize) {
    if capacity == 0 {
        return;
    }

    let len = target.len().min(capacity - 1);
    buf.clear();
    buf.extend_from_slice(&target[..len]);
}

/// Interprets directory listings received from the server
pub struct ListingParser<'a> {
    config: &'a Config,
    charsets: Option<Charsets>,
    cache: Option<&'a dyn CacheWriter>,
    now: Option<DateTime<Utc>>,
}

impl<'a> ListingParser<'a> {
    pub fn new(config: &'a Config) -> Result<Self, Error> {
        Ok(Self {
            config,
            charsets: config.charsets()?,
            cache: None,
            now: None,
        })
    }

    #[must_use]
    pub fn with_cache(mut self, cache: &'a dyn CacheWriter) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fix the clock used to complete dates without a year
    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn context(&self) -> Context {
        Context::new(
            self.config.blksize(),
            self.now.unwrap_or_else(Utc::now),
            self.config.debug,
        )
    }

    fn cache(&self) -> Option<&'a dyn CacheWriter> {
        self.cache.filter(|cache| cache.is_enabled())
    }

    /// Move absolute targets under the configured prefix
    fn resolve_link<'l>(&self, link: &'l [u8]) -> Cow<'l, [u8]> {
        match self.config.symlink_prefix() {
            Some(prefix) if link.starts_with(b"/") => {
                Cow::Owned([prefix.as_bytes(), link].concat())
            }
            _ => Cow::Borrowed(link),
        }
    }

    /// Server bytes in local form; without charsets they pass unchanged
    fn decode<'l>(&self, line: &'l [u8]) -> Cow<'l, [u8]> {
        match &self.charsets {
            Some(charsets) => charsets.to_local(line),
            None => Cow::Borrowed(line),
        }
    }

    /// Parse a single line with the dialects of the configured source
    #[must_use]
    pub fn parse_line<L: AsRef<[u8]>>(&self, line: L) -> Option<Parsed> {
        let line = self.decode(line.as_ref());
        dialect::parse_line(self.config.source, &line, &self.context())
    }

    fn scan(&self, list: &[u8], dir: &[u8], request: &mut Request<'_>) -> bool {
        let ctx = self.context();
        let mut found = false;

        // an unterminated last line is a truncated transfer
        let lines = list
            .split_inclusive(|&b| b == b'\n')
            .filter_map(|line| line.strip_suffix(b"\n"))
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

        for line in lines {
            let line = self.decode(line);
            let Some(Parsed { name, link, record }) =
                dialect::parse_line(self.config.source, &line, &ctx)
            else {
                continue;
            };

            let full_path = [dir, name.as_slice()].concat();

            if let Some(link) = link.as_deref().filter(|l| !l.is_empty()) {
                let target = self.resolve_link(link);
                if let Some(cache) = self.cache() {
                    cache.add_link(&full_path, &target);
                    if self.config.debug >= 1 {
                        debug!(
                            "cache_add_link: {} {}",
                            String::from_utf8_lossy(&full_path),
                            String::from_utf8_lossy(&target)
                        );
                    }
                }
                if let Some((buf, capacity)) = request.link.as_mut() {
                    copy_link(buf, &target, *capacity);
                }
            }

            if let Some(filler) = request.filler.as_mut() {
                if self.config.debug >= 1 {
                    debug!("filler: {}", String::from_utf8_lossy(&name));
                }
                filler.fill(&name, &record);
            } else if let Some(cache) = self.cache() {
                if self.config.debug >= 1 {
                    debug!("cache_add_attr: {}", String::from_utf8_lossy(&full_path));
                }
                cache.add_attr(&full_path, &record);
            }

            if self.config.debug >= 2 {
                trace!(
                    "comparing {:?} {}",
                    request.name.map(String::from_utf8_lossy),
                    String::from_utf8_lossy(&name)
                );
            }
            if request.name == Some(name.as_slice()) {
                if let Some(out) = request.record.as_mut() {
                    **out = record;
                }
                found = true;
            }
        }

        found
    }

    /// Walk `list`, the listing of directory `dir` (which ends in `/`),
    /// and serve `request` from it.
    ///
    /// Lines no dialect accepts are skipped. Fails only when a named entry
    /// was requested and the listing does not contain it.
    pub fn resolve_or_enumerate<D: AsRef<[u8]>>(
        &self,
        list: &[u8],
        dir: D,
        mut request: Request<'_>,
    ) -> Result<(), Error> {
        match request.name {
            Some([]) => {
                if let Some(out) = request.record {
                    *out = FileRecord::root();
                }
                Ok(())
            }
            Some(name) => {
                if self.scan(list, dir.as_ref(), &mut request) {
                    Ok(())
                } else {
                    Err(Error::NotFound(String::from_utf8_lossy(name).into_owned()))
                }
            }
            None => {
                let _ = self.scan(list, dir.as_ref(), &mut request);
                Ok(())
            }
        }
    }

    /// Attributes of `name`, populating the cache with the rest
    pub fn stat<D, N>(&self, list: &[u8], dir: D, name: &N) -> Result<FileRecord, Error>
    where
        D: AsRef<[u8]>,
        N: AsRef<[u8]> + ?Sized,
    {
        let mut record = FileRecord::default();
        self.resolve_or_enumerate(list, dir, Request::new().name(name).record(&mut record))?;
        Ok(record)
    }

    /// Every entry of the listing
    #[must_use]
    pub fn read_dir<D: AsRef<[u8]>>(&self, list: &[u8], dir: D) -> ReadDir {
        let mut entries = ReadDir::default();
        let _ = self.scan(list, dir.as_ref(), &mut Request::new().filler(&mut entries));
        entries
    }
}

/// Entries returned by the [`ReadDir`] iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: Vec<u8>,
    record: FileRecord,
}

impl DirEntry {
    /// Returns the file name for the file that this entry points at.
    #[must_use]
    pub fn file_name(&self) -> &[u8] {
        &self.name
    }

    /// The file name for display, undecodable bytes replaced
    #[must_use]
    pub fn file_name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Returns the metadata for the file that this entry points at.
    #[must_use]
    pub fn metadata(&self) -> FileRecord {
        self.record
    }
}

/// Iterator over the entries of an enumerated listing.
#[derive(Debug, Default)]
pub struct ReadDir {
    entries: VecDeque<(Vec<u8>, FileRecord)>,
}

impl Filler for ReadDir {
    fn fill(&mut self, name: &[u8], record: &FileRecord) {
        self.entries.push_back((name.to_vec(), *record));
    }
}

impl Iterator for ReadDir {
    type Item = DirEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (name, record) = self.entries.pop_front()?;
            if name != b"." && name != b".." {
                return Some(DirEntry { name, record });
            }
        }
    }
}

#[cfg(test)]
mod test_listing {
    use chrono::TimeZone;

    use super::*;
    use crate::{cache::MemoryCache, config::SourceKind, record::FileType};

    const UNIX_LIST: &[u8] = b"total 12\r\n\
drwxr-xr-x   2 ftp      ftp          4096 Jan 10  2023 pub\r\n\
-rw-r--r--   1 ftp      ftp         12345 Mar  2 09:30 readme.txt\r\n\
lrwxrwxrwx   1 ftp      ftp             3 Feb  1  2022 latest -> /srv/pub\r\n\
lrwxrwxrwx   1 ftp      ftp             3 Feb  1  2022 rel -> pub\r\n";

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn names(entries: ReadDir) -> Vec<Vec<u8>> {
        entries.map(|entry| entry.file_name().to_vec()).collect()
    }

    #[test]
    fn test_empty_name_is_root() {
        init();
        let config = Config::new("ftp://example.org/");
        let parser = ListingParser::new(&config).unwrap();

        let mut record = FileRecord::default();
        parser
            .resolve_or_enumerate(
                b"garbage\n",
                "/",
                Request::new().name("").record(&mut record),
            )
            .unwrap();
        assert_eq!(record, FileRecord::root());
        assert_eq!(record.st_mode(), 0o40755);
    }

    #[test]
    fn test_empty_listing_is_not_found() {
        init();
        let config = Config::new("ftp://example.org/");
        let parser = ListingParser::new(&config).unwrap();

        let err = parser.stat(b"", "/", "x").unwrap_err();
        assert_eq!(err, Error::NotFound("x".to_owned()));
        assert!(parser.resolve_or_enumerate(b"", "/", Request::new()).is_ok());
    }

    #[test]
    fn test_stat_populates_cache() {
        init();
        let config = Config::new("ftp://example.org/").with_debug(2);
        let cache = MemoryCache::new();
        let parser = ListingParser::new(&config)
            .unwrap()
            .with_cache(&cache)
            .at(now());

        let record = parser.stat(UNIX_LIST, "/dir/", "readme.txt").unwrap();
        assert!(record.is_regular());
        assert_eq!(record.size, 12345);
        assert_eq!(
            record.time,
            Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap().timestamp()
        );

        assert_eq!(cache.len(), 4);
        assert!(cache.attr("/dir/pub").unwrap().is_dir());
        assert_eq!(cache.link("/dir/latest").as_deref(), Some(&b"/srv/pub"[..]));
        assert_eq!(cache.link("/dir/rel").as_deref(), Some(&b"pub"[..]));
        assert!(cache.attr("/dir/latest").unwrap().is_symlink());
    }

    #[test]
    fn test_missing_entry() {
        init();
        let config = Config::new("ftp://example.org/");
        let parser = ListingParser::new(&config).unwrap();

        let mut record = FileRecord::root();
        let err = parser
            .resolve_or_enumerate(
                UNIX_LIST,
                "/",
                Request::new().name("nope").record(&mut record),
            )
            .unwrap_err();
        assert_eq!(err, Error::NotFound("nope".to_owned()));
        assert_eq!(record, FileRecord::root());
    }

    #[test]
    fn test_enumerate_skips_cache_attrs() {
        init();
        let config = Config::new("ftp://example.org/");
        let cache = MemoryCache::new();
        let parser = ListingParser::new(&config).unwrap().with_cache(&cache);

        let mut seen = Vec::new();
        let mut filler = |name: &[u8], record: &FileRecord| seen.push((name.to_vec(), record.kind));
        parser
            .resolve_or_enumerate(UNIX_LIST, "/", Request::new().filler(&mut filler))
            .unwrap();

        assert_eq!(
            seen,
            vec![
                (b"pub".to_vec(), FileType::Dir),
                (b"readme.txt".to_vec(), FileType::Regular),
                (b"latest".to_vec(), FileType::Symlink),
                (b"rel".to_vec(), FileType::Symlink),
            ]
        );
        // links are still cached while enumerating
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.attr("/latest"), None);
        assert_eq!(cache.link("/latest").as_deref(), Some(&b"/srv/pub"[..]));
    }

    #[test]
    fn test_enumerate_and_resolve_together() {
        init();
        let config = Config::new("ftp://example.org/");
        let parser = ListingParser::new(&config).unwrap();

        let mut count = 0;
        let mut filler = |_: &[u8], _: &FileRecord| count += 1;
        let mut record = FileRecord::default();
        parser
            .resolve_or_enumerate(
                UNIX_LIST,
                "/",
                Request::new()
                    .name("pub")
                    .record(&mut record)
                    .filler(&mut filler),
            )
            .unwrap();
        assert_eq!(count, 4);
        assert!(record.is_dir());
    }

    #[test]
    fn test_disabled_cache_is_untouched() {
        init();
        let config = Config::new("ftp://example.org/");
        let cache = MemoryCache::disabled();
        let parser = ListingParser::new(&config).unwrap().with_cache(&cache);

        let _ = parser.stat(UNIX_LIST, "/", "pub").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_symlink_prefix_and_link_buffer() {
        init();
        let config = Config::new("ftp://example.org/").with_symlink_prefix("/mnt/ftp");
        let cache = MemoryCache::new();
        let parser = ListingParser::new(&config).unwrap().with_cache(&cache);
        let list = b"lrwxrwxrwx 1 a a 5 Jan 1 2020 foo -> /srv/bar\n";

        let mut link = Vec::new();
        parser
            .resolve_or_enumerate(list, "/", Request::new().name("foo").link(&mut link, 1024))
            .unwrap();
        assert_eq!(link, b"/mnt/ftp/srv/bar");
        assert_eq!(
            cache.link("/foo").as_deref(),
            Some(&b"/mnt/ftp/srv/bar"[..])
        );

        let mut link = Vec::new();
        parser
            .resolve_or_enumerate(list, "/", Request::new().name("foo").link(&mut link, 5))
            .unwrap();
        assert_eq!(link, b"/mnt");

        let mut link = b"untouched".to_vec();
        parser
            .resolve_or_enumerate(list, "/", Request::new().link(&mut link, 0))
            .unwrap();
        assert_eq!(link, b"untouched");
    }

    #[test]
    fn test_later_symlink_overwrites_link_buffer() {
        init();
        let config = Config::new("ftp://example.org/");
        let parser = ListingParser::new(&config).unwrap();
        let list = b"lrwxrwxrwx 1 a a 5 Jan 1 2020 first -> one\n\
-rw-r--r-- 1 a a 5 Jan 1 2020 plain\n\
lrwxrwxrwx 1 a a 5 Jan 1 2020 second -> two\n";

        let mut link = Vec::new();
        let mut record = FileRecord::default();
        parser
            .resolve_or_enumerate(
                list,
                "/",
                Request::new()
                    .name("first")
                    .record(&mut record)
                    .link(&mut link, 64),
            )
            .unwrap();
        assert!(record.is_symlink());
        assert_eq!(link, b"two");
    }

    #[test]
    fn test_relative_link_is_not_remapped() {
        let config = Config::new("ftp://example.org/").with_symlink_prefix("/mnt/ftp");
        let parser = ListingParser::new(&config).unwrap();
        let list = b"lrwxrwxrwx 1 a a 5 Jan 1 2020 foo -> bar\n";

        let mut link = Vec::new();
        parser
            .resolve_or_enumerate(list, "/", Request::new().link(&mut link, 64))
            .unwrap();
        assert_eq!(link, b"bar");
    }

    #[test]
    fn test_line_endings() {
        let config = Config::new("ftp://example.org/");
        let parser = ListingParser::new(&config).unwrap();

        let list = b"-rw-r--r-- 1 a a 1 Jan 1 2020 lf\n\
-rw-r--r-- 1 a a 2 Jan 1 2020 crlf\r\n\
-rw-r--r-- 1 a a 3 Jan 1 2020 cut";
        assert_eq!(names(parser.read_dir(list, "/")), [b"lf".to_vec(), b"crlf".to_vec()]);
    }

    #[test]
    fn test_read_dir_hides_dot_entries() {
        let config = Config::new("ftp://example.org/");
        let parser = ListingParser::new(&config).unwrap();

        let list = b"drwxr-xr-x 2 a a 0 Jan 1 2020 .\n\
drwxr-xr-x 2 a a 0 Jan 1 2020 ..\n\
-rw-r--r-- 1 a a 7 Jan 1 2020 .hidden\n";
        let entries: Vec<_> = parser.read_dir(list, "/").collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name(), b".hidden");
        assert_eq!(entries[0].file_name_lossy(), ".hidden");
        assert_eq!(entries[0].metadata().size, 7);
    }

    #[test]
    fn test_read_dir_skips_long_runs_of_dot_entries() {
        let mut entries = ReadDir::default();
        for _ in 0..200_000 {
            entries.fill(b".", &FileRecord::root());
            entries.fill(b"..", &FileRecord::root());
        }
        entries.fill(b"last", &FileRecord::default());

        assert_eq!(names(entries), [b"last".to_vec()]);
    }

    #[test]
    fn test_windows_listing() {
        let config = Config::new("ftp://example.org/");
        let parser = ListingParser::new(&config).unwrap();

        let list = b"01-02-20  03:04PM       <DIR>          sub\r\n\
01-02-20  03:05PM                  512 data.bin\r\n\
01-02-20  03:06PM                 0x10 hex.bin\r\n";
        let record = parser.stat(list, "/", "sub").unwrap();
        assert!(record.is_dir());
        assert_eq!(record.nlink, 1);
        assert_eq!(parser.stat(list, "/", "data.bin").unwrap().size, 512);
        assert_eq!(parser.stat(list, "/", "hex.bin").unwrap().size, 16);
    }

    #[test]
    fn test_http_autoindex() {
        let config = Config::new("http://mirror.example/pub/").with_source(SourceKind::Http);
        let parser = ListingParser::new(&config).unwrap();

        let list = b"<html><body><pre>\n\
<a href=\"?C=N;O=D\">Name</a>  <a href=\"?C=M;O=A\">Last modified</a>\n\
<a href=\"/\">Parent Directory</a>                             -\n\
<a href=\"file.txt\">file.txt</a>     12-Mar-2021 14:05  1.5M\n\
<a href=\"docs/\">docs/</a>            01-Jan-2020 00:00    -\n\
</pre></body></html>\n";
        let entries: Vec<_> = parser.read_dir(list, "/").collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_name(), b"file.txt");
        assert_eq!(entries[0].metadata().size, 1_572_864);
        assert_eq!(entries[1].file_name(), b"docs");
        assert!(entries[1].metadata().is_dir());

        // ftp style lines mean nothing on an http source
        assert!(parser
            .stat(b"-rw-r--r-- 1 a a 1 Jan 1 2020 f\n", "/", "f")
            .is_err());
    }

    #[test]
    fn test_server_charset() {
        init();
        let config = Config::new("ftp://example.org/").with_charsets("utf-8", "cp1251");
        let cache = MemoryCache::new();
        let parser = ListingParser::new(&config).unwrap().with_cache(&cache);

        let list = b"-rw-r--r-- 1 a a 1 Jan 1 2020 \xf4\xe0\xe9\xeb.txt\n";
        let record = parser.stat(list, "/", "файл.txt").unwrap();
        assert_eq!(record.size, 1);
        assert!(cache.attr("/файл.txt").is_some());
        assert_eq!(names(parser.read_dir(list, "/")), ["файл.txt".as_bytes()]);
    }

    #[test]
    fn test_non_utf8_local_charset_is_rejected() {
        let config = Config::new("ftp://example.org/").with_charsets("iso-8859-5", "cp1251");
        assert_eq!(
            ListingParser::new(&config).err(),
            Some(Error::LocalCharset("iso-8859-5".to_owned()))
        );
    }

    #[test]
    fn test_undecodable_names_stay_distinct() {
        init();
        let config = Config::new("ftp://example.org/");
        let cache = MemoryCache::new();
        let parser = ListingParser::new(&config).unwrap().with_cache(&cache);

        let list = b"-rw-r--r-- 1 a a 1 Jan 1 2020 caf\xe9\n\
-rw-r--r-- 1 a a 2 Jan 1 2020 caf\xe8\n";
        assert_eq!(
            names(parser.read_dir(list, "/")),
            [b"caf\xe9".to_vec(), b"caf\xe8".to_vec()]
        );

        assert_eq!(parser.stat(list, "/", b"caf\xe8").unwrap().size, 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.attr(b"/caf\xe9").unwrap().size, 1);
        assert_eq!(cache.attr(b"/caf\xe8").unwrap().size, 2);
    }

    #[test]
    fn test_unknown_charset() {
        let config = Config::new("ftp://example.org/").with_charsets("utf-8", "bogus");
        assert!(matches!(
            ListingParser::new(&config),
            Err(Error::UnknownCharset(_))
        ));
    }

    #[test]
    fn test_same_line_twice() {
        let config = Config::new("ftp://example.org/").with_blksize(4096);
        let parser = ListingParser::new(&config).unwrap().at(now());
        let line = "-rw-r--r-- 1 a a 9000 Nov 3 17:45 twice";
        assert_eq!(parser.parse_line(line), parser.parse_line(line));
        assert_eq!(parser.parse_line(line).unwrap().record.blocks, 24);
    }
}
