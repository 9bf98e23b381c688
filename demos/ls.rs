use anyhow::Context;
use ftpfs_listing::{Config, ListingParser, MemoryCache, SourceKind};
use log::{info, LevelFilter};
use std::{env, fs, io::Read};

/// Print a saved listing the way `ls -l` would, with symlink targets.
///
/// Usage: `ls [--http] [--debug] [FILE]`, reading stdin without a file.
fn main() -> anyhow::Result<()> {
    let mut config = Config::new("ftp://localhost/");
    let mut file = None;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--http" => config.source = SourceKind::Http,
            "--debug" => config.debug = 2,
            _ => file = Some(arg),
        }
    }

    env_logger::builder()
        .filter_level(if config.debug > 0 {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        })
        .init();

    let list = match &file {
        Some(path) => fs::read(path).with_context(|| format!("reading {path}"))?,
        None => {
            let mut list = Vec::new();
            std::io::stdin().read_to_end(&mut list)?;
            list
        }
    };

    // targets are cached even while enumerating
    let cache = MemoryCache::new();
    let parser = ListingParser::new(&config)?.with_cache(&cache);
    let mut count = 0;
    for entry in parser.read_dir(&list, "/") {
        let line = entry.metadata().longname(&entry.file_name_lossy());
        match cache.link([&b"/"[..], entry.file_name()].concat()) {
            Some(target) => println!("{line} -> {}", String::from_utf8_lossy(&target)),
            None => println!("{line}"),
        }
        count += 1;
    }

    info!("{} entries", count);
    Ok(())
}
