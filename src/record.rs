use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Permission bits according to mode unix
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMode(u32);

bitflags! {
    impl FileMode: u32 {
        const OWNER_READ = 0o400;
        const OWNER_WRITE = 0o200;
        const OWNER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;

        const READ = 0o444;
        const EXEC = 0o111;
    }
}

/// Entry type, exactly one per record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    Dir,
    #[default]
    Regular,
    Symlink,
}

impl FileType {
    /// The `S_IF*` bits of this type
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Self::Dir => 0x4000,
            Self::Regular => 0x8000,
            Self::Symlink => 0xA000,
        }
    }
}

/// Metadata of one listed entry
///
/// Listings carry a single date, so access, change and modification time
/// are all the same timestamp.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub kind: FileType,
    pub mode: FileMode,
    pub nlink: u64,
    pub size: u64,
    pub blksize: Option<u32>,
    /// Allocated 512-byte blocks
    pub blocks: u64,
    /// Seconds since the epoch
    pub time: i64,
}

macro_rules! impl_fn_type {
    ($get_name:ident, $doc_name:expr, $kind:ident) => {
        #[doc = "Returns `true` if is a "]
        #[doc = $doc_name]
        #[must_use]
        pub fn $get_name(&self) -> bool {
            self.kind == FileType::$kind
        }
    };
}

fn system_time(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

fn permission(bits: u32) -> String {
    let read = if bits & 0o4 != 0 { "r" } else { "-" };
    let write = if bits & 0o2 != 0 { "w" } else { "-" };
    let execute = if bits & 0o1 != 0 { "x" } else { "-" };

    format!("{read}{write}{execute}")
}

impl FileRecord {
    impl_fn_type!(is_dir, "dir", Dir);
    impl_fn_type!(is_regular, "regular", Regular);
    impl_fn_type!(is_symlink, "symlink", Symlink);

    /// The entry servers never list: the directory itself
    #[must_use]
    pub fn root() -> Self {
        Self {
            kind: FileType::Dir,
            mode: FileMode::from_bits_truncate(0o755),
            nlink: 1,
            size: 1024,
            ..Default::default()
        }
    }

    /// Type and permission bits combined, as in `st_mode`
    #[must_use]
    pub fn st_mode(&self) -> u32 {
        self.kind.bits() | self.mode.bits()
    }

    /// Returns the size of the file
    #[must_use]
    pub fn len(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the last access time
    #[must_use]
    pub fn accessed(&self) -> SystemTime {
        system_time(self.time)
    }

    /// Returns the last modification time
    #[must_use]
    pub fn modified(&self) -> SystemTime {
        system_time(self.time)
    }

    /// Returns the last status change time
    #[must_use]
    pub fn changed(&self) -> SystemTime {
        system_time(self.time)
    }

    /// Get the `drwxr-xr-x` form of type and permissions
    #[must_use]
    pub fn mode_string(&self) -> String {
        let bits = self.mode.bits();

        let owner = permission((bits >> 6) & 0o7);
        let group = permission((bits >> 3) & 0o7);
        let other = permission(bits & 0o7);

        let kind = match self.kind {
            FileType::Dir => "d",
            FileType::Regular => "-",
            FileType::Symlink => "l",
        };

        format!("{kind}{owner}{group}{other}")
    }

    /// Get a formed `ls -l` style line for `name`
    #[must_use]
    pub fn longname(&self, name: &str) -> String {
        let date = DateTime::<Utc>::from_timestamp(self.time, 0)
            .map(|d| d.format("%b %d %Y %H:%M").to_string())
            .unwrap_or_default();

        format!(
            "{} {} {} {} {}",
            self.mode_string(),
            self.nlink,
            self.size,
            date,
            name
        )
    }
}
