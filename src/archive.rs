//! Archive load/save
//!
//! Thin layer over the `tar`, `flate2`, `bzip2` and `zip` crates. Formats are
//! detected from the file extension first and from magic bytes second.

use crate::error::{ArchiveError, ArchiveResult};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Offset of the `ustar` magic in a POSIX tar header
const USTAR_OFFSET: usize = 257;
const USTAR_MAGIC: &[u8] = b"ustar";

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Uncompressed tar
    Tar,
    /// gzip-compressed tar
    TarGz,
    /// bzip2-compressed tar
    TarBz2,
    Zip,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "gz",
            ArchiveFormat::TarBz2 => "bz2",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// Format implied by the last extension of `path`, if any
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tar" => Some(ArchiveFormat::Tar),
            "gz" | "gzip" | "tgz" => Some(ArchiveFormat::TarGz),
            "bz2" | "tbz" | "tb2" | "tbz2" => Some(ArchiveFormat::TarBz2),
            "zip" => Some(ArchiveFormat::Zip),
            _ => None,
        }
    }

    /// Format implied by the leading bytes of a file
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        if header.starts_with(&[0x1F, 0x8B]) {
            Some(ArchiveFormat::TarGz)
        } else if header.starts_with(b"BZ") {
            Some(ArchiveFormat::TarBz2)
        } else if header.starts_with(b"PK") {
            Some(ArchiveFormat::Zip)
        } else if header.get(USTAR_OFFSET..USTAR_OFFSET + USTAR_MAGIC.len()) == Some(USTAR_MAGIC) {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }

    /// Detect the format of `path`, falling back to `default`.
    ///
    /// The extension wins; content is only inspected when the file exists.
    pub fn sniff(path: &Path, default: ArchiveFormat) -> Self {
        if let Some(format) = Self::from_extension(path) {
            return format;
        }

        match read_header(path) {
            Ok(header) => Self::from_magic(&header).unwrap_or(default),
            Err(_) => default,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tar" => Ok(ArchiveFormat::Tar),
            "gz" | "gzip" | "tgz" => Ok(ArchiveFormat::TarGz),
            "bz2" | "bzip2" | "tbz2" => Ok(ArchiveFormat::TarBz2),
            "zip" => Ok(ArchiveFormat::Zip),
            _ => Err(ArchiveError::UnknownFormat(s.to_string())),
        }
    }
}

fn read_header(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(USTAR_OFFSET + USTAR_MAGIC.len());
    file.take((USTAR_OFFSET + USTAR_MAGIC.len()) as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}

/// Basename of an archive with its archive extensions stripped
/// (`data.tar.gz` -> `data`).
pub fn archive_stem(path: &Path) -> Option<String> {
    let mut name = path.file_name()?.to_str()?.to_string();

    loop {
        let stripped = Path::new(&name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);
        match stripped {
            Some(stem)
                if !stem.is_empty() && ArchiveFormat::from_extension(Path::new(&name)).is_some() =>
            {
                name = stem;
            }
            _ => break,
        }
    }

    Some(name)
}

/// Reject absolute entries and entries that climb out of the destination.
fn check_entry_path(path: &Path) -> ArchiveResult<()> {
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => depth -= 1,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::IllegalPath {
                    path: path.to_path_buf(),
                });
            }
        }
    }
    Ok(())
}

/// Reject entries whose parent directories run through a symlink (planted by
/// an earlier entry) that resolves outside `root`, the canonical destination.
fn check_entry_parents(root: &Path, dest: &Path, path: &Path) -> ArchiveResult<()> {
    let illegal = || ArchiveError::IllegalPath {
        path: path.to_path_buf(),
    };
    let Some(parent) = path.parent() else {
        return Ok(());
    };

    let mut current = dest.to_path_buf();
    for component in parent.components() {
        match component {
            Component::Normal(name) => current.push(name),
            Component::CurDir => continue,
            // `unpack_in` skips entries containing `..`
            _ => return Ok(()),
        }

        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                let target = fs::canonicalize(&current).map_err(|_| illegal())?;
                if !target.starts_with(root) {
                    return Err(illegal());
                }
                current = target;
            }
            Ok(_) => {}
            // Nothing below here exists yet, so nothing can be a symlink
            Err(_) => return Ok(()),
        }
    }

    Ok(())
}

/// Extract `archive` into `dest`.
pub fn extract(archive: &Path, format: ArchiveFormat, dest: &Path) -> ArchiveResult<()> {
    info!(archive = %archive.display(), format = %format, dest = %dest.display(), "Extracting archive");

    let file = File::open(archive).map_err(|source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    match format {
        ArchiveFormat::Tar => extract_tar(reader, dest),
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(reader), dest),
        ArchiveFormat::TarBz2 => extract_tar(bzip2::read::BzDecoder::new(reader), dest),
        ArchiveFormat::Zip => extract_zip(reader, dest),
    }
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> ArchiveResult<()> {
    let mut archive = tar::Archive::new(reader);
    let root = fs::canonicalize(dest)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        check_entry_path(&path)?;
        check_entry_parents(&root, dest, &path)?;

        if !entry.unpack_in(dest)? {
            warn!(entry = %path.display(), "Skipped archive entry");
        } else {
            debug!(entry = %path.display(), "Extracted");
        }
    }

    Ok(())
}

fn extract_zip<R: Read + io::Seek>(reader: R, dest: &Path) -> ArchiveResult<()> {
    let mut archive = zip::ZipArchive::new(reader)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let path = PathBuf::from(entry.name());
        check_entry_path(&path)?;

        let out = dest.join(&path);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }

        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&out)?;
        io::copy(&mut entry, &mut file)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode().and_then(restored_mode) {
                fs::set_permissions(&out, fs::Permissions::from_mode(mode))?;
            }
        }

        debug!(entry = %path.display(), "Extracted");
    }

    Ok(())
}

/// Permission bits to apply to an extracted zip file. Setuid, setgid and
/// sticky bits are dropped, as tar extraction does.
#[cfg_attr(not(unix), allow(dead_code))]
fn restored_mode(mode: u32) -> Option<u32> {
    let mode = mode & 0o777;
    (mode != 0).then_some(mode)
}

/// Write the contents of `src` (not `src` itself) to `archive`.
pub fn create(archive: &Path, format: ArchiveFormat, src: &Path) -> ArchiveResult<()> {
    info!(archive = %archive.display(), format = %format, src = %src.display(), "Creating archive");

    let file = File::create(archive).map_err(|source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    })?;

    match format {
        ArchiveFormat::Tar => {
            write_tar(file, src)?.sync_all()?;
        }
        ArchiveFormat::TarGz => {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            write_tar(encoder, src)?.finish()?.sync_all()?;
        }
        ArchiveFormat::TarBz2 => {
            let encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
            write_tar(encoder, src)?.finish()?.sync_all()?;
        }
        ArchiveFormat::Zip => write_zip(file, src)?,
    }

    Ok(())
}

/// Top-level entries of `dir`, sorted for reproducible archives
fn sorted_children(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut children = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    children.sort_by_key(|entry| entry.file_name());
    Ok(children)
}

fn write_tar<W: Write>(writer: W, src: &Path) -> ArchiveResult<W> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);

    for child in sorted_children(src)? {
        let name = child.file_name();
        if child.file_type()?.is_dir() {
            builder.append_dir_all(&name, child.path())?;
        } else {
            builder.append_path_with_name(child.path(), &name)?;
        }
    }

    Ok(builder.into_inner()?)
}

fn write_zip(file: File, src: &Path) -> ArchiveResult<()> {
    let mut zip = zip::ZipWriter::new(file);

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ArchiveError::Walk {
            path: src.to_path_buf(),
            reason: e.to_string(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let name = zip_name(relative);

        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(entry_mode(&entry)?);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(name, options)?;
        } else if file_type.is_file() {
            zip.start_file(name, options)?;
            io::copy(&mut File::open(entry.path())?, &mut zip)?;
        } else {
            warn!(entry = %relative.display(), "Zip archives do not store symlinks, skipping");
        }
    }

    zip.finish()?;
    Ok(())
}

#[cfg(unix)]
fn entry_mode(entry: &walkdir::DirEntry) -> ArchiveResult<u32> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = entry.metadata().map_err(|e| ArchiveError::Walk {
        path: entry.path().to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn entry_mode(entry: &walkdir::DirEntry) -> ArchiveResult<u32> {
    Ok(if entry.file_type().is_dir() { 0o755 } else { 0o644 })
}

/// Zip entry names always use `/`
fn zip_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
