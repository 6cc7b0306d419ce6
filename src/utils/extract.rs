use crate::error::SparkError;
use flate2::read::GzDecoder;
use indicatif::ProgressBar;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use xz2::read::XzDecoder;

/// Maps an archive entry name to its destination name; `None` skips it.
pub type Rename<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Unpacks `archive_path` under `dest`, passing every entry name through
/// `rename`. Entries that would escape `dest` are skipped. Returns the
/// number of entries written.
pub fn extract_archive(
    archive_path: &Path,
    dest: &Path,
    rename: Rename<'_>,
    progress: &ProgressBar,
) -> Result<usize, SparkError> {
    let name = archive_path.to_string_lossy().to_lowercase();
    debug!("extracting {} into {}", archive_path.display(), dest.display());
    fs::create_dir_all(dest)?;

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar(GzDecoder::new(File::open(archive_path)?), dest, rename, progress)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        extract_tar(XzDecoder::new(File::open(archive_path)?), dest, rename, progress)
    } else if name.ends_with(".zip") {
        extract_zip(archive_path, dest, rename, progress)
    } else {
        Err(SparkError::ExtractionFailed(format!(
            "unsupported archive format: {}",
            archive_path.display()
        )))
    }
}

fn corrupt(err: impl std::fmt::Display) -> SparkError {
    SparkError::ExtractionFailed(err.to_string())
}

fn target_path(dest: &Path, name: &str, rename: Rename<'_>) -> Option<PathBuf> {
    let name = name.replace('\\', "/");
    if Path::new(&name)
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return None;
    }
    let renamed = rename(&name)?;
    let renamed = renamed.trim_end_matches('/');
    if renamed.is_empty() {
        return None;
    }
    let relative = Path::new(renamed);
    let contained = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    contained.then(|| dest.join(relative))
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Whether any directory between `dest` and `target` is a symlink. Writing
/// through one could land outside `dest`.
fn crosses_symlink(dest: &Path, target: &Path) -> bool {
    let Ok(relative) = target.strip_prefix(dest) else {
        return true;
    };
    let mut current = dest.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        if fs::symlink_metadata(&current).is_ok_and(|meta| meta.file_type().is_symlink()) {
            return true;
        }
    }
    false
}

/// Resolves `link` lexically from the directory holding `target` and checks
/// the result stays under `dest`.
fn link_stays_inside(dest: &Path, target: &Path, link: &Path) -> bool {
    let Some(Ok(parent)) = target.parent().map(|parent| parent.strip_prefix(dest)) else {
        return false;
    };
    let mut depth = parent.components().count();
    for component in link.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => depth -= 1,
            _ => return false,
        }
    }
    true
}

/// Removes a symlink left at `target` so the write cannot follow it.
fn clear_link(target: &Path) -> io::Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(target),
        _ => Ok(()),
    }
}

fn extract_tar<R: Read>(
    reader: R,
    dest: &Path,
    rename: Rename<'_>,
    progress: &ProgressBar,
) -> Result<usize, SparkError> {
    let mut archive = tar::Archive::new(reader);
    let mut written = 0;

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let name = entry.path().map_err(corrupt)?.to_string_lossy().into_owned();
        let Some(target) = target_path(dest, &name, rename) else {
            debug!("skipping archive entry {name}");
            continue;
        };
        if crosses_symlink(dest, &target) {
            debug!("skipping {name}, it goes through a symlink");
            continue;
        }

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            clear_link(&target)?;
            fs::create_dir_all(&target)?;
        } else if kind.is_symlink() {
            let Some(link) = entry.link_name().map_err(corrupt)? else {
                continue;
            };
            if !link_stays_inside(dest, &target, &link) {
                debug!("skipping symlink {name} -> {}, it leaves the destination", link.display());
                continue;
            }
            create_parent(&target)?;
            if fs::symlink_metadata(&target).is_ok() {
                fs::remove_file(&target)?;
            }
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &target)?;
            #[cfg(not(unix))]
            debug!("skipping symlink {name} -> {}", link.display());
        } else if kind.is_file() {
            create_parent(&target)?;
            clear_link(&target)?;
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            #[cfg(unix)]
            if let Ok(mode) = entry.header().mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
            }
        } else {
            debug!("skipping {kind:?} entry {name}");
            continue;
        }

        written += 1;
        progress.inc(1);
    }
    Ok(written)
}

fn extract_zip(
    archive_path: &Path,
    dest: &Path,
    rename: Rename<'_>,
    progress: &ProgressBar,
) -> Result<usize, SparkError> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?).map_err(corrupt)?;
    progress.set_length(archive.len() as u64);
    let mut written = 0;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(corrupt)?;
        let name = file.name().to_string();
        let Some(target) = target_path(dest, &name, rename) else {
            debug!("skipping archive entry {name}");
            continue;
        };
        if crosses_symlink(dest, &target) {
            debug!("skipping {name}, it goes through a symlink");
            continue;
        }

        if file.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            create_parent(&target)?;
            clear_link(&target)?;
            let mut out = File::create(&target)?;
            io::copy(&mut file, &mut out)?;
            #[cfg(unix)]
            if let Some(mode) = file.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
            }
        }

        written += 1;
        progress.inc(1);
    }
    Ok(written)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    pub(crate) enum Entry<'a> {
        File(&'a str, &'a str),
        Link(&'a str, &'a str),
    }

    /// Builds a gzipped tarball of regular files. Names are written raw so
    /// traversal entries can be included.
    pub(crate) fn tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
        let entries: Vec<Entry<'_>> = entries.iter().map(|(name, data)| Entry::File(name, data)).collect();
        tar_gz_entries(&entries)
    }

    pub(crate) fn tar_gz_entries(entries: &[Entry<'_>]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for entry in entries {
            let mut header = tar::Header::new_gnu();
            let (name, data) = match entry {
                Entry::File(name, data) => {
                    header.set_entry_type(tar::EntryType::Regular);
                    (*name, data.as_bytes())
                }
                Entry::Link(name, link) => {
                    header.set_entry_type(tar::EntryType::Symlink);
                    let raw = link.as_bytes();
                    header.as_gnu_mut().expect("gnu header").linkname[..raw.len()].copy_from_slice(raw);
                    (*name, &[][..])
                }
            };
            let raw = name.as_bytes();
            header.as_gnu_mut().expect("gnu header").name[..raw.len()].copy_from_slice(raw);
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append(&header, data).expect("append entry");
        }
        builder
            .into_inner()
            .expect("finish tar")
            .finish()
            .expect("finish gzip")
    }
}
