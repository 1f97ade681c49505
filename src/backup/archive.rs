//! Archive creation and naming
//!
//! An archive is one compressed, timestamped snapshot of a definition's
//! selected files from the data and configuration roots. Archives are
//! immutable once written: they are only ever read (for retention counting,
//! remote upload or restore) or deleted (by retention).
//!
//! Filenames are `<app_slug>_<definition_slug>_<timestamp>.tgz`. The
//! timestamp is UTC ISO-8601 with the colons removed (many archive tools
//! mishandle `:` in filenames), so lexicographic order is chronological
//! order. Both name segments pass through the slug transform and can never
//! contain `_`, which keeps the filename unambiguous to parse.
//!
//! Archives are written to a temporary name and atomically renamed into
//! place, so a half-written file can never be mistaken for a valid archive
//! by retention, remote dispatch or restore.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info, warn};

use crate::backup::selector::FileSelector;
use crate::config::{BackupDefinition, VaultContext};
use crate::error::{VaultError, VaultResult};

/// Timestamp layout embedded in archive filenames, e.g. `2020-12-25T170555`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S";

/// Archive filename extension
const ARCHIVE_EXTENSION: &str = "tgz";

/// One backup archive on disk
#[derive(Debug, Clone)]
pub struct BackupArchive {
    /// Full path to the archive file
    pub path: PathBuf,
    /// Slug of the definition that produced it
    pub definition_slug: String,
    /// Creation time embedded in the filename (UTC, second precision)
    pub timestamp: DateTime<Utc>,
    /// Application name segment of the filename (slug form)
    pub app_name: String,
    /// Application version; known only for archives created this invocation
    pub app_version: Option<String>,
}

impl BackupArchive {
    /// The archive's filename
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Parse an archive from its on-disk path.
    ///
    /// Returns `None` for files that are not archives produced by this tool
    /// (wrong extension, wrong segment count, unparseable timestamp); such
    /// files are left untouched by retention and omitted from listings.
    pub fn parse(path: &Path) -> Option<Self> {
        if path.extension()? != ARCHIVE_EXTENSION {
            return None;
        }

        let stem = path.file_stem()?.to_str()?;
        let mut segments = stem.split('_');
        let app_name = segments.next()?;
        let definition_slug = segments.next()?;
        let timestamp_text = segments.next()?;
        if segments.next().is_some() || app_name.is_empty() || definition_slug.is_empty() {
            return None;
        }

        let timestamp = NaiveDateTime::parse_from_str(timestamp_text, TIMESTAMP_FORMAT)
            .ok()?
            .and_utc();

        Some(Self {
            path: path.to_path_buf(),
            definition_slug: definition_slug.to_string(),
            timestamp,
            app_name: app_name.to_string(),
            app_version: None,
        })
    }
}

/// Compose the deterministic archive filename for a definition and time.
pub fn archive_file_name(app_slug: &str, definition_slug: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}.{}",
        app_slug,
        definition_slug,
        timestamp.format(TIMESTAMP_FORMAT),
        ARCHIVE_EXTENSION
    )
}

/// List all archives in the backup directory, newest first.
///
/// Files that do not parse as archives are ignored.
pub fn list_archives(ctx: &VaultContext) -> VaultResult<Vec<BackupArchive>> {
    if !ctx.backup_dir.exists() {
        return Ok(Vec::new());
    }

    let mut archives = Vec::new();

    for entry in fs::read_dir(&ctx.backup_dir)
        .map_err(|e| VaultError::Io(format!("Failed to read backup directory: {}", e)))?
    {
        let entry =
            entry.map_err(|e| VaultError::Io(format!("Failed to read directory entry: {}", e)))?;
        if let Some(archive) = BackupArchive::parse(&entry.path()) {
            archives.push(archive);
        }
    }

    archives.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.path.cmp(&a.path))
    });

    Ok(archives)
}

/// Packs a definition's selected files into one compressed archive
pub struct ArchiveBuilder<'a> {
    ctx: &'a VaultContext,
}

impl<'a> ArchiveBuilder<'a> {
    /// Create a builder for the given context.
    pub fn new(ctx: &'a VaultContext) -> Self {
        Self { ctx }
    }

    /// Build the archive for `definition` at time `now`.
    ///
    /// Selected files from both roots keep their relative path under the
    /// root-qualifying `data/` and `conf/` prefixes. An empty combined
    /// selection still produces a valid, empty archive. On failure the
    /// partially written temporary file is removed and nothing appears in
    /// the backup directory.
    pub fn build(
        &self,
        definition: &BackupDefinition,
        now: DateTime<Utc>,
    ) -> VaultResult<BackupArchive> {
        self.ctx.ensure_backup_dir()?;

        let timestamp = now.trunc_subsecs(0);
        let file_name = archive_file_name(&self.ctx.app_slug(), &definition.slug(), timestamp);
        let final_path = self.ctx.backup_dir.join(&file_name);
        let partial_path = self.ctx.backup_dir.join(format!(".{}.partial", file_name));

        let data_files =
            FileSelector::new(&definition.file_filter.data_dir)?.select(&self.ctx.data_dir);
        let conf_files =
            FileSelector::new(&definition.file_filter.conf_dir)?.select(&self.ctx.conf_dir);

        info!(
            "Backing up definition [{}]: {} data file(s), {} conf file(s)",
            definition.name,
            data_files.len(),
            conf_files.len()
        );

        if let Err(e) = self.write_archive(&partial_path, &data_files, &conf_files) {
            let _ = fs::remove_file(&partial_path);
            return Err(e);
        }

        fs::rename(&partial_path, &final_path).map_err(|e| {
            let _ = fs::remove_file(&partial_path);
            VaultError::Archive(format!(
                "Failed to finalize archive {}: {}",
                final_path.display(),
                e
            ))
        })?;

        info!("Created archive {}", final_path.display());

        Ok(BackupArchive {
            path: final_path,
            definition_slug: definition.slug(),
            timestamp,
            app_name: self.ctx.app_slug(),
            app_version: Some(self.ctx.app_version.clone()),
        })
    }

    fn write_archive(
        &self,
        partial_path: &Path,
        data_files: &[PathBuf],
        conf_files: &[PathBuf],
    ) -> VaultResult<()> {
        let file = fs::File::create(partial_path).map_err(|e| {
            VaultError::Archive(format!(
                "Failed to create archive {}: {}",
                partial_path.display(),
                e
            ))
        })?;

        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (root, prefix, files) in [
            (&self.ctx.data_dir, "data", data_files),
            (&self.ctx.conf_dir, "conf", conf_files),
        ] {
            debug!("Archiving {} under [{}/]", root.display(), prefix);
            for relative in files {
                let source = root.join(relative);
                // Files can vanish or lose permissions between the selection
                // walk and the pack; that only costs us the one file.
                let mut handle = match fs::File::open(&source) {
                    Ok(handle) => handle,
                    Err(e) => {
                        warn!("Skipping unreadable file {}: {}", source.display(), e);
                        continue;
                    }
                };

                builder
                    .append_file(Path::new(prefix).join(relative), &mut handle)
                    .map_err(|e| {
                        VaultError::Archive(format!(
                            "Failed to add {} to archive: {}",
                            source.display(),
                            e
                        ))
                    })?;
            }
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| VaultError::Archive(format!("Failed to finish archive: {}", e)))?;
        let mut writer = encoder
            .finish()
            .map_err(|e| VaultError::Archive(format!("Failed to finish compression: {}", e)))?;
        writer
            .flush()
            .map_err(|e| VaultError::Archive(format!("Failed to flush archive: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::context::test_context;
    use chrono::TimeZone;
    use std::collections::BTreeSet;
    use std::io::Read;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 12, 25, 17, 5, 55).unwrap()
    }

    fn populate(root: &Path, files: &[(&str, &str)]) {
        for (name, contents) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, contents).unwrap();
        }
    }

    fn definition(yaml: &str) -> BackupDefinition {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn tar_entries(path: &Path) -> BTreeSet<String> {
        let file = fs::File::open(path).unwrap();
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                entry
                    .unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_archive_file_name_is_colon_free() {
        let name = archive_file_name("test-app", "full", fixed_time());
        assert_eq!(name, "test-app_full_2020-12-25T170555.tgz");
        assert!(!name.contains(':'));
    }

    #[test]
    fn test_parse_round_trip() {
        let name = archive_file_name("test-app", "full", fixed_time());
        let archive = BackupArchive::parse(Path::new(&name)).unwrap();

        assert_eq!(archive.app_name, "test-app");
        assert_eq!(archive.definition_slug, "full");
        assert_eq!(archive.timestamp, fixed_time());
        assert!(archive.app_version.is_none());
    }

    #[test]
    fn test_parse_rejects_foreign_files() {
        assert!(BackupArchive::parse(Path::new("notes.txt")).is_none());
        assert!(BackupArchive::parse(Path::new("app_full.tgz")).is_none());
        assert!(BackupArchive::parse(Path::new("app_full_extra_2020-12-25T170555.tgz")).is_none());
        assert!(BackupArchive::parse(Path::new("app_full_busted.tgz")).is_none());
        assert!(BackupArchive::parse(Path::new(".app_full_2020-12-25T170555.tgz.partial")).is_none());
    }

    #[test]
    fn test_build_packs_both_roots_namespaced() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_context(temp_dir.path());
        populate(&ctx.data_dir, &[("1.txt", "data one"), ("nested/2.log", "two")]);
        populate(&ctx.conf_dir, &[("1.txt", "conf one"), ("settings.yml", "x: 1")]);

        let archive = ArchiveBuilder::new(&ctx)
            .build(&definition("name: full"), fixed_time())
            .unwrap();

        assert!(archive.path.exists());
        assert_eq!(archive.file_name(), "test-app_full_2020-12-25T170555.tgz");
        assert_eq!(archive.app_version.as_deref(), Some("1.0"));

        let entries = tar_entries(&archive.path);
        assert_eq!(
            entries,
            [
                "data/1.txt",
                "data/nested/2.log",
                "conf/1.txt",
                "conf/settings.yml",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<String>>()
        );
    }

    #[test]
    fn test_build_honors_file_filter() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_context(temp_dir.path());
        populate(&ctx.data_dir, &[("a.log", ""), ("b.txt", "")]);
        populate(&ctx.conf_dir, &[]);

        let definition = definition(
            "name: logs\nfile_filter:\n  data_dir:\n    include_list: [\"**/*.log\"]",
        );
        let archive = ArchiveBuilder::new(&ctx).build(&definition, fixed_time()).unwrap();

        let entries = tar_entries(&archive.path);
        assert_eq!(
            entries,
            ["data/a.log".to_string()].into_iter().collect::<BTreeSet<String>>()
        );
    }

    #[test]
    fn test_empty_selection_still_produces_valid_archive() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_context(temp_dir.path());

        let archive = ArchiveBuilder::new(&ctx)
            .build(&definition("name: full"), fixed_time())
            .unwrap();

        assert!(archive.path.exists());
        assert!(tar_entries(&archive.path).is_empty());
    }

    #[test]
    fn test_no_partial_file_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_context(temp_dir.path());
        populate(&ctx.data_dir, &[("1.txt", "contents")]);

        ArchiveBuilder::new(&ctx)
            .build(&definition("name: full"), fixed_time())
            .unwrap();

        let leftovers: Vec<_> = fs::read_dir(&ctx.backup_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_unwritable_backup_root_is_archive_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut ctx = test_context(temp_dir.path());
        // Point the backup directory at a regular file.
        ctx.backup_dir = temp_dir.path().join("blocked");
        fs::write(&ctx.backup_dir, b"").unwrap();

        let err = ArchiveBuilder::new(&ctx)
            .build(&definition("name: full"), fixed_time())
            .unwrap_err();
        assert!(matches!(err, VaultError::Archive(_)));
    }

    #[test]
    fn test_list_archives_newest_first_and_ignores_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_context(temp_dir.path());
        ctx.ensure_backup_dir().unwrap();

        for timestamp in ["2020-12-25T170555", "2020-12-25T170557", "2020-12-25T170556"] {
            fs::write(
                ctx.backup_dir.join(format!("test-app_full_{}.tgz", timestamp)),
                b"",
            )
            .unwrap();
        }
        fs::write(ctx.backup_dir.join("README.md"), b"").unwrap();
        fs::write(ctx.backup_dir.join(".test-app_full_2020-12-25T170559.tgz.partial"), b"").unwrap();

        let archives = list_archives(&ctx).unwrap();
        assert_eq!(archives.len(), 3);
        let contents: Vec<String> = archives.iter().map(|a| a.file_name()).collect();
        assert_eq!(
            contents,
            vec![
                "test-app_full_2020-12-25T170557.tgz",
                "test-app_full_2020-12-25T170556.tgz",
                "test-app_full_2020-12-25T170555.tgz",
            ]
        );
    }

    #[test]
    fn test_list_archives_missing_dir_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_context(temp_dir.path());
        assert!(list_archives(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_archive_contents_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_context(temp_dir.path());
        populate(&ctx.data_dir, &[("file.bin", "exact bytes")]);

        let archive = ArchiveBuilder::new(&ctx)
            .build(&definition("name: full"), fixed_time())
            .unwrap();

        let file = fs::File::open(&archive.path).unwrap();
        let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
        let mut entry = tar.entries().unwrap().next().unwrap().unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "exact bytes");
    }
}
