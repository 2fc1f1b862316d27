//! Loading and merging descriptor sets from disk.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use dynproto_core::DescriptorPool;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

/// File extensions treated as serialized descriptor sets
const DESCRIPTOR_SET_EXTENSIONS: [&str; 3] = ["pb", "desc", "binpb"];

/// Strategy for resolving same-name, different-content files
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ConflictStrategy {
    /// Fail on the first conflicting definition
    Error,
    /// Keep the first definition seen, skip later ones
    KeepFirst,
}

#[derive(Debug, Default)]
pub(crate) struct LoaderStats {
    pub(crate) sets_read: usize,
    pub(crate) files_found: usize,
    pub(crate) duplicates_skipped: usize,
    pub(crate) conflicts_skipped: usize,
}

/// Collects `FileDescriptorProto`s from several descriptor sets
#[derive(Debug)]
pub(crate) struct DescriptorSetLoader {
    strategy: ConflictStrategy,
    /// Maps file name -> (content hash, descriptor set it came from)
    seen: HashMap<String, (String, PathBuf)>,
    files: Vec<FileDescriptorProto>,
    pub(crate) stats: LoaderStats,
}

impl DescriptorSetLoader {
    pub(crate) fn new(strategy: ConflictStrategy) -> Self {
        Self {
            strategy,
            seen: HashMap::new(),
            files: Vec::new(),
            stats: LoaderStats::default(),
        }
    }

    /// Short blake3 hash of a serialized file descriptor
    fn content_hash(bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex()[..16].to_string()
    }

    /// Reads one serialized `FileDescriptorSet`
    pub(crate) fn load_file(&mut self, path: &Path) -> Result<()> {
        trace!("Reading {}", path.display());
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read descriptor set: {}", path.display()))?;
        let set = FileDescriptorSet::decode(bytes.as_slice())
            .with_context(|| format!("Failed to parse descriptor set: {}", path.display()))?;

        debug!("Found {} file(s) in {}", set.file.len(), path.display());
        self.stats.sets_read += 1;
        for file in set.file {
            self.add(file, path)?;
        }
        Ok(())
    }

    /// Reads every descriptor set below `dir`, in file-name order
    pub(crate) fn load_dir(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            bail!("Path is not a directory: {}", dir.display());
        }
        info!("Scanning directory: {}", dir.display());

        for entry in WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !is_descriptor_set(path) {
                trace!("Skipping {}", path.display());
                continue;
            }
            self.load_file(path)?;
        }
        Ok(())
    }

    /// Records `file`, returning whether it was kept
    pub(crate) fn add(&mut self, file: FileDescriptorProto, source: &Path) -> Result<bool> {
        self.stats.files_found += 1;
        let name = file.name().to_string();
        let hash = Self::content_hash(&file.encode_to_vec());

        match self.seen.get(&name) {
            Some((seen_hash, _)) if *seen_hash == hash => {
                debug!("Skipping duplicate: {} (hash: {})", name, hash);
                self.stats.duplicates_skipped += 1;
                Ok(false)
            }
            Some((_, first)) => match self.strategy {
                ConflictStrategy::Error => bail!(
                    "Conflicting definitions of {} in {} and {} (use --conflict-strategy keep-first to ignore)",
                    name,
                    first.display(),
                    source.display()
                ),
                ConflictStrategy::KeepFirst => {
                    warn!(
                        "Skipping conflict: {} from {} (keeping the one from {})",
                        name,
                        source.display(),
                        first.display()
                    );
                    self.stats.conflicts_skipped += 1;
                    Ok(false)
                }
            },
            None => {
                self.seen.insert(name, (hash, source.to_path_buf()));
                self.files.push(file);
                Ok(true)
            }
        }
    }

    /// Registers every collected file in a new pool
    pub(crate) fn into_pool(self) -> Result<DescriptorPool> {
        info!(
            "Summary: {} descriptor set(s), {} files found, {} duplicates skipped, {} conflicts skipped",
            self.stats.sets_read,
            self.stats.files_found,
            self.stats.duplicates_skipped,
            self.stats.conflicts_skipped
        );
        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_set(FileDescriptorSet { file: self.files })
            .context("Failed to build descriptor pool")?;
        Ok(pool)
    }
}

/// True for paths with a descriptor-set extension
pub(crate) fn is_descriptor_set(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DESCRIPTOR_SET_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file(name: &str, package: &str) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(name.into()),
            package: Some(package.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_files_are_skipped() {
        let mut loader = DescriptorSetLoader::new(ConflictStrategy::Error);
        assert!(loader.add(file("a.proto", "a"), Path::new("one.pb")).unwrap());
        assert!(!loader.add(file("a.proto", "a"), Path::new("two.pb")).unwrap());
        assert_eq!(loader.stats.duplicates_skipped, 1);
        assert_eq!(loader.into_pool().unwrap().files().len(), 1);
    }

    #[test]
    fn test_conflict_error() {
        let mut loader = DescriptorSetLoader::new(ConflictStrategy::Error);
        loader.add(file("a.proto", "a"), Path::new("one.pb")).unwrap();
        let err = loader
            .add(file("a.proto", "b"), Path::new("two.pb"))
            .unwrap_err();
        assert!(err.to_string().contains("Conflicting definitions of a.proto"));
    }

    #[test]
    fn test_conflict_keep_first() {
        let mut loader = DescriptorSetLoader::new(ConflictStrategy::KeepFirst);
        loader.add(file("a.proto", "a"), Path::new("one.pb")).unwrap();
        assert!(!loader.add(file("a.proto", "b"), Path::new("two.pb")).unwrap());
        assert_eq!(loader.stats.conflicts_skipped, 1);

        let pool = loader.into_pool().unwrap();
        assert_eq!(pool.get_file_by_name("a.proto").unwrap().package_name(), "a");
    }

    #[test]
    fn test_load_dir() {
        let temp_dir = TempDir::new().unwrap();
        let set = FileDescriptorSet {
            file: vec![file("a.proto", "a")],
        };
        fs::write(temp_dir.path().join("one.binpb"), set.encode_to_vec()).unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("nested/two.desc"), set.encode_to_vec()).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"not a descriptor set").unwrap();

        let mut loader = DescriptorSetLoader::new(ConflictStrategy::Error);
        loader.load_dir(temp_dir.path()).unwrap();
        assert_eq!(loader.stats.sets_read, 2);
        assert_eq!(loader.stats.duplicates_skipped, 1);
    }

    #[test]
    fn test_is_descriptor_set() {
        assert!(is_descriptor_set(Path::new("/tmp/api.pb")));
        assert!(is_descriptor_set(Path::new("/tmp/api.DESC")));
        assert!(is_descriptor_set(Path::new("/tmp/api.binpb")));
        assert!(!is_descriptor_set(Path::new("/tmp/api.proto")));
        assert!(!is_descriptor_set(Path::new("/tmp/pb")));
    }
}
