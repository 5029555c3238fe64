//! Object-store access.
//!
//! A bucket is addressed by `/`-separated object names; folders are only
//! name prefixes. [`LocalStore`] keeps a bucket as a directory tree, which is
//! what the CLI uses. Anything else implementing [`ObjectStore`] can be
//! dropped into the pipeline.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{FlowError, Result};
use crate::models::ObjectMeta;

/// Suffix of in-flight copies. Never listed.
const PART_SUFFIX: &str = ".txnflow-part";

pub trait ObjectStore: std::fmt::Debug {
    /// All objects whose name starts with `prefix`, sorted by name.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    fn read(&self, name: &str) -> Result<Vec<u8>>;

    fn write(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Server-side copy. The destination is either fully written or absent.
    fn copy(&self, source: &str, destination: &str) -> Result<()>;

    fn delete(&self, name: &str) -> Result<()>;

    fn exists(&self, name: &str) -> Result<bool>;
}

/// Hex SHA-256 of an object's bytes.
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Filesystem-backed bucket rooted at `<storage_root>/<bucket>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn open(storage_root: &Path, bucket: &str) -> Result<Self> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(FlowError::Settings(format!("invalid bucket name: {bucket:?}")));
        }
        let root = storage_root.join(bucket);
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.ends_with(PART_SUFFIX)
        || name
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(FlowError::InvalidObjectName(name.to_string()));
    }
    Ok(())
}

fn not_found(name: &str) -> impl FnOnce(std::io::Error) -> FlowError + '_ {
    move |e| {
        if e.kind() == ErrorKind::NotFound {
            FlowError::ObjectNotFound(name.to_string())
        } else {
            FlowError::Io(e)
        }
    }
}

fn walk(dir: &Path, rel: &str, out: &mut Vec<ObjectMeta>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let name = format!("{rel}{file_name}");
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&entry.path(), &format!("{name}/"), out)?;
        } else if file_type.is_file() && !file_name.ends_with(PART_SUFFIX) {
            out.push(ObjectMeta {
                name,
                size: entry.metadata()?.len(),
            });
        }
    }
    Ok(())
}

impl ObjectStore for LocalStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        // Walk from the deepest directory the prefix names, then filter on
        // the remainder so partial prefixes like "input/ord" still work.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..=idx],
            None => "",
        };
        if !dir_part.is_empty() {
            validate_name(dir_part.trim_end_matches('/'))?;
        }
        let mut out = Vec::new();
        walk(&self.root.join(dir_part), dir_part, &mut out)?;
        out.retain(|o| o.name.starts_with(prefix));
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.full_path(name)?;
        fs::read(&path).map_err(not_found(name))
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.full_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = part_path(&path);
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn copy(&self, source: &str, destination: &str) -> Result<()> {
        let src = self.full_path(source)?;
        let dst = self.full_path(destination)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = part_path(&dst);
        fs::copy(&src, &tmp).map_err(not_found(source))?;
        fs::rename(&tmp, &dst)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.full_path(name)?;
        fs::remove_file(&path).map_err(not_found(name))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.full_path(name)?.is_file())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(PART_SUFFIX);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), "bucket").unwrap();
        (dir, store)
    }

    #[test]
    fn test_write_read() {
        let (_dir, store) = store();
        store.write("input/a.csv", b"hello").unwrap();
        assert_eq!(store.read("input/a.csv").unwrap(), b"hello");
    }

    #[test]
    fn test_list_is_recursive_and_sorted() {
        let (_dir, store) = store();
        store.write("input/b.csv", b"b").unwrap();
        store.write("input/a.csv", b"aa").unwrap();
        store.write("input/nested/c.csv", b"c").unwrap();
        store.write("clean/d.csv", b"d").unwrap();
        let names: Vec<_> = store
            .list("input/")
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["input/a.csv", "input/b.csv", "input/nested/c.csv"]);
        assert_eq!(store.list("input/a").unwrap()[0].size, 2);
    }

    #[test]
    fn test_list_missing_prefix_is_empty() {
        let (_dir, store) = store();
        assert!(store.list("done/").unwrap().is_empty());
    }

    #[test]
    fn test_copy_and_delete() {
        let (_dir, store) = store();
        store.write("input/a.csv", b"data").unwrap();
        store.copy("input/a.csv", "clean/a.csv").unwrap();
        assert!(store.exists("input/a.csv").unwrap());
        assert_eq!(store.read("clean/a.csv").unwrap(), b"data");
        store.delete("input/a.csv").unwrap();
        assert!(!store.exists("input/a.csv").unwrap());
    }

    #[test]
    fn test_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.read("input/missing.csv"), Err(FlowError::ObjectNotFound(_))));
        assert!(matches!(store.delete("input/missing.csv"), Err(FlowError::ObjectNotFound(_))));
        assert!(matches!(
            store.copy("input/missing.csv", "clean/missing.csv"),
            Err(FlowError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_escaping_names() {
        let (_dir, store) = store();
        for name in ["../x.csv", "/abs.csv", "input//a.csv", "input/./a.csv", ""] {
            assert!(
                matches!(store.read(name), Err(FlowError::InvalidObjectName(_))),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
