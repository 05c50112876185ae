//! Filesystem-backed [`SourceProvider`] (§6, §9): resolves `include` paths
//! against the entry file's directory, and serves `//std` out of the
//! embedded standard library instead of touching disk.

use std::path::{Path, PathBuf};

use funcy_par::SourceProvider;

use crate::stdlib::FUNCY_STANDARD_LIBRARY;

pub struct FileSourceProvider {
    root: PathBuf,
}

impl FileSourceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceProvider for FileSourceProvider {
    fn load(&self, name: &str) -> Option<String> {
        if name == "//std" {
            return Some(FUNCY_STANDARD_LIBRARY.to_string());
        }

        let path = self.root.join(format!("{name}.fy"));
        std::fs::read_to_string(path).ok()
    }
}

/// Derive a resolver entry name from an input file's path: its file stem,
/// e.g. `examples/hello.fy` becomes `hello`.
pub fn entry_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main")
        .to_string()
}

/// Magic bytes identify bytecode; anything else (or a file too short to
/// hold them) is treated as Funcy source text (§6).
pub fn looks_like_bytecode(bytes: &[u8]) -> bool {
    bytes.starts_with(&funcy_bc::MAGIC[..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn std_module_is_served_from_memory() {
        let provider = FileSourceProvider::new(".");
        let source = provider.load("//std").unwrap();
        assert!(source.contains("func printInt"));
    }

    #[test]
    fn other_modules_are_read_relative_to_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("util.fy"), "func helper() { return; }").unwrap();

        let provider = FileSourceProvider::new(dir.path());
        let source = provider.load("util").unwrap();
        assert!(source.contains("helper"));
    }

    #[test]
    fn missing_modules_resolve_to_none() {
        let provider = FileSourceProvider::new(".");
        assert!(provider.load("does-not-exist").is_none());
    }

    #[test]
    fn entry_name_is_the_files_stem() {
        assert_eq!(entry_name(Path::new("examples/hello.fy")), "hello");
    }

    #[test]
    fn bytecode_is_detected_by_its_magic() {
        let mut bytes = funcy_bc::MAGIC.to_vec();
        bytes.extend_from_slice(&[0; 8]);
        assert!(looks_like_bytecode(&bytes));
        assert!(!looks_like_bytecode(b"func main() {}"));
    }
}
