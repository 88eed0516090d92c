//! Scan provider: the root's direct children as [`DesktopItem`]s.

use crate::config::CompiledFilters;
use crate::fs::FileSystem;
use crate::item::DesktopItem;
use crate::paths;
use std::io;
use std::path::Path;

/// Lists the root non-recursively, leaving out protected entries and files
/// the configured filters reject.
///
/// Folders are never filtered: the generator needs every existing folder to
/// reuse it instead of creating a duplicate.
pub struct Scanner<'a> {
    fs: &'a dyn FileSystem,
    filters: CompiledFilters,
}

impl<'a> Scanner<'a> {
    pub fn new(fs: &'a dyn FileSystem, filters: CompiledFilters) -> Self {
        Self { fs, filters }
    }

    pub fn scan(&self, root: &Path) -> io::Result<Vec<DesktopItem>> {
        let mut items = Vec::new();
        let mut filtered = 0usize;

        for entry in self.fs.read_dir(root)? {
            if paths::is_protected(root, &entry.path) {
                continue;
            }
            if entry.is_dir() {
                items.push(DesktopItem::folder(entry.path));
            } else if entry.is_file() {
                if self.filters.should_include(&entry.name) {
                    items.push(DesktopItem::file(entry.path));
                } else {
                    filtered += 1;
                }
            }
        }

        tracing::debug!(root = %root.display(), items = items.len(), filtered, "scanned");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::memory::MemoryFileSystem;

    #[test]
    fn test_scan_lists_direct_children_only() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a")
            .add_file("/d/C/inner.txt", "i")
            .add_file("/d/.desktop/.desktop_organizer_baseline.json", "[]");

        let items = Scanner::new(&fs, CompiledFilters::permissive())
            .scan(Path::new("/d"))
            .unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["C", "a.txt"]);
        assert!(items[0].is_directory);
    }

    #[test]
    fn test_filters_apply_to_files_only() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/desktop.ini", "")
            .add_file("/d/report.docx", "")
            .add_dir("/d/.hidden-folder");
        let config = Config::from_toml_str(
            r#"
            [filters.exclude]
            filenames = ["desktop.ini"]
            "#,
        )
        .unwrap();

        let items = Scanner::new(&fs, config.compile_filters().unwrap())
            .scan(Path::new("/d"))
            .unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec![".hidden-folder", "report.docx"]);
    }

    #[test]
    fn test_scan_missing_root() {
        let fs = MemoryFileSystem::new();
        assert!(Scanner::new(&fs, CompiledFilters::permissive())
            .scan(Path::new("/nope"))
            .is_err());
    }
}
