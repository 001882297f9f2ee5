//! Per-run local staging directory for the table listing and table dumps.
//!
//! Layout: `<base>/db_sync_<unix>/<db>_list.txt` plus `<db>_<table>.txt` per
//! fetched table. Each file is written once; a second write of the same name
//! fails with `AlreadyExists`. Files are written under a `.part` name and
//! renamed into place, so a final name only ever holds complete contents.

use dbsync_core::{Blacklist, SyncError, TableSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    db_name: String,
    removed: AtomicBool,
}

impl StagingArea {
    pub fn dir_name(started_unix: u64) -> String {
        format!("db_sync_{started_unix}")
    }

    /// Allocate `<base>/db_sync_<started_unix>`. Fails if that directory already exists.
    pub fn create(base: &Path, db_name: &str, started_unix: u64) -> Result<Self, SyncError> {
        std::fs::create_dir_all(base).map_err(|e| SyncError::staging(base, e))?;
        let dir = base.join(Self::dir_name(started_unix));
        std::fs::create_dir(&dir).map_err(|e| SyncError::staging(&dir, e))?;
        info!(dir = %dir.display(), "staging directory created");
        Ok(StagingArea { dir, db_name: db_name.to_string(), removed: AtomicBool::new(false) })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn listing_path(&self) -> PathBuf {
        self.dir.join(format!("{}_list.txt", self.db_name))
    }

    pub fn dump_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.txt", self.db_name, table))
    }

    pub async fn write_listing(&self, raw: &[u8]) -> io::Result<()> {
        write_once(&self.listing_path(), raw).await
    }

    pub async fn write_table_dump(&self, table: &str, raw: &[u8]) -> io::Result<()> {
        let path = self.dump_path(table);
        write_once(&path, raw).await?;
        debug!(table, bytes = raw.len(), path = %path.display(), "dump staged");
        Ok(())
    }

    #[cfg(test)]
    async fn read_table_dump(&self, table: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.dump_path(table)).await
    }

    /// Re-read the listing file and apply the blacklist.
    pub async fn read_listing_lines(&self, blacklist: &Blacklist) -> io::Result<TableSet> {
        let raw = tokio::fs::read(self.listing_path()).await?;
        Ok(TableSet::from_listing(&String::from_utf8_lossy(&raw), blacklist))
    }

    /// Remove the directory and everything in it. Safe to call more than once.
    pub fn destroy(&self) -> io::Result<()> {
        if self.removed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!(dir = %self.dir.display(), "staging directory removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if !self.removed.load(Ordering::Acquire) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn write_once(path: &Path, raw: &[u8]) -> io::Result<()> {
    if tokio::fs::metadata(path).await.is_ok() {
        return Err(io::Error::new(io::ErrorKind::AlreadyExists, format!("{} already exists", path.display())));
    }
    let part = part_path(path);
    let mut file = tokio::fs::OpenOptions::new().write(true).create_new(true).open(&part).await?;
    let written = match file.write_all(raw).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    drop(file);

    let result = match written {
        Ok(()) => tokio::fs::rename(&part, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&part).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn directory_layout() {
        let base = tempfile::tempdir().unwrap();
        let area = StagingArea::create(base.path(), "shop", 1_700_000_000).unwrap();
        assert_eq!(area.path(), base.path().join("db_sync_1700000000"));
        assert_eq!(area.listing_path(), area.path().join("shop_list.txt"));
        assert_eq!(area.dump_path("orders"), area.path().join("shop_orders.txt"));
    }

    #[test]
    fn runs_at_different_times_do_not_collide() {
        let base = tempfile::tempdir().unwrap();
        let a = StagingArea::create(base.path(), "shop", 100).unwrap();
        let b = StagingArea::create(base.path(), "shop", 101).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir() && b.path().is_dir());
    }

    #[test]
    fn existing_directory_is_a_fatal_error() {
        let base = tempfile::tempdir().unwrap();
        let _first = StagingArea::create(base.path(), "shop", 5).unwrap();
        let err = StagingArea::create(base.path(), "shop", 5).unwrap_err();
        assert!(matches!(err, SyncError::Staging { .. }));
    }

    #[tokio::test]
    async fn dump_round_trips_bytes() {
        let base = tempfile::tempdir().unwrap();
        let area = StagingArea::create(base.path(), "shop", 7).unwrap();
        let rows = b"1\talice\t\\N\n2\tbob\t2024-01-01\n\xff\x00".to_vec();
        area.write_table_dump("customers", &rows).await.unwrap();
        assert_eq!(area.read_table_dump("customers").await.unwrap(), rows);
    }

    #[tokio::test]
    async fn same_file_cannot_be_written_twice() {
        let base = tempfile::tempdir().unwrap();
        let area = StagingArea::create(base.path(), "shop", 8).unwrap();
        area.write_table_dump("orders", b"a").await.unwrap();
        let err = area.write_table_dump("orders", b"b").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn interrupted_dump_never_appears_under_its_final_name() {
        let base = tempfile::tempdir().unwrap();
        let area = StagingArea::create(base.path(), "shop", 12).unwrap();
        let rows = vec![b'x'; 64 * 1024 * 1024];
        let cut = tokio::time::timeout(Duration::ZERO, area.write_table_dump("big", &rows)).await;
        assert!(cut.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!area.dump_path("big").exists());
    }

    #[tokio::test]
    async fn completed_dump_leaves_no_part_file() {
        let base = tempfile::tempdir().unwrap();
        let area = StagingArea::create(base.path(), "shop", 13).unwrap();
        area.write_table_dump("orders", b"1\ta\n").await.unwrap();
        assert!(area.dump_path("orders").is_file());
        assert!(!part_path(&area.dump_path("orders")).exists());
    }

    #[tokio::test]
    async fn listing_is_filtered_when_read() {
        let base = tempfile::tempdir().unwrap();
        let area = StagingArea::create(base.path(), "shop", 9).unwrap();
        area.write_listing(b"users\nschema_migrations\norders\nrepli_chk\n").await.unwrap();
        let set = area.read_listing_lines(&Blacklist::default()).await.unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["users", "orders"]);
    }

    #[tokio::test]
    async fn destroy_removes_everything() {
        let base = tempfile::tempdir().unwrap();
        let area = StagingArea::create(base.path(), "shop", 10).unwrap();
        area.write_listing(b"t\n").await.unwrap();
        area.write_table_dump("t", b"rows").await.unwrap();
        let dir = area.path().to_path_buf();
        area.destroy().unwrap();
        assert!(!dir.exists());
        area.destroy().unwrap();
    }

    #[test]
    fn drop_cleans_up_when_not_destroyed() {
        let base = tempfile::tempdir().unwrap();
        let dir = {
            let area = StagingArea::create(base.path(), "shop", 11).unwrap();
            area.path().to_path_buf()
        };
        assert!(!dir.exists());
    }
}
