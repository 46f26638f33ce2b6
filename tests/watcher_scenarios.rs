//! Watcher scenarios driving real file-system events.
//!
//! Timings are generous multiples of the 300 ms debounce window so these
//! stay stable on slow CI machines.

use codeatlas::storage::SearchOptions;
use codeatlas::{FileWatcher, Indexer, Settings};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

async fn start_watcher(temp: &TempDir) -> (Arc<Indexer>, Arc<FileWatcher>) {
    let indexer = Arc::new(Indexer::initialize(temp.path(), Settings::default()).unwrap());
    let watcher = Arc::new(FileWatcher::new(Arc::clone(&indexer)));
    let task = Arc::clone(&watcher);
    tokio::spawn(async move { task.watch().await });
    // Give the notify subscription a moment to come up.
    sleep(Duration::from_millis(200)).await;
    (indexer, watcher)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_then_delete_syncs_store() {
    let temp = TempDir::new().unwrap();
    let (indexer, watcher) = start_watcher(&temp).await;

    let file = temp.path().join("a.py");
    fs::write(&file, "def foo(): pass\n").unwrap();
    sleep(Duration::from_millis(1200)).await;

    assert_eq!(indexer.store().count_files(indexer.project().id).unwrap(), 1);
    let symbols = indexer.store().get_symbols_by_file("a.py").unwrap();
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name, "foo");

    fs::remove_file(&file).unwrap();
    sleep(Duration::from_millis(1200)).await;

    assert_eq!(indexer.store().count_files(indexer.project().id).unwrap(), 0);
    assert!(indexer.store().get_symbols_by_file("a.py").unwrap().is_empty());

    watcher.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bursts_collapse_to_final_content() {
    let temp = TempDir::new().unwrap();
    let (indexer, watcher) = start_watcher(&temp).await;

    let file = temp.path().join("burst.py");
    // Several rewrites inside one debounce window.
    for i in 0..5 {
        fs::write(&file, format!("def rev{i}(): pass\n")).unwrap();
        sleep(Duration::from_millis(30)).await;
    }
    sleep(Duration::from_millis(1200)).await;

    // Only the final content is in the store, under a single file row.
    assert_eq!(indexer.store().count_files(indexer.project().id).unwrap(), 1);
    let symbols = indexer.store().get_symbols_by_file("burst.py").unwrap();
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name, "rev4");
    assert!(indexer
        .store()
        .search_symbols(&SearchOptions::query("rev0"))
        .unwrap()
        .is_empty());

    watcher.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn modify_reindexes_with_new_symbols() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("m.go");
    fs::write(&file, "package m\n\nfunc Old() {}\n").unwrap();

    let (indexer, watcher) = start_watcher(&temp).await;
    // Seed the store through the normal pipeline first.
    indexer.index_file(&file).unwrap();

    fs::write(&file, "package m\n\nfunc New() {}\n").unwrap();
    sleep(Duration::from_millis(1200)).await;

    assert!(indexer
        .store()
        .search_symbols(&SearchOptions::query("Old"))
        .unwrap()
        .is_empty());
    assert_eq!(
        indexer
            .store()
            .search_symbols(&SearchOptions::query("New"))
            .unwrap()
            .len(),
        1
    );

    watcher.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsupported_and_ignored_paths_stay_out() {
    let temp = TempDir::new().unwrap();
    let (indexer, watcher) = start_watcher(&temp).await;

    fs::write(temp.path().join("notes.xyz"), "text\n").unwrap();
    fs::create_dir_all(temp.path().join("node_modules")).unwrap();
    fs::write(temp.path().join("node_modules/dep.js"), "function d() {}\n").unwrap();
    sleep(Duration::from_millis(1200)).await;

    assert_eq!(indexer.store().count_files(indexer.project().id).unwrap(), 0);

    watcher.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn files_in_new_directories_are_picked_up() {
    let temp = TempDir::new().unwrap();
    let (indexer, watcher) = start_watcher(&temp).await;

    let subdir = temp.path().join("pkg");
    fs::create_dir_all(&subdir).unwrap();
    sleep(Duration::from_millis(300)).await;
    fs::write(subdir.join("fresh.go"), "package pkg\n\nfunc Fresh() {}\n").unwrap();
    sleep(Duration::from_millis(1200)).await;

    assert_eq!(
        indexer
            .store()
            .search_symbols(&SearchOptions::query("Fresh"))
            .unwrap()
            .len(),
        1
    );

    watcher.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_suppresses_pending_debounce() {
    let temp = TempDir::new().unwrap();
    let (indexer, watcher) = start_watcher(&temp).await;

    // Write, then stop inside the debounce window: the pending timer must
    // drain without firing.
    fs::write(temp.path().join("late.py"), "def late(): pass\n").unwrap();
    sleep(Duration::from_millis(50)).await;
    watcher.stop();
    sleep(Duration::from_millis(1000)).await;

    assert!(indexer
        .store()
        .search_symbols(&SearchOptions::query("late"))
        .unwrap()
        .is_empty());
}
