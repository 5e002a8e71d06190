use std::fs;
use std::sync::Arc;
use std::thread;

use storage_node::error::{ErrorKind, StorageError};
use storage_node::storage::{DeleteResult, FileStore};
use tempfile::TempDir;

// Helper to create a sandboxed store
fn setup_store() -> (TempDir, FileStore) {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path().join("storage"), true).unwrap();
    (dir, store)
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

#[test]
fn open_creates_missing_root() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("nested").join("storage");
    let store = FileStore::open(&root, true).unwrap();
    assert!(root.is_dir());
    assert_eq!(store.root(), root.canonicalize().unwrap());
}

#[test]
fn write_then_read_round_trips() {
    let (_dir, store) = setup_store();
    let content = b"\x00\x01binary\xffpayload".to_vec();

    let written = store.write("blob.bin", &content, None).unwrap();
    assert_eq!(written.virtual_path, "blob.bin");
    assert_eq!(written.metadata.size_bytes, content.len() as u64);

    let read = store.read("blob.bin").unwrap();
    assert_eq!(read.content, content);
    assert_eq!(read.metadata.size_bytes, content.len() as u64);
    assert_eq!(read.name, "blob.bin");
}

#[test]
fn write_creates_subdirectory_and_overwrites() {
    let (_dir, store) = setup_store();

    store.write("notes.txt", b"first", Some("a/b")).unwrap();
    let written = store.write("notes.txt", b"second", Some("a/b")).unwrap();
    assert_eq!(written.virtual_path, "a/b/notes.txt");

    assert_eq!(store.read("a/b/notes.txt").unwrap().content, b"second");
    // No temporary files left behind.
    assert_eq!(store.list_files("a/b").unwrap(), vec!["notes.txt".to_string()]);
}

#[test]
fn write_rejects_bad_names_and_paths() {
    let (_dir, store) = setup_store();

    let err = store.write("", b"x", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = store.write("../escape.txt", b"x", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = store.write("ok.txt", b"x", Some("../../outside")).unwrap_err();
    assert!(matches!(err, StorageError::PathTraversal(_)));
}

#[test]
fn write_over_directory_is_invalid() {
    let (_dir, store) = setup_store();
    store.create_directory("taken").unwrap();
    let err = store.write("taken", b"x", None).unwrap_err();
    assert!(matches!(err, StorageError::IsADirectory(_)));
}

#[test]
fn traversal_never_touches_outside_root() {
    let dir = TempDir::new().unwrap();
    let outside = dir.path().join("outside.txt");
    fs::write(&outside, b"keep me").unwrap();
    let store = FileStore::open(dir.path().join("storage"), true).unwrap();

    assert_eq!(
        store.delete("../outside.txt").unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(
        store.read("../outside.txt").unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(
        store.rename("../outside.txt", "stolen.txt").unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(fs::read(&outside).unwrap(), b"keep me");
}

#[test]
fn create_directory_is_idempotent() {
    let (_dir, store) = setup_store();
    store.create_directory("x/y/z").unwrap();
    store.create_directory("x/y/z").unwrap();
    assert!(store.root().join("x/y/z").is_dir());

    let err = store.create_directory("").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn create_subdirectory_under_parent() {
    let (_dir, store) = setup_store();
    let created = store.create_subdirectory("newdir", "subdir").unwrap();
    assert_eq!(created.virtual_path, "newdir/subdir");
    assert!(store.root().join("newdir/subdir").is_dir());

    assert!(store.create_subdirectory("", "subdir").is_err());
    assert!(store.create_subdirectory("newdir", "").is_err());
    assert!(store.create_subdirectory("newdir", "/abs").is_err());
}

#[test]
fn move_preserves_content() {
    let (_dir, store) = setup_store();
    store.write("file3.txt", b"content 3", None).unwrap();
    store.create_subdirectory("newdir", "subdir").unwrap();

    let moved = store.move_entry("file3.txt", "newdir/subdir/file3.txt").unwrap();
    assert_eq!(moved.to, "newdir/subdir/file3.txt");

    assert_eq!(
        store.read("newdir/subdir/file3.txt").unwrap().content,
        b"content 3"
    );
    let err = store.read("file3.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn rename_preserves_content() {
    let (_dir, store) = setup_store();
    store.write("file2.txt", b"content 2", None).unwrap();
    store.create_directory("newdir").unwrap();

    store.rename("file2.txt", "newdir/renamed.txt").unwrap();
    assert_eq!(store.read("newdir/renamed.txt").unwrap().content, b"content 2");
    assert_eq!(store.read("file2.txt").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn move_of_missing_source_is_not_found() {
    let (_dir, store) = setup_store();
    let err = store.move_entry("ghost", "elsewhere").unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn move_into_missing_parent_is_internal() {
    let (_dir, store) = setup_store();
    store.write("a.txt", b"a", None).unwrap();
    let err = store.move_entry("a.txt", "no/such/dir/a.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(store.read("a.txt").unwrap().content, b"a");
}

#[test]
fn root_cannot_be_moved_or_deleted() {
    let (_dir, store) = setup_store();
    assert_eq!(store.delete(".").unwrap_err().kind(), ErrorKind::InvalidInput);
    assert_eq!(
        store.rename("a/..", "b").unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[test]
fn delete_file_and_directory_tree() {
    let (_dir, store) = setup_store();
    store.write("keep.txt", b"k", None).unwrap();
    store.write("gone.txt", b"g", Some("tree/inner")).unwrap();

    assert_eq!(store.delete("tree").unwrap(), DeleteResult::DirectoryRemoved);
    assert!(!store.root().join("tree").exists());

    assert_eq!(store.delete("keep.txt").unwrap(), DeleteResult::FileRemoved);
    assert!(store.list_files("").unwrap().is_empty());
}

#[test]
fn delete_is_idempotent() {
    let (_dir, store) = setup_store();
    store.write("once.txt", b"1", None).unwrap();

    assert_eq!(store.delete("once.txt").unwrap(), DeleteResult::FileRemoved);
    assert_eq!(store.delete("once.txt").unwrap(), DeleteResult::Missing);
    assert_eq!(store.delete("never-existed").unwrap(), DeleteResult::Missing);
}

#[test]
fn delete_below_a_regular_file_is_missing() {
    let (_dir, store) = setup_store();
    store.write("plain.txt", b"p", None).unwrap();

    assert_eq!(store.delete("plain.txt/ghost").unwrap(), DeleteResult::Missing);
    assert_eq!(store.delete("plain.txt/a/b").unwrap(), DeleteResult::Missing);
    assert_eq!(store.read("plain.txt").unwrap().content, b"p");
}

#[test]
fn read_below_a_regular_file_is_not_found() {
    let (_dir, store) = setup_store();
    store.write("plain.txt", b"p", None).unwrap();

    let err = store.read("plain.txt/ghost").unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn directory_creation_cannot_target_root_or_parent() {
    let (_dir, store) = setup_store();
    store.create_directory("docs").unwrap();

    for name in ["..", ".", "inner/../.."] {
        let err = store.create_subdirectory("docs", name).unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)), "{name}: {err:?}");
    }
    for path in ["a/..", ".", "docs/.."] {
        let err = store.create_directory(path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{path}");
    }
    assert!(!store.root().join("a").exists());

    let created = store.create_subdirectory("docs", "x/../y").unwrap();
    assert_eq!(created.virtual_path, "docs/y");
}

#[test]
fn listings_hide_in_progress_writes() {
    let (_dir, store) = setup_store();
    store.write("real.txt", b"r", Some("d")).unwrap();
    // Left behind by an interrupted write.
    fs::write(store.root().join("d/.real.txt.999-3.tmp"), b"partial").unwrap();
    fs::write(store.root().join("d/.hidden"), b"h").unwrap();

    assert_eq!(sorted(store.list_files("d").unwrap()), vec![".hidden", "real.txt"]);
    assert_eq!(sorted(store.list_all("d").unwrap().files), vec![".hidden", "real.txt"]);
}

#[test]
fn list_all_partitions_entries() {
    let (_dir, store) = setup_store();
    store.write("a.txt", b"a", Some("d")).unwrap();
    store.write("b.txt", b"b", Some("d")).unwrap();
    store.create_subdirectory("d", "c").unwrap();

    let listing = store.list_all("d").unwrap();
    assert_eq!(sorted(listing.files), vec!["a.txt", "b.txt"]);
    assert_eq!(listing.directories, vec!["c"]);

    assert_eq!(sorted(store.list_files("d").unwrap()), vec!["a.txt", "b.txt", "c"]);
    assert_eq!(store.list_directories("d").unwrap(), vec!["c"]);
}

#[test]
fn list_root_with_empty_path() {
    let (_dir, store) = setup_store();
    store.write("top.txt", b"t", None).unwrap();
    assert_eq!(store.list_files("").unwrap(), vec!["top.txt"]);
}

#[test]
fn list_of_unreadable_directory_is_not_found() {
    let (_dir, store) = setup_store();
    store.write("plain.txt", b"p", None).unwrap();

    for path in ["missing", "plain.txt"] {
        assert_eq!(store.list_all(path).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.list_files(path).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            store.list_directories(path).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}

#[test]
fn read_of_directory_is_invalid() {
    let (_dir, store) = setup_store();
    store.create_directory("folder").unwrap();
    let err = store.read("folder").unwrap_err();
    assert!(matches!(err, StorageError::IsADirectory(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn concurrent_writes_to_same_path_leave_one_whole_file() {
    let (_dir, store) = setup_store();
    let store = Arc::new(store);

    let writers: Vec<_> = (0..8u8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let content = vec![i; 64 * 1024];
                store.write("contended.bin", &content, None).unwrap();
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let content = store.read("contended.bin").unwrap().content;
    assert_eq!(content.len(), 64 * 1024);
    assert!(content.iter().all(|b| *b == content[0]));
}
