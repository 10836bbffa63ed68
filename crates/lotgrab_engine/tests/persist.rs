use std::fs;
use std::path::Path;

use lotgrab_engine::{ensure_output_dir, StagedFile};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn staged_file_lands_in_nested_folder() {
    let temp = TempDir::new().unwrap();
    let relative = Path::new("Estate Sale").join("Lamp").join("Lamp-001.jpg");

    let mut staged = StagedFile::create(temp.path(), &relative).unwrap();
    staged.write_chunk(b"abc").unwrap();
    staged.write_chunk(b"def").unwrap();
    let path = staged.commit().unwrap();

    assert_eq!(path, temp.path().join(&relative));
    assert_eq!(fs::read(&path).unwrap(), b"abcdef");
}

#[test]
fn collisions_are_uniquified_not_overwritten() {
    let temp = TempDir::new().unwrap();
    let relative = Path::new("Lamp.jpg");

    let mut paths = Vec::new();
    for body in [b"one", b"two", b"six"] {
        let mut staged = StagedFile::create(temp.path(), relative).unwrap();
        staged.write_chunk(body).unwrap();
        paths.push(staged.commit().unwrap());
    }

    assert_eq!(
        paths,
        vec![
            temp.path().join("Lamp.jpg"),
            temp.path().join("Lamp (1).jpg"),
            temp.path().join("Lamp (2).jpg"),
        ]
    );
    assert_eq!(fs::read(temp.path().join("Lamp.jpg")).unwrap(), b"one");
}

#[test]
fn dropped_stage_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    {
        let mut staged = StagedFile::create(temp.path(), Path::new("partial.jpg")).unwrap();
        staged.write_chunk(b"half").unwrap();
    }
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn staging_under_a_file_fails() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let result = StagedFile::create(temp.path(), &Path::new("not_a_dir").join("a.jpg"));
    assert!(result.is_err());
}
