use dict_cache::loader::{ArtifactCoordinate, LocalArchiveLoader};
use dict_cache::{parse_schema, DictError, DictLoader};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const ENTRY: &str = "dict/MDict.d_schema.xml";

fn coordinate() -> ArtifactCoordinate {
    ArtifactCoordinate {
        group_id: "com.example.dict".into(),
        artifact_id: "dict-schema".into(),
        version: "1.0.0-SNAPSHOT".into(),
    }
}

fn schema(longname: &str, id: &str) -> String {
    format!(
        r#"<schema id="MDict"><complexType id="A"><element id="{id}" longname="{longname}" type="String" dbname="{id}_col"/></complexType></schema>"#
    )
}

fn write_jar(path: &Path, entries: &[(&str, &str)], modified: SystemTime) {
    let file = File::create(path).expect("create jar");
    let mut writer = zip::ZipWriter::new(file);
    for (name, body) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(body.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish jar");
    File::options()
        .write(true)
        .open(path)
        .expect("reopen jar")
        .set_modified(modified)
        .expect("set mtime");
}

fn artifact_dir(root: &Path) -> PathBuf {
    let dir = coordinate().directory_in(root);
    std::fs::create_dir_all(&dir).expect("create artifact dir");
    dir
}

fn loader_at(root: &Path) -> LocalArchiveLoader {
    let loader = LocalArchiveLoader::new(coordinate(), ENTRY);
    loader.set_repository_root(root).expect("set root");
    loader
}

#[test]
fn newest_archive_by_mtime_is_read() {
    let repo = TempDir::new().expect("tempdir");
    let dir = artifact_dir(repo.path());
    let base = SystemTime::now() - Duration::from_secs(3600);

    let older = schema("old name", "oldId");
    let newer = schema("new name", "newId");
    write_jar(
        &dir.join("dict-schema-1.0.0-20240101.010101-1.jar"),
        &[(ENTRY, older.as_str())],
        base,
    );
    write_jar(
        &dir.join("dict-schema-1.0.0-20240102.010101-2.jar"),
        &[(ENTRY, newer.as_str())],
        base + Duration::from_secs(60),
    );
    // Not an archive of this artifact
    std::fs::write(dir.join("dict-schema-1.0.0.pom"), "<project/>").expect("write pom");

    let loader = loader_at(repo.path());
    let latest = loader.find_latest_archive().expect("latest");
    assert!(latest.ends_with("dict-schema-1.0.0-20240102.010101-2.jar"));

    let table = parse_schema(&loader.fetch_raw().expect("fetch")).expect("parse");
    assert!(table.get("new name").is_some());
    assert!(table.get("old name").is_none());
    assert!(loader.probe());
}

#[test]
fn rebuilt_archive_is_picked_up_on_next_fetch() {
    let repo = TempDir::new().expect("tempdir");
    let dir = artifact_dir(repo.path());
    let base = SystemTime::now() - Duration::from_secs(3600);
    let first = schema("first", "f1");
    write_jar(&dir.join("dict-schema-1.0.0.jar"), &[(ENTRY, first.as_str())], base);

    let loader = loader_at(repo.path());
    let table = parse_schema(&loader.fetch_raw().expect("fetch")).expect("parse");
    assert!(table.get("first").is_some());

    let second = schema("second", "s1");
    write_jar(
        &dir.join("dict-schema-1.0.0-20240301.000000-3.jar"),
        &[(ENTRY, second.as_str())],
        base + Duration::from_secs(120),
    );
    let table = parse_schema(&loader.fetch_raw().expect("refetch")).expect("parse");
    assert!(table.get("second").is_some());
}

#[test]
fn missing_entry_is_source_not_found() {
    let repo = TempDir::new().expect("tempdir");
    let dir = artifact_dir(repo.path());
    write_jar(
        &dir.join("dict-schema-1.0.0.jar"),
        &[("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n")],
        SystemTime::now(),
    );

    let err = loader_at(repo.path()).fetch_raw().unwrap_err();
    assert!(matches!(err, DictError::SourceNotFound(_)), "got {err:?}");
}

#[test]
fn missing_artifact_directory_is_source_not_found() {
    let repo = TempDir::new().expect("tempdir");
    let loader = loader_at(repo.path());

    assert!(!loader.probe());
    let err = loader.fetch_raw().unwrap_err();
    assert!(matches!(err, DictError::SourceNotFound(_)), "got {err:?}");
}

#[test]
fn directory_without_archives_is_source_not_found() {
    let repo = TempDir::new().expect("tempdir");
    let dir = artifact_dir(repo.path());
    std::fs::write(dir.join("dict-schema-1.0.0.pom"), "<project/>").expect("write pom");

    let err = loader_at(repo.path()).find_latest_archive().unwrap_err();
    assert!(matches!(err, DictError::SourceNotFound(_)), "got {err:?}");
}

#[test]
fn switching_root_moves_to_the_new_repository() {
    let first = TempDir::new().expect("tempdir");
    let second = TempDir::new().expect("tempdir");
    let a = schema("in first", "a");
    let b = schema("in second", "b");
    write_jar(
        &artifact_dir(first.path()).join("dict-schema-1.0.0.jar"),
        &[(ENTRY, a.as_str())],
        SystemTime::now(),
    );
    write_jar(
        &artifact_dir(second.path()).join("dict-schema-1.0.0.jar"),
        &[(ENTRY, b.as_str())],
        SystemTime::now(),
    );

    let loader = loader_at(first.path());
    assert_eq!(loader.repository_root().as_deref(), Some(first.path()));
    loader.set_repository_root(second.path()).expect("switch");
    assert_eq!(loader.repository_root().as_deref(), Some(second.path()));

    let table = parse_schema(&loader.fetch_raw().expect("fetch")).expect("parse");
    assert!(table.get("in second").is_some());
    assert!(table.get("in first").is_none());
}
