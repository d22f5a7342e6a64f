use dict_cache::loader::{GitCredentials, RemoteRepoLoader, RemoteRepoSpec};
use dict_cache::{parse_schema, DictError, DictLoader};
use git2::{Commit, Repository, RepositoryInitOptions, Signature};
use std::path::Path;
use tempfile::TempDir;

const FILE_PATH: &str = "src/main/resources/dict/MDict.d_schema.xml";

fn schema(longname: &str) -> String {
    format!(
        r#"<schema id="MDict"><complexType id="A"><element id="f1" longname="{longname}" type="String" dbname="F1"/></complexType></schema>"#
    )
}

fn init_origin(dir: &Path) -> Repository {
    let mut options = RepositoryInitOptions::new();
    options.initial_head("master");
    Repository::init_opts(dir, &options).expect("init origin")
}

fn commit_file(repo: &Repository, rel: &str, body: &str, message: &str) {
    let workdir = repo.workdir().expect("workdir").to_path_buf();
    let full = workdir.join(rel);
    std::fs::create_dir_all(full.parent().expect("parent")).expect("mkdir");
    std::fs::write(&full, body).expect("write file");

    let mut index = repo.index().expect("index");
    index.add_path(Path::new(rel)).expect("stage");
    index.write().expect("write index");
    let tree = repo
        .find_tree(index.write_tree().expect("write tree"))
        .expect("find tree");
    let signature = Signature::now("dict", "dict@example.com").expect("signature");
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .expect("commit");
}

fn loader_for(origin: &Path, branch: &str, file_path: &str) -> RemoteRepoLoader {
    RemoteRepoLoader::new(
        RemoteRepoSpec {
            url: format!("file://{}", origin.display()),
            branch: branch.into(),
            file_path: file_path.into(),
            // Local transport does not negotiate shallow history
            depth: 0,
        },
        GitCredentials::default(),
    )
}

#[test]
fn first_fetch_clones_and_reads_file() {
    let origin_dir = TempDir::new().expect("tempdir");
    let origin = init_origin(origin_dir.path());
    commit_file(&origin, FILE_PATH, &schema("客户ID"), "initial");

    let loader = loader_for(origin_dir.path(), "master", FILE_PATH);
    let table = parse_schema(&loader.fetch_raw().expect("fetch")).expect("parse");
    let record = table.get("客户ID").expect("record");
    assert_eq!(record.reference, "MDict.A.f1");
}

#[test]
fn later_fetch_sees_new_commits() {
    let origin_dir = TempDir::new().expect("tempdir");
    let origin = init_origin(origin_dir.path());
    commit_file(&origin, FILE_PATH, &schema("before"), "initial");

    let loader = loader_for(origin_dir.path(), "master", FILE_PATH);
    let table = parse_schema(&loader.fetch_raw().expect("fetch")).expect("parse");
    assert!(table.get("before").is_some());

    commit_file(&origin, FILE_PATH, &schema("after"), "rename field");
    let table = parse_schema(&loader.fetch_raw().expect("refetch")).expect("parse");
    assert!(table.get("after").is_some());
    assert!(table.get("before").is_none());
}

#[test]
fn missing_file_is_source_not_found() {
    let origin_dir = TempDir::new().expect("tempdir");
    let origin = init_origin(origin_dir.path());
    commit_file(&origin, "README.md", "nothing here\n", "initial");

    let loader = loader_for(origin_dir.path(), "master", FILE_PATH);
    let err = loader.fetch_raw().unwrap_err();
    assert!(matches!(err, DictError::SourceNotFound(_)), "got {err:?}");
}

#[test]
fn unknown_branch_fails_without_credentials_error() {
    let origin_dir = TempDir::new().expect("tempdir");
    let origin = init_origin(origin_dir.path());
    commit_file(&origin, FILE_PATH, &schema("x"), "initial");

    let loader = loader_for(origin_dir.path(), "release/9.9", FILE_PATH);
    let err = loader.fetch_raw().unwrap_err();
    assert!(!matches!(err, DictError::Authentication(_)), "got {err:?}");
}

#[test]
fn probe_reports_reachability() {
    let origin_dir = TempDir::new().expect("tempdir");
    let origin = init_origin(origin_dir.path());
    commit_file(&origin, FILE_PATH, &schema("x"), "initial");

    assert!(loader_for(origin_dir.path(), "master", FILE_PATH).probe());

    let gone = origin_dir.path().join("does-not-exist");
    assert!(!loader_for(&gone, "master", FILE_PATH).probe());
}

#[test]
fn release_forces_a_fresh_clone() {
    let origin_dir = TempDir::new().expect("tempdir");
    let origin = init_origin(origin_dir.path());
    commit_file(&origin, FILE_PATH, &schema("one"), "initial");

    let loader = loader_for(origin_dir.path(), "master", FILE_PATH);
    loader.fetch_raw().expect("fetch");
    loader.release();

    commit_file(&origin, FILE_PATH, &schema("two"), "update");
    let table = parse_schema(&loader.fetch_raw().expect("fetch after release")).expect("parse");
    assert!(table.get("two").is_some());
}
