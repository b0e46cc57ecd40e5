#![allow(dead_code)]

use assert_fs::TempDir;
use sctl::areas::repository::Repository;
use sctl::artifacts::objects::object_id::ObjectId;
use std::path::Path;

/// A repository in a temp dir with configured authorship.
pub struct TestRepo {
    pub temp: TempDir,
    pub repository: Repository,
}

impl TestRepo {
    pub fn write_file(&self, path: &str, content: &str) {
        let full_path = self.temp.path().join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(full_path, content).expect("write workspace file");
    }

    pub fn remove_file(&self, path: &str) {
        std::fs::remove_file(self.temp.path().join(path)).expect("remove workspace file");
    }

    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.temp.path().join(path)).expect("read workspace file")
    }

    pub fn file_exists(&self, path: &str) -> bool {
        self.temp.path().join(path).is_file()
    }

    pub async fn stage_all(&self) {
        self.repository
            .add(&[".".to_string()])
            .await
            .expect("stage all files");
    }

    pub async fn commit_all(&self, message: &str) -> ObjectId {
        self.stage_all().await;
        self.repository.commit(message).await.expect("commit")
    }

    pub fn head(&self) -> ObjectId {
        self.repository
            .refs()
            .read_head()
            .expect("read HEAD")
            .expect("HEAD is born")
    }

    /// Count every commit reachable from HEAD.
    pub fn history_len(&self) -> usize {
        use sctl::artifacts::log::rev_list::{RevList, WalkOptions};
        use tokio_util::sync::CancellationToken;

        RevList::new(
            self.repository.database(),
            self.head(),
            WalkOptions::default(),
            CancellationToken::new(),
        )
        .expect("start walk")
        .count()
    }
}

/// Fresh repository with generated `user.name`/`user.email` configured.
pub async fn init_repository() -> TestRepo {
    use fake::Fake;
    use fake::faker::internet::en::FreeEmail;
    use fake::faker::name::en::Name;

    let temp = TempDir::new().expect("temp dir");
    let repository = Repository::new(temp.path().to_path_buf(), Box::new(std::io::sink()))
        .expect("open repository");
    repository.init().await.expect("init repository");

    let name = Name().fake::<String>().replace(' ', "_");
    let email = FreeEmail().fake::<String>();
    repository
        .config()
        .set("user.name", &name)
        .expect("set user.name");
    repository
        .config()
        .set("user.email", &email)
        .expect("set user.email");

    TestRepo { temp, repository }
}

/// Index entries as (path, stage, digest) rows, for asserting on stages.
pub async fn index_rows(repo: &TestRepo) -> Vec<(String, u8, ObjectId)> {
    let index = repo.repository.index();
    let mut index = index.lock().await;
    index.rehydrate().expect("rehydrate index");

    index
        .entries()
        .map(|entry| {
            (
                entry.path_key().expect("path key"),
                entry.stage,
                entry.oid,
            )
        })
        .collect()
}

pub fn blob_oid_of(content: &str) -> ObjectId {
    use sctl::artifacts::objects::blob::Blob;
    use sctl::artifacts::objects::object::Object;

    Blob::new(content.as_bytes().to_vec())
        .object_id()
        .expect("blob digest")
}

pub fn tree_entry_names(repo: &TestRepo, tree_oid: &ObjectId) -> Vec<(String, String)> {
    let tree = repo
        .repository
        .database()
        .load_tree(tree_oid)
        .expect("load tree");
    tree.entries()
        .iter()
        .map(|entry| {
            (
                entry.name().to_string(),
                entry.mode().as_octal_str().to_string(),
            )
        })
        .collect()
}

pub fn path(p: &str) -> &Path {
    Path::new(p)
}
