// Copyright (C) 2026  lfsync Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! End-to-end engine runs: local upstream repositories cloned through
//! [`LocalMirror`], large files served by [`ResolveServer`].

use lfsync_config::{CredentialProvider, CredentialScope, CredentialSource, NoCredential};
use lfsync_sync::{
    verify_tree, AssumeYes, HttpTransfer, RejectedExtensions, RepositoryOutcome, RepositoryRef,
    Observed, SyncEngine, SyncError, SyncSettings,
};
use lfsync_test_utils::{
    assert_is_stub, assert_materialized, assert_working_tree, LocalMirror, ResolveServer,
    TestFixtures, TestHub, UpstreamRepo,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    hub: TestHub,
    server: ResolveServer,
    mirror: Arc<LocalMirror>,
    out: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let hub = TestHub::new();
        let server = ResolveServer::start().await;
        let mirror = Arc::new(LocalMirror::new(server.endpoint(), hub.path()));
        Self {
            hub,
            server,
            mirror,
            out: TempDir::new().unwrap(),
        }
    }

    /// Upstream `acme/model` with a text file and one large file.
    fn model_repo(&self, weights: &[u8]) -> UpstreamRepo {
        let mut upstream = self.hub.create_repo("acme", "model");
        upstream
            .write_file("a.txt", b"hello\n")
            .write_lfs_file("model.bin", weights)
            .commit("initial");
        self.server.publish("acme", "model", "main", &upstream);
        upstream
    }

    fn settings(&self, max_attempts: u32) -> SyncSettings {
        SyncSettings {
            endpoint: self.server.endpoint(),
            max_attempts,
            retry_delay: Duration::ZERO,
            resume_threshold: 1024,
            probe_timeout: Duration::from_secs(5),
        }
    }

    fn engine(&self, max_attempts: u32) -> SyncEngine {
        self.engine_with(max_attempts, Arc::new(NoCredential))
    }

    fn engine_with(&self, max_attempts: u32, credentials: Arc<dyn CredentialProvider>) -> SyncEngine {
        SyncEngine::new(
            self.settings(max_attempts),
            credentials,
            Arc::clone(&self.mirror) as Arc<dyn lfsync_git::VersionControl>,
            Arc::new(HttpTransfer::new().unwrap()),
        )
    }

    fn target(&self, owner: &str, name: &str) -> RepositoryRef {
        RepositoryRef::new(owner, name, "main", self.out.path().join(owner).join(name))
    }
}

fn failed_on_repository_state(outcome: &RepositoryOutcome) -> bool {
    matches!(
        outcome,
        RepositoryOutcome::Failed {
            error: SyncError::RepositoryState { .. },
            ..
        }
    )
}

/// Deletes every object, loose or packed, so HEAD no longer resolves.
fn drop_object_store(root: &Path) {
    let objects = root.join(".git").join("objects");
    for entry in std::fs::read_dir(&objects).unwrap() {
        let path = entry.unwrap().path();
        match path.file_name().and_then(|n| n.to_str()) {
            Some("info") => {}
            Some("pack") => {
                for pack in std::fs::read_dir(&path).unwrap() {
                    std::fs::remove_file(pack.unwrap().path()).unwrap();
                }
            }
            _ => std::fs::remove_dir_all(&path).unwrap(),
        }
    }
}

#[tokio::test]
async fn test_sync_materializes_and_verifies() {
    let h = Harness::new().await;
    let weights = TestFixtures::binary_file(4096);
    h.model_repo(&weights);
    let target = h.target("acme", "model");
    let root = target.destination.clone();

    let report = h.engine(3).run(vec![target]).await;

    assert!(report.success());
    assert_eq!(report.exit_code(), 0);
    let repo = &report.repositories[0];
    assert!(repo.outcome.is_verified());
    assert_eq!(repo.stats.files_fetched, 1);
    assert_eq!(repo.stats.bytes_downloaded, 4096);
    assert_materialized(&root.join("model.bin"), &weights);
    assert_materialized(&root.join("a.txt"), b"hello\n");
    assert_eq!(h.mirror.clone_count(), 1);
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let h = Harness::new().await;
    h.model_repo(&TestFixtures::binary_file(4096));
    let engine = h.engine(3);

    let first = engine.run(vec![h.target("acme", "model")]).await;
    assert!(first.success());
    let downloads = h.server.resolve_requests().len();

    let second = engine.run(vec![h.target("acme", "model")]).await;
    assert!(second.success());
    assert_eq!(second.repositories[0].stats.files_fetched, 0);
    assert_eq!(h.server.resolve_requests().len(), downloads);
    assert_eq!(h.mirror.clone_count(), 1);
    assert_eq!(h.mirror.pull_count(), 1);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let h = Harness::new().await;
    let weights = TestFixtures::large_file(3000);
    h.model_repo(&weights);
    h.server.fail_next(2);
    let target = h.target("acme", "model");
    let root = target.destination.clone();

    let report = h.engine(3).run(vec![target]).await;

    assert!(report.success());
    assert_eq!(report.repositories[0].stats.attempts, 3);
    assert_eq!(h.server.resolve_requests().len(), 3);
    assert_materialized(&root.join("model.bin"), &weights);
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_run() {
    let h = Harness::new().await;
    h.model_repo(&TestFixtures::binary_file(4096));
    h.server.fail_next(10);
    let target = h.target("acme", "model");
    let root = target.destination.clone();

    let report = h.engine(2).run(vec![target]).await;

    assert!(!report.success());
    assert_eq!(report.exit_code(), 1);
    match &report.repositories[0].outcome {
        RepositoryOutcome::Failed { error, mismatches } => {
            assert!(matches!(
                error,
                SyncError::RetriesExhausted { attempts: 2, .. }
            ));
            assert_eq!(mismatches.len(), 1);
            assert_eq!(mismatches[0].path, "model.bin");
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(h.server.resolve_requests().len(), 2);
    assert_is_stub(&root.join("model.bin"));
}

#[tokio::test]
async fn test_tampered_content_is_reported() {
    let h = Harness::new().await;
    let weights = TestFixtures::binary_file(4096);
    let upstream = h.model_repo(&weights);
    let engine = h.engine(3);
    let target = h.target("acme", "model");
    let root = target.destination.clone();

    assert!(engine.run(vec![target.clone()]).await.success());
    std::fs::write(root.join("model.bin"), vec![7u8; 4096]).unwrap();

    let report = engine.run(vec![target]).await;

    assert_eq!(report.exit_code(), 1);
    let mismatches = report.repositories[0].outcome.mismatches();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].path, "model.bin");
    assert_eq!(mismatches[0].expected, upstream.lfs_oid("model.bin").unwrap());
    assert_eq!(
        mismatches[0].actual,
        Observed::Hash(lfsync_test_utils::repo::sha256_hex(&[7u8; 4096]))
    );
    assert!(matches!(
        report.repositories[0].outcome,
        RepositoryOutcome::Mismatched(_)
    ));
}

#[tokio::test]
async fn test_interrupted_download_is_resumed() {
    let h = Harness::new().await;
    let weights = TestFixtures::large_file(8192);
    h.model_repo(&weights);
    let target = h.target("acme", "model");
    let root = target.destination.clone();

    h.server.fail_next(1);
    let failed = h.engine(1).run(vec![target.clone()]).await;
    assert!(!failed.success());
    std::fs::write(root.join("model.bin"), &weights[..2048]).unwrap();

    let report = h.engine(3).run(vec![target]).await;

    assert!(report.success());
    let stats = report.repositories[0].stats;
    assert_eq!(stats.resumed_transfers, 1);
    assert_eq!(stats.bytes_downloaded, 8192 - 2048);
    let last = h.server.resolve_requests().pop().unwrap();
    assert_eq!(last.range.as_deref(), Some("bytes=2048-"));
    assert_materialized(&root.join("model.bin"), &weights);
}

#[tokio::test]
async fn test_rejected_extension_aborts_before_fetch() {
    let h = Harness::new().await;
    let mut upstream = h.hub.create_repo("acme", "quant");
    upstream
        .write_lfs_file("weights.GGUF", &TestFixtures::binary_file(2048))
        .write_lfs_file("model.bin", &TestFixtures::binary_file(2048))
        .commit("initial");
    h.server.publish("acme", "quant", "main", &upstream);

    let engine = h
        .engine(3)
        .with_policy(Arc::new(RejectedExtensions::new(["gguf"])));
    let report = engine.run(vec![h.target("acme", "quant")]).await;

    match &report.repositories[0].outcome {
        RepositoryOutcome::Failed {
            error: SyncError::RejectedContent { paths },
            ..
        } => assert_eq!(paths, &vec!["weights.GGUF".to_string()]),
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(h.server.resolve_requests().is_empty());
}

#[tokio::test]
async fn test_private_repository_requires_credential() {
    let h = Harness::new().await;
    let weights = TestFixtures::binary_file(2048);
    h.model_repo(&weights);
    h.server.make_private("acme", "model", "hf_secret");
    let target = h.target("acme", "model");
    let root = target.destination.clone();

    let denied = h.engine(3).run(vec![target.clone()]).await;
    assert!(matches!(
        denied.repositories[0].outcome,
        RepositoryOutcome::Failed {
            error: SyncError::AccessDenied { .. },
            ..
        }
    ));
    assert!(!root.exists());
    assert_eq!(h.mirror.clone_count(), 0);

    let scope = CredentialScope::acquire(&CredentialSource::token("hf_secret")).unwrap();
    let report = h.engine_with(3, scope).run(vec![target]).await;
    assert!(report.success());
    let download = &h.server.resolve_requests()[0];
    assert_eq!(download.authorization.as_deref(), Some("Bearer hf_secret"));
    assert_materialized(&root.join("model.bin"), &weights);
}

#[tokio::test]
async fn test_unknown_repository_is_not_found() {
    let h = Harness::new().await;
    let report = h.engine(3).run(vec![h.target("acme", "missing")]).await;
    assert!(matches!(
        report.repositories[0].outcome,
        RepositoryOutcome::Failed {
            error: SyncError::RepositoryNotFound { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_occupied_destination_is_left_alone_when_declined() {
    let h = Harness::new().await;
    h.model_repo(&TestFixtures::binary_file(2048));
    let target = h.target("acme", "model");
    let keep = TestFixtures::write(&target.destination, "notes.txt", b"mine");

    let report = h.engine(3).run(vec![target]).await;

    assert!(matches!(
        report.repositories[0].outcome,
        RepositoryOutcome::Failed {
            error: SyncError::RepositoryState { .. },
            ..
        }
    ));
    assert_materialized(&keep, b"mine");
    assert_eq!(h.mirror.clone_count(), 0);
}

#[tokio::test]
async fn test_occupied_destination_is_deleted_when_confirmed() {
    let h = Harness::new().await;
    h.model_repo(&TestFixtures::binary_file(2048));
    let target = h.target("acme", "model");
    let root = target.destination.clone();
    TestFixtures::write(&root, "notes.txt", b"mine");

    let engine = h.engine(3).with_confirmer(Arc::new(AssumeYes));
    let first = engine.run(vec![target.clone()]).await;
    assert!(!first.success());
    assert!(!root.exists());

    let second = engine.run(vec![target]).await;
    assert!(second.success());
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_run() {
    let h = Harness::new().await;
    h.model_repo(&TestFixtures::binary_file(2048));
    let targets = vec![h.target("acme", "missing"), h.target("acme", "model")];

    let report = h.engine(3).run(targets).await;

    assert_eq!(report.repositories.len(), 2);
    assert!(!report.repositories[0].outcome.is_verified());
    assert!(report.repositories[1].outcome.is_verified());
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_deleted_files_are_restored_and_fetched() {
    let h = Harness::new().await;
    let weights = TestFixtures::binary_file(4096);
    h.model_repo(&weights);
    let engine = h.engine(3);
    let target = h.target("acme", "model");
    let root = target.destination.clone();

    assert!(engine.run(vec![target.clone()]).await.success());
    std::fs::remove_file(root.join("model.bin")).unwrap();
    std::fs::remove_file(root.join("a.txt")).unwrap();

    let report = engine.run(vec![target]).await;

    assert!(report.success());
    assert_materialized(&root.join("a.txt"), b"hello\n");
    assert_materialized(&root.join("model.bin"), &weights);
    assert_eq!(report.repositories[0].stats.files_fetched, 1);
}

#[tokio::test]
async fn test_verify_tree_offline() {
    let h = Harness::new().await;
    h.model_repo(&TestFixtures::binary_file(4096));
    let target = h.target("acme", "model");
    let root = target.destination.clone();
    assert!(h.engine(3).run(vec![target]).await.success());

    let report = verify_tree(h.mirror.as_ref(), &root).await.unwrap();
    assert!(report.all_passed());
    assert_eq!(report.total, 1);

    std::fs::remove_file(root.join("model.bin")).unwrap();
    let report = verify_tree(h.mirror.as_ref(), &root).await.unwrap();
    assert!(!report.all_passed());
    assert!(report.failures[0].is_absent());
}

#[tokio::test]
async fn test_branch_switch_keeps_existing_mirror() {
    let h = Harness::new().await;
    let v1 = TestFixtures::binary_file(4096);
    let v2 = TestFixtures::large_file(6000);
    let mut upstream = h.hub.create_repo("acme", "model");
    upstream
        .write_file("a.txt", b"hello\n")
        .write_lfs_file("model.bin", &v1)
        .commit("initial")
        .create_branch("dev");
    h.server.publish("acme", "model", "dev", &upstream);
    upstream.write_lfs_file("model.bin", &v2).commit("new weights");
    h.server.publish("acme", "model", "main", &upstream);

    let engine = h.engine(3).with_confirmer(Arc::new(AssumeYes));
    let main = h.target("acme", "model");
    let root = main.destination.clone();
    let dev = RepositoryRef::new("acme", "model", "dev", root.clone());

    let first = engine.run(vec![main.clone()]).await;
    assert!(first.success());
    assert_materialized(&root.join("model.bin"), &v2);

    let second = engine.run(vec![dev]).await;
    assert!(second.success(), "{:?}", second.repositories[0].outcome);
    assert_materialized(&root.join("model.bin"), &v1);
    assert_materialized(&root.join("a.txt"), b"hello\n");

    let third = engine.run(vec![main]).await;
    assert!(third.success(), "{:?}", third.repositories[0].outcome);
    assert_materialized(&root.join("model.bin"), &v2);
    assert_eq!(h.mirror.clone_count(), 1);
}

#[tokio::test]
async fn test_corrupt_mirror_is_kept_when_declined() {
    let h = Harness::new().await;
    let weights = TestFixtures::binary_file(2048);
    h.model_repo(&weights);
    let target = h.target("acme", "model");
    let root = target.destination.clone();
    let engine = h.engine(3);

    assert!(engine.run(vec![target.clone()]).await.success());
    drop_object_store(&root);

    let report = engine.run(vec![target]).await;

    assert!(failed_on_repository_state(&report.repositories[0].outcome));
    assert_working_tree(&root);
    assert_materialized(&root.join("model.bin"), &weights);
    assert_eq!(h.mirror.clone_count(), 1);
    assert_eq!(h.mirror.pull_count(), 0);
}

#[tokio::test]
async fn test_corrupt_mirror_is_deleted_when_confirmed() {
    let h = Harness::new().await;
    h.model_repo(&TestFixtures::binary_file(2048));
    let target = h.target("acme", "model");
    let root = target.destination.clone();
    let engine = h.engine(3).with_confirmer(Arc::new(AssumeYes));

    assert!(engine.run(vec![target.clone()]).await.success());
    drop_object_store(&root);

    let report = engine.run(vec![target.clone()]).await;
    assert!(failed_on_repository_state(&report.repositories[0].outcome));
    assert!(!root.exists());

    let retry = engine.run(vec![target]).await;
    assert!(retry.success());
    assert_eq!(h.mirror.clone_count(), 2);
}

#[tokio::test]
async fn test_unknown_branch_clone_is_kept_when_declined() {
    let h = Harness::new().await;
    h.model_repo(&TestFixtures::binary_file(2048));
    let root = h.out.path().join("acme").join("model");
    let target = RepositoryRef::new("acme", "model", "nope", root.clone());

    let report = h.engine(3).run(vec![target]).await;

    assert!(failed_on_repository_state(&report.repositories[0].outcome));
    assert_working_tree(&root);
    assert_is_stub(&root.join("model.bin"));
    assert_eq!(h.mirror.clone_count(), 1);
    assert!(h.server.resolve_requests().is_empty());
}

#[tokio::test]
async fn test_unknown_branch_clone_is_deleted_when_confirmed() {
    let h = Harness::new().await;
    h.model_repo(&TestFixtures::binary_file(2048));
    let root = h.out.path().join("acme").join("model");
    let target = RepositoryRef::new("acme", "model", "nope", root.clone());

    let report = h
        .engine(3)
        .with_confirmer(Arc::new(AssumeYes))
        .run(vec![target])
        .await;

    assert!(failed_on_repository_state(&report.repositories[0].outcome));
    assert!(!root.exists());
    assert_eq!(h.mirror.clone_count(), 1);
}
