//! End-to-end explorer flows against an in-memory OSF.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;

use osf_explorer::error::{OsfError, Result};
use osf_explorer::{
    AuthStatus, Config, ExplorerHandle, NodeKind, NodeRecord, OperationKind, ProgressCallback,
    ROOT_ID, RemoteApi, Session, Token, TransferDirection, TransferProgress, TreeEvent, UserInfo,
};

const REDIRECT: &str = "http://localhost:8250/callback";

#[derive(Default)]
struct MemoryOsf {
    listings: Mutex<HashMap<String, Vec<NodeRecord>>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    revoked: AtomicUsize,
}

impl MemoryOsf {
    fn set(&self, id: &str, children: Vec<NodeRecord>) {
        self.listings.lock().unwrap().insert(id.to_string(), children);
    }
}

#[async_trait]
impl RemoteApi for MemoryOsf {
    async fn list_children(&self, session: &Session, node: &NodeRecord) -> Result<Vec<NodeRecord>> {
        session.bearer()?;
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(&node.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_folder(
        &self,
        session: &Session,
        parent: &NodeRecord,
        name: &str,
    ) -> Result<NodeRecord> {
        session.bearer()?;
        let record = NodeRecord::new(format!("{}/{}", parent.id, name), NodeKind::Folder, name);
        self.listings
            .lock()
            .unwrap()
            .entry(parent.id.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn delete(&self, session: &Session, node: &NodeRecord) -> Result<()> {
        session.bearer()?;
        let mut listings = self.listings.lock().unwrap();
        let before: usize = listings.values().map(Vec::len).sum();
        for children in listings.values_mut() {
            children.retain(|c| c.id != node.id);
        }
        if listings.values().map(Vec::len).sum::<usize>() == before {
            return Err(OsfError::RemoteError {
                status: 404,
                message: "Not found.".to_string(),
            });
        }
        Ok(())
    }

    async fn upload(
        &self,
        session: &Session,
        target: &NodeRecord,
        local_path: &Path,
        mut progress: Option<ProgressCallback>,
    ) -> Result<NodeRecord> {
        session.bearer()?;
        let data = tokio::fs::read(local_path).await?;
        let name = local_path.file_name().unwrap().to_string_lossy().into_owned();
        let total = data.len() as u64;

        for done in [0, total] {
            if let Some(cb) = progress.as_mut() {
                cb(&TransferProgress::new(
                    TransferDirection::Upload,
                    target.id.clone(),
                    name.clone(),
                    done,
                    total,
                ));
            }
        }

        let mut record = NodeRecord::new(format!("{}/{}", target.id, name), NodeKind::File, &name);
        record.size = Some(total);
        self.contents.lock().unwrap().insert(record.id.clone(), data);
        self.listings
            .lock()
            .unwrap()
            .entry(target.id.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn download(
        &self,
        session: &Session,
        node: &NodeRecord,
        local_path: &Path,
        mut progress: Option<ProgressCallback>,
    ) -> Result<()> {
        session.bearer()?;
        let data = self
            .contents
            .lock()
            .unwrap()
            .get(&node.id)
            .cloned()
            .ok_or_else(|| OsfError::RemoteError {
                status: 404,
                message: "Not found.".to_string(),
            })?;
        tokio::fs::write(local_path, &data).await?;
        if let Some(cb) = progress.as_mut() {
            let total = data.len() as u64;
            cb(&TransferProgress::new(
                TransferDirection::Download,
                node.id.clone(),
                node.name.clone(),
                total,
                total,
            ));
        }
        Ok(())
    }

    async fn logged_in_user(&self, session: &Session) -> Result<UserInfo> {
        session.bearer()?;
        Ok(UserInfo {
            id: "u1".to_string(),
            full_name: "Ada Lovelace".to_string(),
            profile_image: None,
            nodes_url: None,
        })
    }

    async fn revoke(&self, session: &Session) -> Result<()> {
        session.bearer()?;
        self.revoked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn folder(id: &str) -> NodeRecord {
    NodeRecord::new(id, NodeKind::Folder, id)
}

fn file(id: &str) -> NodeRecord {
    NodeRecord::new(id, NodeKind::File, id)
}

fn config(dir: &Path) -> Config {
    Config::new("client-1", REDIRECT).with_token_file(dir.join("token.json"))
}

/// Explorer logged in from a stored token, with a subscriber attached first.
async fn explorer(
    remote: Arc<MemoryOsf>,
    dir: &Path,
) -> (ExplorerHandle, broadcast::Receiver<TreeEvent>) {
    Token::new("tok", 3600).save(dir.join("token.json")).unwrap();
    let handle = ExplorerHandle::spawn(config(dir), remote).unwrap();
    let events = handle.subscribe();
    let user = handle.restore_session().await.unwrap().unwrap();
    assert_eq!(user.full_name, "Ada Lovelace");
    (handle, events)
}

/// Tree edits published so far.
fn edits(events: &mut broadcast::Receiver<TreeEvent>) -> Vec<TreeEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        if matches!(
            event,
            TreeEvent::Inserted { .. } | TreeEvent::Removed { .. } | TreeEvent::Updated { .. }
        ) {
            out.push(event);
        }
    }
    out
}

fn ids(records: &[NodeRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

#[tokio::test]
async fn test_expand_refresh_delete() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryOsf::default());
    remote.set(ROOT_ID, vec![folder("a"), file("b")]);
    let (handle, mut events) = explorer(remote.clone(), dir.path()).await;

    // First expansion inserts every child in order.
    let children = handle.expand(ROOT_ID).await.unwrap();
    assert_eq!(ids(&children), ["a", "b"]);
    assert_eq!(
        edits(&mut events),
        [
            TreeEvent::Inserted {
                parent: ROOT_ID.to_string(),
                index: 0,
                record: folder("a"),
            },
            TreeEvent::Inserted {
                parent: ROOT_ID.to_string(),
                index: 1,
                record: file("b"),
            },
        ]
    );

    // The remote drops a and adds c.
    remote.set(ROOT_ID, vec![file("b"), file("c")]);
    let children = handle.refresh(ROOT_ID).await.unwrap();
    assert_eq!(ids(&children), ["b", "c"]);
    assert_eq!(
        edits(&mut events),
        [
            TreeEvent::Removed {
                parent: ROOT_ID.to_string(),
                id: "a".to_string(),
            },
            TreeEvent::Updated {
                parent: ROOT_ID.to_string(),
                index: 0,
                previous_index: 1,
                record: file("b"),
            },
            TreeEvent::Inserted {
                parent: ROOT_ID.to_string(),
                index: 1,
                record: file("c"),
            },
        ]
    );

    // A refresh with nothing changed is silent.
    handle.refresh(ROOT_ID).await.unwrap();
    assert!(edits(&mut events).is_empty());

    handle.delete("b").await.unwrap();
    assert_eq!(ids(&handle.children(ROOT_ID).await.unwrap()), ["c"]);
    assert_eq!(
        edits(&mut events),
        [TreeEvent::Removed {
            parent: ROOT_ID.to_string(),
            id: "b".to_string(),
        }]
    );
    assert!(handle.node("b").await.unwrap().is_none());
}

#[tokio::test]
async fn test_collapse_then_expand_reproduces_children() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryOsf::default());
    remote.set(ROOT_ID, vec![folder("a"), file("b")]);
    remote.set("a", vec![file("a1"), folder("a2")]);
    let (handle, mut events) = explorer(remote, dir.path()).await;

    handle.expand(ROOT_ID).await.unwrap();
    let before = handle.expand("a").await.unwrap();
    edits(&mut events);

    handle.collapse("a").await.unwrap();
    assert!(handle.children("a").await.unwrap().is_empty());
    assert!(handle.node("a1").await.unwrap().is_none());
    assert_eq!(edits(&mut events).len(), 2);

    let after = handle.expand("a").await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_failed_delete_leaves_tree_alone() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryOsf::default());
    remote.set(ROOT_ID, vec![folder("a"), file("b")]);
    let (handle, mut events) = explorer(remote.clone(), dir.path()).await;
    handle.expand(ROOT_ID).await.unwrap();
    edits(&mut events);

    // Someone else removed b already.
    remote.set(ROOT_ID, vec![folder("a")]);
    let err = handle.delete("b").await.unwrap_err();
    assert!(matches!(err, OsfError::RemoteError { status: 404, .. }));
    assert_eq!(ids(&handle.children(ROOT_ID).await.unwrap()), ["a", "b"]);

    let mut failed = None;
    while let Ok(event) = events.try_recv() {
        if let TreeEvent::OperationFailed { kind, target, .. } = event {
            failed = Some((kind, target));
        }
    }
    assert_eq!(failed, Some((OperationKind::Delete, "b".to_string())));
    // 404 is not an auth failure.
    assert_eq!(handle.auth_status().await.unwrap(), AuthStatus::LoggedIn);
}

#[tokio::test]
async fn test_upload_and_download() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryOsf::default());
    remote.set(ROOT_ID, vec![folder("a")]);
    let (handle, mut events) = explorer(remote, dir.path()).await;
    handle.expand(ROOT_ID).await.unwrap();
    handle.expand("a").await.unwrap();

    let local = dir.path().join("results.csv");
    std::fs::write(&local, b"x,y\n1,2\n").unwrap();
    let record = handle.upload("a", &local).await.unwrap();
    assert_eq!(record.id, "a/results.csv");
    assert_eq!(record.size, Some(8));
    assert_eq!(ids(&handle.children("a").await.unwrap()), ["a/results.csv"]);

    let copy = dir.path().join("copy.csv");
    handle.download("a/results.csv", &copy).await.unwrap();
    assert_eq!(std::fs::read(&copy).unwrap(), b"x,y\n1,2\n");

    let mut progress = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TreeEvent::Progress(p) = event {
            progress.push((p.direction, p.done));
        }
    }
    assert_eq!(
        progress,
        [
            (TransferDirection::Upload, 0),
            (TransferDirection::Upload, 8),
            (TransferDirection::Download, 8),
        ]
    );

    // Folders cannot be downloaded.
    assert!(matches!(
        handle.download("a", &copy).await,
        Err(OsfError::Unsupported(_))
    ));
}

#[tokio::test]
async fn test_browser_login_and_logout() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryOsf::default());
    remote.set(ROOT_ID, vec![folder("p1")]);
    let handle = ExplorerHandle::spawn(config(dir.path()), remote.clone()).unwrap();
    let mut events = handle.subscribe();

    let url = handle.begin_login().await.unwrap();
    assert_eq!(handle.auth_status().await.unwrap(), AuthStatus::Authenticating);
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let redirect = format!("{REDIRECT}#access_token=tok&token_type=Bearer&expires_in=3600&state={state}");
    let user = handle.complete_login(&redirect).await.unwrap();
    assert_eq!(user.id, "u1");
    assert!(dir.path().join("token.json").exists());
    assert_eq!(ids(&handle.expand(ROOT_ID).await.unwrap()), ["p1"]);
    assert!(matches!(events.recv().await.unwrap(), TreeEvent::LoggedIn { .. }));

    handle.logout().await.unwrap();
    assert_eq!(handle.auth_status().await.unwrap(), AuthStatus::LoggedOut);
    assert!(!dir.path().join("token.json").exists());
    assert!(handle.children(ROOT_ID).await.unwrap().is_empty());

    for _ in 0..100 {
        if remote.revoked.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(remote.revoked.load(Ordering::SeqCst), 1);

    // Logged out: listing fails fast.
    assert!(matches!(
        handle.expand(ROOT_ID).await,
        Err(OsfError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_denied_login() {
    let dir = tempfile::tempdir().unwrap();
    let handle = ExplorerHandle::spawn(config(dir.path()), Arc::new(MemoryOsf::default())).unwrap();

    let url = handle.begin_login().await.unwrap();
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    let redirect = format!("{REDIRECT}#error=access_denied&state={state}");

    assert!(matches!(
        handle.complete_login(&redirect).await,
        Err(OsfError::LoginFailed(_))
    ));
    assert_eq!(handle.auth_status().await.unwrap(), AuthStatus::LoggedOut);
    assert!(!dir.path().join("token.json").exists());
}

#[tokio::test]
async fn test_expired_stored_token_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let mut token = Token::new("old", 0);
    token.expires_at -= 60.0;
    token.save(dir.path().join("token.json")).unwrap();

    let handle = ExplorerHandle::spawn(config(dir.path()), Arc::new(MemoryOsf::default())).unwrap();
    assert!(handle.restore_session().await.unwrap().is_none());
    assert!(!dir.path().join("token.json").exists());
}
