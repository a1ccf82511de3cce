//! OSF API client.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::api::types::{UserInfo, parse_listing, parse_record, parse_user};
use crate::config::Config;
use crate::error::{OsfError, Result};
use crate::fs::node::NodeRecord;
use crate::http::HttpClient;
use crate::progress::{ProgressCallback, TransferDirection, TransferProgress};
use crate::session::Session;

/// Remote operations the explorer relies on.
///
/// Every call takes the session explicitly and must fail with
/// [`OsfError::Unauthenticated`] before any I/O when the session has no valid
/// token. Failures are final; nothing is retried.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// List the children of a container node, following pagination.
    async fn list_children(&self, session: &Session, node: &NodeRecord)
    -> Result<Vec<NodeRecord>>;

    /// Create a folder named `name` inside `parent`.
    async fn create_folder(
        &self,
        session: &Session,
        parent: &NodeRecord,
        name: &str,
    ) -> Result<NodeRecord>;

    /// Delete a node.
    async fn delete(&self, session: &Session, node: &NodeRecord) -> Result<()>;

    /// Upload a local file into `target`.
    ///
    /// A folder target receives a new file; a file target receives a new version.
    async fn upload(
        &self,
        session: &Session,
        target: &NodeRecord,
        local_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<NodeRecord>;

    /// Download a file node to `local_path`.
    async fn download(
        &self,
        session: &Session,
        node: &NodeRecord,
        local_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<()>;

    /// Fetch the user owning the session token.
    async fn logged_in_user(&self, session: &Session) -> Result<UserInfo>;

    /// Revoke the session token at the accounts server.
    async fn revoke(&self, session: &Session) -> Result<()>;
}

/// [`RemoteApi`] implementation talking to the OSF over HTTPS.
#[derive(Debug, Clone)]
pub struct OsfClient {
    http: HttpClient,
    api_url: Url,
    accounts_url: Url,
}

impl OsfClient {
    /// Create a client for the servers named in `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = match &config.proxy {
            Some(proxy) => HttpClient::with_proxy(proxy)?,
            None => HttpClient::new()?,
        };
        Ok(Self {
            http,
            api_url: config.api_base()?,
            accounts_url: config.accounts_base()?,
        })
    }
}

fn link<'a>(link: &'a Option<String>, node: &NodeRecord, action: &str) -> Result<&'a str> {
    link.as_deref().ok_or_else(|| {
        OsfError::Unsupported(format!("{} cannot {} ({})", node.name, action, node.id))
    })
}

fn file_name(local_path: &Path) -> Result<String> {
    local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| OsfError::Custom(format!("No file name in {}", local_path.display())))
}

/// Add `kind` and optional `name` query parameters to a WaterButler link.
fn waterbutler_url(link: &str, kind: &str, name: Option<&str>) -> Result<String> {
    let mut url = Url::parse(link)?;
    let has_kind = url.query_pairs().any(|(k, _)| k == "kind");
    {
        let mut pairs = url.query_pairs_mut();
        if !has_kind {
            pairs.append_pair("kind", kind);
        }
        if let Some(name) = name {
            pairs.append_pair("name", name);
        }
    }
    Ok(url.to_string())
}

#[async_trait]
impl RemoteApi for OsfClient {
    async fn list_children(
        &self,
        session: &Session,
        node: &NodeRecord,
    ) -> Result<Vec<NodeRecord>> {
        let token = session.bearer()?;
        let mut next = Some(link(&node.links.children, node, "be listed")?.to_string());
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                tracing::warn!(url, "pagination loop detected, stopping");
                break;
            }
            let page = self
                .http
                .get_json(&url, token)
                .await
                .map_err(OsfError::into_remote)?;
            let (mut page_records, page_next) = parse_listing(page)?;
            records.append(&mut page_records);
            next = page_next;
        }

        tracing::debug!(node = %node.id, count = records.len(), "listed children");
        Ok(records)
    }

    async fn create_folder(
        &self,
        session: &Session,
        parent: &NodeRecord,
        name: &str,
    ) -> Result<NodeRecord> {
        let token = session.bearer()?;
        if name.trim().is_empty() || name.contains('/') {
            return Err(OsfError::Custom(format!("Invalid folder name: {:?}", name)));
        }
        let url = waterbutler_url(
            link(&parent.links.new_folder, parent, "hold folders")?,
            "folder",
            Some(name),
        )?;

        let answer = self
            .http
            .put_json(&url, token, Vec::new())
            .await
            .map_err(OsfError::into_remote)?;
        parse_record(answer)
    }

    async fn delete(&self, session: &Session, node: &NodeRecord) -> Result<()> {
        let token = session.bearer()?;
        let url = link(&node.links.delete, node, "be deleted")?;
        self.http
            .delete(url, token)
            .await
            .map_err(OsfError::into_remote)
    }

    async fn upload(
        &self,
        session: &Session,
        target: &NodeRecord,
        local_path: &Path,
        mut progress: Option<ProgressCallback>,
    ) -> Result<NodeRecord> {
        let token = session.bearer()?;
        let upload_link = link(&target.links.upload, target, "receive uploads")?;
        let filename = file_name(local_path)?;
        let url = if target.is_file() {
            waterbutler_url(upload_link, "file", None)?
        } else {
            waterbutler_url(upload_link, "file", Some(&filename))?
        };

        let body = tokio::fs::read(local_path).await?;
        let total = body.len() as u64;
        let mut report = |done: u64| {
            progress.as_mut().is_none_or(|cb| {
                cb(&TransferProgress::new(
                    TransferDirection::Upload,
                    target.id.clone(),
                    filename.clone(),
                    done,
                    total,
                ))
            })
        };

        if !report(0) {
            return Err(OsfError::Custom("Upload cancelled".to_string()));
        }
        let answer = self
            .http
            .put_json(&url, token, body)
            .await
            .map_err(OsfError::into_remote)?;
        report(total);

        parse_record(answer)
    }

    async fn download(
        &self,
        session: &Session,
        node: &NodeRecord,
        local_path: &Path,
        mut progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let token = session.bearer()?;
        let url = link(&node.links.download, node, "be downloaded")?;
        let response = self
            .http
            .get(url, token)
            .await
            .map_err(OsfError::into_remote)?;

        let total = response.content_length().or(node.size).unwrap_or(0);
        let mut file = tokio::fs::File::create(local_path).await?;
        let mut stream = response.bytes_stream();
        let mut done = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| OsfError::from(e).into_remote())?;
            file.write_all(&chunk).await?;
            done += chunk.len() as u64;

            if let Some(cb) = progress.as_mut() {
                let report = TransferProgress::new(
                    TransferDirection::Download,
                    node.id.clone(),
                    node.name.clone(),
                    done,
                    total,
                );
                if !cb(&report) {
                    drop(file);
                    let _ = tokio::fs::remove_file(local_path).await;
                    return Err(OsfError::Custom("Download cancelled".to_string()));
                }
            }
        }

        file.flush().await?;
        tracing::info!(node = %node.id, bytes = done, path = %local_path.display(), "download finished");
        Ok(())
    }

    async fn logged_in_user(&self, session: &Session) -> Result<UserInfo> {
        let token = session.bearer()?;
        let url = self.api_url.join("users/me/")?;
        let answer = self
            .http
            .get_json(url.as_str(), token)
            .await
            .map_err(OsfError::into_remote)?;
        parse_user(answer)
    }

    async fn revoke(&self, session: &Session) -> Result<()> {
        let token = session.bearer()?;
        let url = self.accounts_url.join("oauth2/revoke")?;
        self.http
            .post_form(url.as_str(), &[("token", token)])
            .await
            .map_err(OsfError::into_remote)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::node::NodeKind;
    use crate::session::Token;

    /// Nothing listens on the discard port; a request would fail with a
    /// transport error, not `Unauthenticated`.
    fn offline_client() -> OsfClient {
        let config = Config {
            api_url: "http://127.0.0.1:9/v2/".to_string(),
            accounts_url: "http://127.0.0.1:9/".to_string(),
            ..Config::default()
        };
        OsfClient::new(&config).unwrap()
    }

    fn folder() -> NodeRecord {
        let mut record = NodeRecord::new("d1", NodeKind::Folder, "data");
        record.links.children = Some("http://127.0.0.1:9/v2/nodes/x/files/osfstorage/d1/".into());
        record.links.new_folder = Some("http://127.0.0.1:9/v1/resources/x/providers/osfstorage/d1/?kind=folder".into());
        record.links.upload = Some("http://127.0.0.1:9/v1/resources/x/providers/osfstorage/d1/".into());
        record.links.delete = Some("http://127.0.0.1:9/v1/resources/x/providers/osfstorage/d1/".into());
        record
    }

    fn file() -> NodeRecord {
        let mut record = NodeRecord::new("f1", NodeKind::File, "a.csv");
        record.links.download = Some("http://127.0.0.1:9/v1/resources/x/providers/osfstorage/f1".into());
        record
    }

    #[tokio::test]
    async fn test_unauthenticated_calls_fail_fast() {
        let client = offline_client();
        let session = Session::anonymous();
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("a.csv");

        assert!(matches!(
            client.list_children(&session, &folder()).await,
            Err(OsfError::Unauthenticated)
        ));
        assert!(matches!(
            client.create_folder(&session, &folder(), "new").await,
            Err(OsfError::Unauthenticated)
        ));
        assert!(matches!(
            client.delete(&session, &folder()).await,
            Err(OsfError::Unauthenticated)
        ));
        assert!(matches!(
            client.upload(&session, &folder(), &local, None).await,
            Err(OsfError::Unauthenticated)
        ));
        assert!(matches!(
            client.download(&session, &file(), &local, None).await,
            Err(OsfError::Unauthenticated)
        ));
        assert!(matches!(
            client.logged_in_user(&session).await,
            Err(OsfError::Unauthenticated)
        ));
        assert!(matches!(
            client.revoke(&session).await,
            Err(OsfError::Unauthenticated)
        ));

        // The download target is never created.
        assert!(!local.exists());
    }

    #[tokio::test]
    async fn test_expired_session_fails_fast() {
        let client = offline_client();
        let mut token = Token::new("tok", 0);
        token.expires_at -= 5.0;
        let session = Session::new(token);

        assert!(matches!(
            client.list_children(&session, &folder()).await,
            Err(OsfError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_remote_error() {
        let client = offline_client();
        let session = Session::new(Token::new("tok", 3600));

        match client.list_children(&session, &folder()).await {
            Err(OsfError::RemoteError { status, .. }) => assert_eq!(status, 0),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_links_are_unsupported() {
        let client = offline_client();
        let session = Session::new(Token::new("tok", 3600));
        let bare = NodeRecord::new("f2", NodeKind::File, "b.csv");

        assert!(matches!(
            client.delete(&session, &bare).await,
            Err(OsfError::Unsupported(_))
        ));
        assert!(matches!(
            client.list_children(&session, &bare).await,
            Err(OsfError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_of_missing_file_is_local_io() {
        let client = offline_client();
        let session = Session::new(Token::new("tok", 3600));
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            client
                .upload(&session, &folder(), &dir.path().join("missing.csv"), None)
                .await,
            Err(OsfError::LocalIo(_))
        ));
    }

    #[test]
    fn test_waterbutler_url() {
        let url = waterbutler_url(
            "https://files.osf.io/v1/resources/x/providers/osfstorage/?kind=folder",
            "folder",
            Some("raw data"),
        )
        .unwrap();
        assert_eq!(
            url,
            "https://files.osf.io/v1/resources/x/providers/osfstorage/?kind=folder&name=raw+data"
        );

        let url = waterbutler_url(
            "https://files.osf.io/v1/resources/x/providers/osfstorage/",
            "file",
            Some("a.csv"),
        )
        .unwrap();
        assert!(url.ends_with("?kind=file&name=a.csv"));
    }
}
