//! Actor that owns the tree, the login state and the in-flight operations.
//!
//! Commands arrive on one channel, API completions on another; both are
//! handled one at a time so nothing inside needs a lock. Remote calls run on
//! spawned tasks holding a clone of the session.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use url::Url;

use crate::api::client::{OsfClient, RemoteApi};
use crate::api::types::UserInfo;
use crate::config::Config;
use crate::error::{OsfError, Result};
use crate::events::{EventBus, OperationKind, TreeEvent};
use crate::fs::node::{Node, NodeRecord, ROOT_ID};
use crate::fs::tree::{FetchTicket, RemoteTree};
use crate::progress::ProgressCallback;
use crate::session::auth::{AuthManager, AuthStatus};
use crate::session::pending::{OpKey, Outcome, PendingTable, Waiter, reply_waiter};
use crate::session::session::{Session, Token};

type UserReply = Box<dyn FnOnce(Result<UserInfo>) + Send>;

/// Cloneable front end of the explorer actor.
#[derive(Clone)]
pub struct ExplorerHandle {
    tx: mpsc::Sender<ExplorerCommand>,
    events: EventBus,
}

enum ExplorerCommand {
    Expand {
        id: String,
        reply: oneshot::Sender<Result<Vec<NodeRecord>>>,
    },
    Collapse {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Refresh {
        id: String,
        reply: oneshot::Sender<Result<Vec<NodeRecord>>>,
    },
    CreateFolder {
        parent: String,
        name: String,
        reply: oneshot::Sender<Result<NodeRecord>>,
    },
    Delete {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Upload {
        target: String,
        local: PathBuf,
        reply: oneshot::Sender<Result<NodeRecord>>,
    },
    Download {
        id: String,
        local: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },
    BeginLogin {
        reply: oneshot::Sender<Result<Url>>,
    },
    CompleteLogin {
        redirect_url: String,
        reply: oneshot::Sender<Result<UserInfo>>,
    },
    CancelLogin {
        reply: oneshot::Sender<Result<()>>,
    },
    Logout {
        reply: oneshot::Sender<Result<()>>,
    },
    RestoreSession {
        reply: oneshot::Sender<Result<Option<UserInfo>>>,
    },
    Children {
        id: String,
        reply: oneshot::Sender<Result<Vec<NodeRecord>>>,
    },
    Node {
        id: String,
        reply: oneshot::Sender<Result<Option<NodeRecord>>>,
    },
    AuthStatus {
        reply: oneshot::Sender<Result<AuthStatus>>,
    },
    User {
        reply: oneshot::Sender<Result<Option<UserInfo>>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum Completion {
    Listed {
        key: OpKey,
        ticket: FetchTicket,
        epoch: u64,
        result: Result<Vec<NodeRecord>>,
    },
    Finished {
        key: OpKey,
        /// Container whose listing changes on success
        refresh: Option<String>,
        epoch: u64,
        result: Result<Outcome>,
    },
    UserLoaded {
        epoch: u64,
        result: Result<UserInfo>,
        reply: UserReply,
    },
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// User asked to log out.
    Logout,
    /// A new login started while logged in.
    Replaced,
    /// The server refused the token.
    Rejected,
    /// The token could not be checked; it is kept for a later restore.
    Unverified,
}

struct ExplorerActor {
    config: Config,
    api: Arc<dyn RemoteApi>,
    tree: RemoteTree,
    auth: AuthManager,
    user: Option<UserInfo>,
    /// Bumped whenever the session changes; completions from older sessions
    /// cannot log out a newer one.
    epoch: u64,
    pending: PendingTable,
    events: EventBus,
    rx: mpsc::Receiver<ExplorerCommand>,
    done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
}

impl ExplorerHandle {
    /// Start an explorer talking to the OSF servers named in `config`.
    pub fn connect(config: Config) -> Result<Self> {
        let api = Arc::new(OsfClient::new(&config)?);
        Self::spawn(config, api)
    }

    /// Start an explorer on top of any [`RemoteApi`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: Config, api: Arc<dyn RemoteApi>) -> Result<Self> {
        let root = NodeRecord::root(config.projects_url()?);
        let (tx, rx) = mpsc::channel(64);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let events = EventBus::new(config.event_capacity);

        let actor = ExplorerActor {
            auth: AuthManager::new(&config),
            config,
            api,
            tree: RemoteTree::new(root),
            user: None,
            epoch: 0,
            pending: PendingTable::default(),
            events: events.clone(),
            rx,
            done_tx,
            done_rx,
        };
        tokio::spawn(actor.run());
        Ok(Self { tx, events })
    }

    /// Receive every [`TreeEvent`] published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<R>>) -> ExplorerCommand,
    ) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| OsfError::Custom("Explorer actor stopped".to_string()))?;
        rx.await
            .map_err(|_| OsfError::Custom("Explorer actor stopped".to_string()))?
    }

    /// Populate a container and return its children. No-op if already populated.
    pub async fn expand(&self, id: &str) -> Result<Vec<NodeRecord>> {
        self.request(|reply| ExplorerCommand::Expand {
            id: id.to_string(),
            reply,
        })
        .await
    }

    /// Forget the children of a node; a later expand fetches them again.
    pub async fn collapse(&self, id: &str) -> Result<()> {
        self.request(|reply| ExplorerCommand::Collapse {
            id: id.to_string(),
            reply,
        })
        .await
    }

    /// Fetch the children again and reconcile them into the tree.
    pub async fn refresh(&self, id: &str) -> Result<Vec<NodeRecord>> {
        self.request(|reply| ExplorerCommand::Refresh {
            id: id.to_string(),
            reply,
        })
        .await
    }

    pub async fn create_folder(&self, parent: &str, name: &str) -> Result<NodeRecord> {
        self.request(|reply| ExplorerCommand::CreateFolder {
            parent: parent.to_string(),
            name: name.to_string(),
            reply,
        })
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.request(|reply| ExplorerCommand::Delete {
            id: id.to_string(),
            reply,
        })
        .await
    }

    /// Upload a local file into a folder, or as a new version of a file.
    pub async fn upload<P: AsRef<std::path::Path>>(
        &self,
        target: &str,
        local: P,
    ) -> Result<NodeRecord> {
        self.request(|reply| ExplorerCommand::Upload {
            target: target.to_string(),
            local: local.as_ref().to_path_buf(),
            reply,
        })
        .await
    }

    pub async fn download<P: AsRef<std::path::Path>>(&self, id: &str, local: P) -> Result<()> {
        self.request(|reply| ExplorerCommand::Download {
            id: id.to_string(),
            local: local.as_ref().to_path_buf(),
            reply,
        })
        .await
    }

    /// Start a login and return the authorization URL to open in a browser.
    pub async fn begin_login(&self) -> Result<Url> {
        self.request(|reply| ExplorerCommand::BeginLogin { reply })
            .await
    }

    /// Finish a login with the URL the browser was redirected to.
    pub async fn complete_login(&self, redirect_url: &str) -> Result<UserInfo> {
        self.request(|reply| ExplorerCommand::CompleteLogin {
            redirect_url: redirect_url.to_string(),
            reply,
        })
        .await
    }

    pub async fn cancel_login(&self) -> Result<()> {
        self.request(|reply| ExplorerCommand::CancelLogin { reply })
            .await
    }

    pub async fn logout(&self) -> Result<()> {
        self.request(|reply| ExplorerCommand::Logout { reply }).await
    }

    /// Log in with the stored token file, if one exists and is still valid.
    pub async fn restore_session(&self) -> Result<Option<UserInfo>> {
        self.request(|reply| ExplorerCommand::RestoreSession { reply })
            .await
    }

    /// Children currently held for a node (empty when unpopulated).
    pub async fn children(&self, id: &str) -> Result<Vec<NodeRecord>> {
        self.request(|reply| ExplorerCommand::Children {
            id: id.to_string(),
            reply,
        })
        .await
    }

    pub async fn node(&self, id: &str) -> Result<Option<NodeRecord>> {
        self.request(|reply| ExplorerCommand::Node {
            id: id.to_string(),
            reply,
        })
        .await
    }

    pub async fn auth_status(&self) -> Result<AuthStatus> {
        self.request(|reply| ExplorerCommand::AuthStatus { reply })
            .await
    }

    pub async fn user(&self) -> Result<Option<UserInfo>> {
        self.request(|reply| ExplorerCommand::User { reply }).await
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(ExplorerCommand::Shutdown { reply: tx }).await;
        let _ = rx.await;
    }
}

impl ExplorerActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if self.handle_command(cmd) {
                        break;
                    }
                }
                Some(done) = self.done_rx.recv() => {
                    self.handle_completion(done);
                }
            }
        }
        tracing::debug!(pending = self.pending.len(), "explorer actor stopped");
    }

    fn handle_command(&mut self, cmd: ExplorerCommand) -> bool {
        match cmd {
            ExplorerCommand::Expand { id, reply } => match self.tree.get(&id) {
                None => {
                    let _ = reply.send(Err(OsfError::NodeNotFound(id)));
                }
                Some(node) if node.is_populated() => {
                    let _ = reply.send(self.tree.child_records(&id));
                }
                Some(_) => {
                    self.start_listing(&id, vec![reply_waiter(reply, Outcome::children)], false)
                }
            },
            ExplorerCommand::Collapse { id, reply } => {
                let res = self.collapse(&id);
                let _ = reply.send(res);
            }
            ExplorerCommand::Refresh { id, reply } => {
                self.start_listing(&id, vec![reply_waiter(reply, Outcome::children)], true);
            }
            ExplorerCommand::CreateFolder {
                parent,
                name,
                reply,
            } => {
                let record = match self.record(&parent) {
                    Ok(record) => record,
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return false;
                    }
                };
                let key = OpKey::new(OperationKind::Create, &parent, name.clone());
                self.start_call(
                    key,
                    Some(parent),
                    reply_waiter(reply, Outcome::record),
                    move |api, session| async move {
                        api.create_folder(&session, &record, &name)
                            .await
                            .map(Outcome::Record)
                    },
                );
            }
            ExplorerCommand::Delete { id, reply } => {
                let (record, parent) = match self.tree.get(&id) {
                    Some(node) if node.id() != ROOT_ID => (node.record.clone(), node.parent.clone()),
                    Some(_) => {
                        let _ = reply.send(Err(OsfError::Unsupported(
                            "the root cannot be deleted".to_string(),
                        )));
                        return false;
                    }
                    None => {
                        let _ = reply.send(Err(OsfError::NodeNotFound(id)));
                        return false;
                    }
                };
                let key = OpKey::new(OperationKind::Delete, &id, "");
                self.start_call(
                    key,
                    parent,
                    reply_waiter(reply, |_| Ok(())),
                    move |api, session| async move {
                        api.delete(&session, &record).await.map(|()| Outcome::Done)
                    },
                );
            }
            ExplorerCommand::Upload {
                target,
                local,
                reply,
            } => {
                let (record, refresh) = match self.tree.get(&target) {
                    // A new version lands next to the old one.
                    Some(node) if node.record.is_file() => {
                        (node.record.clone(), node.parent.clone())
                    }
                    Some(node) => (node.record.clone(), Some(target.clone())),
                    None => {
                        let _ = reply.send(Err(OsfError::NodeNotFound(target)));
                        return false;
                    }
                };
                let key = OpKey::new(OperationKind::Upload, &target, local.display().to_string());
                let progress = self.progress_reporter();
                self.start_call(
                    key,
                    refresh,
                    reply_waiter(reply, Outcome::record),
                    move |api, session| async move {
                        api.upload(&session, &record, &local, Some(progress))
                            .await
                            .map(Outcome::Record)
                    },
                );
            }
            ExplorerCommand::Download { id, local, reply } => {
                let record = match self.record(&id) {
                    Ok(record) if record.is_file() => record,
                    Ok(record) => {
                        let _ = reply.send(Err(OsfError::Unsupported(format!(
                            "{} is not a file",
                            record.name
                        ))));
                        return false;
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return false;
                    }
                };
                let key = OpKey::new(OperationKind::Download, &id, local.display().to_string());
                let progress = self.progress_reporter();
                self.start_call(
                    key,
                    None,
                    reply_waiter(reply, |_| Ok(())),
                    move |api, session| async move {
                        api.download(&session, &record, &local, Some(progress))
                            .await
                            .map(|()| Outcome::Done)
                    },
                );
            }
            ExplorerCommand::BeginLogin { reply } => {
                let previous = match self.auth.status() {
                    AuthStatus::LoggedIn => Some(self.auth.session()),
                    _ => None,
                };
                let res = self.auth.begin_login();
                if res.is_ok() && previous.is_some() {
                    self.end_session(previous, SessionEnd::Replaced);
                }
                let _ = reply.send(res);
            }
            ExplorerCommand::CompleteLogin {
                redirect_url,
                reply,
            } => match self.auth.complete_login(&redirect_url) {
                Ok(session) => {
                    self.epoch += 1;
                    self.store_token(&session);
                    self.load_user(
                        session,
                        Box::new(move |res| {
                            let _ = reply.send(res);
                        }),
                    );
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            ExplorerCommand::CancelLogin { reply } => {
                self.auth.cancel_login();
                let _ = reply.send(Ok(()));
            }
            ExplorerCommand::Logout { reply } => {
                self.auth.cancel_login();
                if let Some(session) = self.auth.logout() {
                    self.end_session(Some(session), SessionEnd::Logout);
                }
                let _ = reply.send(Ok(()));
            }
            ExplorerCommand::RestoreSession { reply } => self.restore_session(reply),
            ExplorerCommand::Children { id, reply } => {
                let _ = reply.send(self.tree.child_records(&id));
            }
            ExplorerCommand::Node { id, reply } => {
                let _ = reply.send(Ok(self.tree.get(&id).map(|n| n.record.clone())));
            }
            ExplorerCommand::AuthStatus { reply } => {
                let _ = reply.send(Ok(self.auth.status()));
            }
            ExplorerCommand::User { reply } => {
                let _ = reply.send(Ok(self.user.clone()));
            }
            ExplorerCommand::Shutdown { reply } => {
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Listed {
                key,
                ticket,
                epoch,
                result,
            } => self.on_listed(key, ticket, epoch, result),
            Completion::Finished {
                key,
                refresh,
                epoch,
                result,
            } => self.on_finished(key, refresh, epoch, result),
            Completion::UserLoaded {
                epoch,
                result,
                reply,
            } => self.on_user_loaded(epoch, result, reply),
        }
    }

    fn record(&self, id: &str) -> Result<NodeRecord> {
        self.tree
            .get(id)
            .map(|n| n.record.clone())
            .ok_or_else(|| OsfError::NodeNotFound(id.to_string()))
    }

    fn spawn_call(&self, call: impl Future<Output = Completion> + Send + 'static) {
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let _ = done.send(call.await);
        });
    }

    fn progress_reporter(&self) -> ProgressCallback {
        let events = self.events.clone();
        Box::new(move |progress| {
            events.publish(TreeEvent::Progress(progress.clone()));
            true
        })
    }

    /// List `id`, joining an identical listing already in flight.
    ///
    /// With `fresh`, a listing already in flight is repeated once it lands,
    /// so the result reflects changes made after it started.
    fn start_listing(&mut self, id: &str, waiters: Vec<Waiter>, fresh: bool) {
        let (ticket, record) = match self.tree.ticket(id).and_then(|t| Ok((t, self.record(id)?))) {
            Ok(found) => found,
            Err(e) => {
                let err = Err(e);
                for waiter in waiters {
                    waiter(&err);
                }
                return;
            }
        };
        let key = OpKey::new(OperationKind::List, id, ticket.generation.to_string());

        if fresh && self.pending.contains(&key) {
            self.pending.request_rerun(&key, waiters);
            return;
        }
        if !self.pending.register(key.clone(), waiters) {
            return;
        }

        let api = self.api.clone();
        let session = self.auth.session();
        let epoch = self.epoch;
        tracing::debug!(node = id, "listing children");
        self.spawn_call(async move {
            let result = api.list_children(&session, &record).await;
            Completion::Listed {
                key,
                ticket,
                epoch,
                result,
            }
        });
    }

    /// Run a create/upload/download/delete call as a pending operation.
    fn start_call<F, Fut>(&mut self, key: OpKey, refresh: Option<String>, waiter: Waiter, call: F)
    where
        F: FnOnce(Arc<dyn RemoteApi>, Session) -> Fut,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        if !self.pending.register(key.clone(), vec![waiter]) {
            return;
        }
        tracing::debug!(kind = %key.kind, node = %key.target, "starting operation");
        let call = call(self.api.clone(), self.auth.session());
        let epoch = self.epoch;
        self.spawn_call(async move {
            Completion::Finished {
                key,
                refresh,
                epoch,
                result: call.await,
            }
        });
    }

    fn on_listed(
        &mut self,
        key: OpKey,
        ticket: FetchTicket,
        epoch: u64,
        result: Result<Vec<NodeRecord>>,
    ) {
        let Some(op) = self.pending.finish(&key) else {
            return;
        };
        let parent = ticket.node_id.as_str();

        match result {
            Ok(listing) => {
                let outcome = match self.tree.apply_listing(&ticket, listing) {
                    Some(applied) => {
                        for moved in applied.detached {
                            self.events.publish(TreeEvent::Removed {
                                parent: moved.parent,
                                id: moved.id,
                            });
                        }
                        for edit in applied.edits {
                            self.events.publish(TreeEvent::from_edit(parent, edit));
                        }
                        self.tree.child_records(parent)
                    }
                    None if !self.tree.is_live(&ticket) => {
                        Err(OsfError::NodeNotFound(parent.to_string()))
                    }
                    None => self.tree.child_records(parent),
                }
                .map(Outcome::Children);
                if op.rerun && outcome.is_ok() {
                    self.start_listing(parent, op.into_waiters(), false);
                } else {
                    op.resolve(&outcome);
                }
            }
            Err(e) => {
                self.report_failure(OperationKind::List, parent, epoch, &e);
                op.resolve(&Err(e));
            }
        }
    }

    fn on_finished(
        &mut self,
        key: OpKey,
        refresh: Option<String>,
        epoch: u64,
        result: Result<Outcome>,
    ) {
        let Some(op) = self.pending.finish(&key) else {
            return;
        };

        match result {
            Ok(outcome) => {
                tracing::info!(kind = %key.kind, node = %key.target, "operation finished");
                // Only containers that are shown need their listing redone.
                let refresh = refresh.filter(|p| self.tree.get(p).is_some_and(Node::is_populated));
                match refresh {
                    Some(parent) => {
                        let resolve: Waiter = Box::new(move |_| op.resolve(&Ok(outcome)));
                        self.start_listing(&parent, vec![resolve], true);
                    }
                    None => op.resolve(&Ok(outcome)),
                }
            }
            Err(e) => {
                self.report_failure(key.kind, &key.target, epoch, &e);
                op.resolve(&Err(e));
            }
        }
    }

    fn on_user_loaded(&mut self, epoch: u64, result: Result<UserInfo>, reply: UserReply) {
        if epoch != self.epoch || self.auth.status() != AuthStatus::LoggedIn {
            reply(Err(OsfError::InvalidState(
                "session changed before the user was loaded".to_string(),
            )));
            return;
        }

        match result {
            Ok(user) => {
                tracing::info!(user = %user.full_name, "logged in");
                if let Some(nodes_url) = &user.nodes_url {
                    self.tree.set_root_record(NodeRecord::root(nodes_url.clone()));
                }
                self.user = Some(user.clone());
                self.events.publish(TreeEvent::LoggedIn { user: user.clone() });
                self.start_listing(ROOT_ID, Vec::new(), false);
                reply(Ok(user));
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load the logged-in user");
                let reason = if e.is_auth_failure() {
                    SessionEnd::Rejected
                } else {
                    SessionEnd::Unverified
                };
                let session = self.auth.logout();
                self.end_session(session, reason);
                reply(Err(e));
            }
        }
    }

    fn report_failure(&mut self, kind: OperationKind, target: &str, epoch: u64, error: &OsfError) {
        tracing::warn!(%kind, node = target, error = %error, "operation failed");
        self.events.publish(TreeEvent::OperationFailed {
            kind,
            target: target.to_string(),
            message: error.to_string(),
        });

        if error.is_auth_failure()
            && epoch == self.epoch
            && self.auth.status() == AuthStatus::LoggedIn
        {
            let session = self.auth.invalidate();
            self.end_session(session, SessionEnd::Rejected);
        }
    }

    fn collapse(&mut self, id: &str) -> Result<()> {
        for child in self.tree.collapse(id)? {
            self.events.publish(TreeEvent::Removed {
                parent: id.to_string(),
                id: child,
            });
        }
        Ok(())
    }

    fn store_token(&self, session: &Session) {
        let (Some(path), Some(token)) = (&self.config.token_file, session.token()) else {
            return;
        };
        if let Err(e) = token.save(path) {
            tracing::warn!(path = %path.display(), error = %e, "could not store token");
        }
    }

    fn load_user(&mut self, session: Session, reply: UserReply) {
        let api = self.api.clone();
        let epoch = self.epoch;
        self.spawn_call(async move {
            let result = api.logged_in_user(&session).await;
            Completion::UserLoaded {
                epoch,
                result,
                reply,
            }
        });
    }

    fn restore_session(&mut self, reply: oneshot::Sender<Result<Option<UserInfo>>>) {
        if self.auth.status() == AuthStatus::LoggedIn {
            let _ = reply.send(Ok(self.user.clone()));
            return;
        }
        let Some(path) = self.config.token_file.clone() else {
            let _ = reply.send(Ok(None));
            return;
        };

        let token = match Token::load(&path) {
            Ok(Some(token)) => token,
            Ok(None) => {
                let _ = reply.send(Ok(None));
                return;
            }
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        self.auth.cancel_login();
        match self.auth.restore(token) {
            Ok(session) => {
                self.epoch += 1;
                tracing::debug!(path = %path.display(), "restoring stored session");
                self.load_user(
                    session,
                    Box::new(move |res| {
                        let _ = reply.send(res.map(Some));
                    }),
                );
            }
            Err(_) => {
                tracing::info!(path = %path.display(), "stored token expired");
                if let Err(e) = Token::remove_file(&path) {
                    tracing::warn!(error = %e, "could not remove token file");
                }
                let _ = reply.send(Ok(None));
            }
        }
    }

    /// Tear down everything tied to a session that has just been dropped.
    fn end_session(&mut self, session: Option<Session>, reason: SessionEnd) {
        self.epoch += 1;
        self.user = None;

        if reason != SessionEnd::Unverified {
            if let Some(path) = &self.config.token_file {
                if let Err(e) = Token::remove_file(path) {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove token file");
                }
            }
        }

        if let Some(session) = session.filter(|_| {
            matches!(reason, SessionEnd::Logout | SessionEnd::Replaced)
        }) {
            let api = self.api.clone();
            tokio::spawn(async move {
                if let Err(e) = api.revoke(&session).await {
                    tracing::warn!(error = %e, "token revocation failed");
                }
            });
        }

        if let Err(e) = self.collapse(ROOT_ID) {
            tracing::warn!(error = %e, "could not clear the tree");
        }
        tracing::info!(?reason, "logged out");
        self.events.publish(TreeEvent::LoggedOut);
    }
}
