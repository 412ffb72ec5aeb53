use futures::future::join_all;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::mailbox::{self, AskError, MAILBOX_CAPACITY};
use super::session_actor::{SessionActor, SessionHandle};
use crate::launch::{Archive, LaunchError, LaunchPipeline, LaunchRequest, SessionSpec};
use crate::shared::models::{CommandParams, SessionSummary, TaskId, User};

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("session manager is not running")]
    Stopped,

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl From<AskError> for ManagerError {
    fn from(_: AskError) -> Self {
        ManagerError::Stopped
    }
}

/// Transport-neutral form of an inbound API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiMethod {
    Read,
    Create,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: ApiMethod,
    pub user: User,
    pub user_filter: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug)]
pub enum ApiReply {
    Sessions(Vec<SessionSummary>),
    Launched(SessionSummary),
    Rejected(LaunchError),
    MethodNotAllowed,
}

#[derive(Debug)]
pub enum ManagerMessage {
    ListSessions {
        user_filter: Option<String>,
        reply: oneshot::Sender<Vec<SessionSummary>>,
    },
    LaunchSession {
        request: LaunchRequest,
        reply: oneshot::Sender<Result<SessionSummary, LaunchError>>,
    },
    Api {
        call: ApiCall,
        reply: oneshot::Sender<ApiReply>,
    },
    ContainerLog {
        task_id: TaskId,
        line: String,
    },
    TakeArchive {
        task_id: TaskId,
        reply: oneshot::Sender<Option<Archive>>,
    },
    KillSession {
        task_id: TaskId,
        reply: oneshot::Sender<Option<SessionSummary>>,
    },
}

#[derive(Debug, Clone)]
pub struct SessionManagerHandle {
    mailbox: mpsc::Sender<ManagerMessage>,
}

impl SessionManagerHandle {
    pub async fn list_sessions(
        &self,
        user_filter: Option<String>,
    ) -> Result<Vec<SessionSummary>, ManagerError> {
        Ok(mailbox::call(&self.mailbox, |reply| ManagerMessage::ListSessions {
            user_filter,
            reply,
        })
        .await?)
    }

    /// Launch a session and return its id.
    pub async fn launch_session(&self, request: LaunchRequest) -> Result<TaskId, ManagerError> {
        Ok(self.launch_session_summary(request).await?.id)
    }

    pub async fn launch_session_summary(
        &self,
        request: LaunchRequest,
    ) -> Result<SessionSummary, ManagerError> {
        let result = mailbox::call(&self.mailbox, |reply| ManagerMessage::LaunchSession {
            request,
            reply,
        })
        .await?;
        Ok(result?)
    }

    pub async fn handle_api(&self, call: ApiCall) -> Result<ApiReply, ManagerError> {
        Ok(mailbox::call(&self.mailbox, |reply| ManagerMessage::Api { call, reply }).await?)
    }

    pub async fn report_log(&self, task_id: TaskId, line: String) -> Result<(), ManagerError> {
        self.mailbox
            .send(ManagerMessage::ContainerLog { task_id, line })
            .await
            .map_err(|_| ManagerError::Stopped)
    }

    pub async fn take_bootstrap_archive(
        &self,
        task_id: TaskId,
    ) -> Result<Option<Archive>, ManagerError> {
        Ok(
            mailbox::call(&self.mailbox, |reply| ManagerMessage::TakeArchive { task_id, reply })
                .await?,
        )
    }

    pub async fn kill_session(
        &self,
        task_id: TaskId,
    ) -> Result<Option<SessionSummary>, ManagerError> {
        Ok(
            mailbox::call(&self.mailbox, |reply| ManagerMessage::KillSession { task_id, reply })
                .await?,
        )
    }
}

/// Owns the shell sessions of one cluster. Messages are handled one at a
/// time, so launches and listings never interleave.
pub struct SessionManager {
    pipeline: LaunchPipeline,
    ask_timeout: Duration,
    spawn_child: fn(SessionSpec) -> SessionHandle,
    children: Vec<SessionHandle>,
    mailbox: mpsc::Receiver<ManagerMessage>,
}

impl SessionManager {
    pub fn spawn(pipeline: LaunchPipeline, ask_timeout: Duration) -> SessionManagerHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let manager = Self {
            pipeline,
            ask_timeout,
            spawn_child: SessionActor::spawn,
            children: Vec::new(),
            mailbox: rx,
        };
        tokio::spawn(manager.run());
        SessionManagerHandle { mailbox: tx }
    }

    async fn run(mut self) {
        info!("Session manager started");

        while let Some(message) = self.mailbox.recv().await {
            self.receive(message).await;
        }

        info!("Session manager stopped");
    }

    async fn receive(&mut self, message: ManagerMessage) {
        match message {
            ManagerMessage::ListSessions { user_filter, reply } => {
                let sessions = self.list_sessions(user_filter).await;
                let _ = reply.send(sessions);
            }
            ManagerMessage::LaunchSession { request, reply } => {
                let result = self.launch_session(request).await;
                let _ = reply.send(result);
            }
            ManagerMessage::Api { call, reply } => {
                let response = self.handle_api(call).await;
                let _ = reply.send(response);
            }
            ManagerMessage::ContainerLog { task_id, line } => {
                self.forward_log(task_id, line).await;
            }
            ManagerMessage::TakeArchive { task_id, reply } => {
                let archive = self.take_archive(task_id).await;
                let _ = reply.send(archive);
            }
            ManagerMessage::KillSession { task_id, reply } => {
                let summary = self.kill_session(task_id).await;
                let _ = reply.send(summary);
            }
        }
    }

    async fn list_sessions(&mut self, user_filter: Option<String>) -> Vec<SessionSummary> {
        let user_filter = user_filter.filter(|user| !user.is_empty());
        let asks = self
            .children
            .iter()
            .map(|child| child.summary(user_filter.clone(), self.ask_timeout));
        let results = join_all(asks).await;

        let mut sessions = Vec::new();
        let mut stopped = HashSet::new();
        for (child, result) in self.children.iter().zip(results) {
            match result {
                Ok(Some(summary)) => sessions.push(summary),
                Ok(None) => {}
                Err(AskError::Closed) => {
                    warn!(task_id = %child.task_id(), "Session stopped unexpectedly, dropping it");
                    stopped.insert(child.task_id());
                }
                Err(e) => warn!(task_id = %child.task_id(), "Session did not report: {}", e),
            }
        }
        let pipeline = &self.pipeline;
        self.children.retain(|child| {
            if stopped.contains(&child.task_id()) {
                pipeline.release_ports(child.ports());
                return false;
            }
            true
        });

        sessions
    }

    async fn launch_session(
        &mut self,
        request: LaunchRequest,
    ) -> Result<SessionSummary, LaunchError> {
        let owner = request.user.username.clone();
        let spec = self.pipeline.launch(request).map_err(|e| {
            match &e {
                LaunchError::Validation(reason) => {
                    info!(owner = %owner, "Rejected shell request: {}", reason)
                }
                _ => error!(owner = %owner, "Failed to launch shell: {}", e),
            }
            e
        })?;

        let task_id = spec.task_id;
        let child = (self.spawn_child)(spec);

        let summary = match child.summary(None, self.ask_timeout).await {
            Ok(Some(summary)) => summary,
            outcome => {
                let reason = match outcome {
                    Err(e) => e.to_string(),
                    _ => "session returned no summary".to_string(),
                };
                return Err(self.discard(&child, reason));
            }
        };

        self.children.push(child);
        info!(%task_id, owner = %summary.owner, "Created shell {}", summary.description);
        Ok(summary)
    }

    /// Forced teardown of a child that never got registered.
    fn discard(&self, child: &SessionHandle, reason: String) -> LaunchError {
        error!(task_id = %child.task_id(), "Tearing down shell that failed to report: {}", reason);
        child.abort();
        self.pipeline.release_ports(child.ports());
        LaunchError::Spawn(reason)
    }

    async fn handle_api(&mut self, call: ApiCall) -> ApiReply {
        match call.method {
            ApiMethod::Read => ApiReply::Sessions(self.list_sessions(call.user_filter).await),
            ApiMethod::Create => {
                let params = if call.body.iter().all(u8::is_ascii_whitespace) {
                    CommandParams::default()
                } else {
                    match serde_json::from_slice::<CommandParams>(&call.body) {
                        Ok(params) => params,
                        Err(e) => {
                            return ApiReply::Rejected(LaunchError::Validation(format!(
                                "invalid request body: {e}"
                            )))
                        }
                    }
                };
                let request = LaunchRequest {
                    params,
                    user: call.user,
                };
                match self.launch_session(request).await {
                    Ok(summary) => ApiReply::Launched(summary),
                    Err(e) => ApiReply::Rejected(e),
                }
            }
            ApiMethod::Other(method) => {
                debug!("Method {} not allowed on shells", method);
                ApiReply::MethodNotAllowed
            }
        }
    }

    fn child(&self, task_id: TaskId) -> Option<&SessionHandle> {
        self.children.iter().find(|child| child.task_id() == task_id)
    }

    /// Unregister a child and give its ports back.
    fn remove_child(&mut self, task_id: TaskId) -> Option<SessionHandle> {
        let index = self
            .children
            .iter()
            .position(|child| child.task_id() == task_id)?;
        let child = self.children.remove(index);
        self.pipeline.release_ports(child.ports());
        Some(child)
    }

    async fn forward_log(&mut self, task_id: TaskId, line: String) {
        let Some(child) = self.child(task_id) else {
            warn!(%task_id, "Dropping log line for unknown session");
            return;
        };
        if child.report_log(line).await.is_err() {
            warn!(%task_id, "Session stopped unexpectedly, dropping it");
            self.remove_child(task_id);
        }
    }

    async fn take_archive(&self, task_id: TaskId) -> Option<Archive> {
        let child = self.child(task_id)?;
        match child.take_archive(self.ask_timeout).await {
            Ok(archive) => archive,
            Err(e) => {
                error!(%task_id, "Failed to fetch bootstrap archive: {}", e);
                None
            }
        }
    }

    async fn kill_session(&mut self, task_id: TaskId) -> Option<SessionSummary> {
        let child = self.remove_child(task_id)?;

        match child.terminate(self.ask_timeout).await {
            Ok(summary) => {
                info!(%task_id, "Killed shell");
                Some(summary)
            }
            Err(e) => {
                warn!(%task_id, "Session did not acknowledge termination: {}", e);
                child.abort();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::{Assets, ReservingPortAllocator, ShellCategory, SshKeyProvisioner};
    use crate::shared::config::{Config, TaskContainerDefaults};
    use crate::shared::models::{AgentUserGroup, SessionState};
    use serde_json::json;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn manager() -> SessionManagerHandle {
        let pipeline = LaunchPipeline::shell(&Config::default(), Assets::load().unwrap());
        SessionManager::spawn(pipeline, TIMEOUT)
    }

    fn request(user: &str, params: serde_json::Value) -> LaunchRequest {
        LaunchRequest {
            params: serde_json::from_value(params).unwrap(),
            user: User::new(user),
        }
    }

    #[tokio::test]
    async fn launched_session_is_listed() {
        let manager = manager();
        let summary = manager
            .launch_session_summary(request("alice", json!({})))
            .await
            .unwrap();

        assert!(summary.description.starts_with("Shell ("));
        assert_eq!(summary.state, SessionState::Pending);
        let port = summary.ports["shell"];
        assert!((3200..=3499).contains(&port));

        let sessions = manager.list_sessions(None).await.unwrap();
        assert_eq!(sessions, vec![summary]);
    }

    #[tokio::test]
    async fn launch_returns_task_id() {
        let manager = manager();
        let id = manager
            .launch_session(request("alice", json!({ "data": { "passphrase": "p@ss" } })))
            .await
            .unwrap();
        let sessions = manager.list_sessions(None).await.unwrap();
        assert_eq!(sessions[0].id, id);
    }

    #[tokio::test]
    async fn invalid_request_spawns_nothing() {
        let manager = manager();
        manager
            .launch_session(request("alice", json!({})))
            .await
            .unwrap();

        let err = manager
            .launch_session(request("alice", json!({ "config": { "resources": { "slots": -1 } } })))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::Launch(LaunchError::Validation(_))));
        assert_eq!(manager.list_sessions(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_launches_get_unique_ids() {
        let manager = manager();
        let (a, b) = tokio::join!(
            manager.launch_session(request("alice", json!({}))),
            manager.launch_session(request("bob", json!({}))),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a, b);

        let ids: HashSet<TaskId> = manager
            .list_sessions(None)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, HashSet::from([a, b]));
    }

    #[tokio::test]
    async fn list_filters_by_owner() {
        let manager = manager();
        manager.launch_session(request("alice", json!({}))).await.unwrap();
        manager.launch_session(request("bob", json!({}))).await.unwrap();
        manager.launch_session(request("alice", json!({}))).await.unwrap();

        let alice = manager.list_sessions(Some("alice".to_string())).await.unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|s| s.owner == "alice"));

        assert_eq!(manager.list_sessions(Some(String::new())).await.unwrap().len(), 3);
        assert!(manager
            .list_sessions(Some("carol".to_string()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn container_log_drives_readiness() {
        let manager = manager();
        let id = manager.launch_session(request("alice", json!({}))).await.unwrap();

        manager
            .report_log(id, "Server listening on 0.0.0.0:3201".to_string())
            .await
            .unwrap();
        manager
            .report_log(TaskId::new(), "Server listening on 0.0.0.0:3202".to_string())
            .await
            .unwrap();

        let sessions = manager.list_sessions(None).await.unwrap();
        assert_eq!(sessions[0].state, SessionState::Running);
        assert!(sessions[0].ready);
    }

    #[tokio::test]
    async fn bootstrap_archive_is_taken_once() {
        let manager = manager();
        let id = manager.launch_session(request("alice", json!({}))).await.unwrap();

        let archive = manager.take_bootstrap_archive(id).await.unwrap().unwrap();
        assert_eq!(archive.len(), 6);
        assert!(manager.take_bootstrap_archive(id).await.unwrap().is_none());
        assert!(manager
            .take_bootstrap_archive(TaskId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn killed_session_disappears() {
        let manager = manager();
        let id = manager.launch_session(request("alice", json!({}))).await.unwrap();

        let summary = manager.kill_session(id).await.unwrap().unwrap();
        assert_eq!(summary.state, SessionState::Terminated);
        assert!(manager.list_sessions(None).await.unwrap().is_empty());
        assert!(manager.kill_session(id).await.unwrap().is_none());
    }

    /// Manager driven in place, sharing one reserving allocator across sessions.
    fn reserving_manager(
        ports: Arc<ReservingPortAllocator>,
        spawn_child: fn(SessionSpec) -> SessionHandle,
    ) -> SessionManager {
        let pipeline = LaunchPipeline::new(
            Arc::new(ShellCategory::new(Assets::load().unwrap())),
            Arc::new(SshKeyProvisioner),
            ports,
            TaskContainerDefaults::default(),
            AgentUserGroup::default(),
        );
        let (_, rx) = mpsc::channel(1);
        SessionManager {
            pipeline,
            ask_timeout: TIMEOUT,
            spawn_child,
            children: Vec::new(),
            mailbox: rx,
        }
    }

    /// Child whose task is cancelled before it ever reads its mailbox.
    fn silent_child(spec: SessionSpec) -> SessionHandle {
        let child = SessionActor::spawn(spec);
        child.abort();
        child
    }

    #[tokio::test]
    async fn silent_child_is_torn_down_as_spawn_error() {
        let ports = Arc::new(ReservingPortAllocator::new());
        let mut manager = reserving_manager(ports.clone(), silent_child);

        let err = manager
            .launch_session(request("alice", json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::Spawn(_)), "{err}");
        assert!(manager.children.is_empty());
        assert_eq!(ports.reserved_count(), 0);
        assert!(manager.list_sessions(None).await.is_empty());
    }

    #[tokio::test]
    async fn pruned_session_releases_ports() {
        let ports = Arc::new(ReservingPortAllocator::new());
        let mut manager = reserving_manager(ports.clone(), SessionActor::spawn);
        manager
            .launch_session(request("alice", json!({})))
            .await
            .unwrap();
        manager
            .launch_session(request("bob", json!({})))
            .await
            .unwrap();
        assert_eq!(ports.reserved_count(), 2);

        manager.children[0].abort();
        let sessions = manager.list_sessions(None).await;

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].owner, "bob");
        assert_eq!(manager.children.len(), 1);
        assert_eq!(ports.reserved_count(), 1);
    }

    #[tokio::test]
    async fn stopped_session_found_on_log_delivery_releases_ports() {
        let ports = Arc::new(ReservingPortAllocator::new());
        let mut manager = reserving_manager(ports.clone(), SessionActor::spawn);
        let summary = manager
            .launch_session(request("alice", json!({})))
            .await
            .unwrap();

        manager.children[0].terminate(TIMEOUT).await.unwrap();
        manager
            .forward_log(summary.id, "Server listening on 0.0.0.0:3201".to_string())
            .await;

        assert!(manager.children.is_empty());
        assert_eq!(ports.reserved_count(), 0);
    }

    #[tokio::test]
    async fn kill_releases_ports() {
        let ports = Arc::new(ReservingPortAllocator::new());
        let mut manager = reserving_manager(ports.clone(), SessionActor::spawn);
        let summary = manager
            .launch_session(request("alice", json!({})))
            .await
            .unwrap();

        let killed = manager.kill_session(summary.id).await.unwrap();
        assert_eq!(killed.state, SessionState::Terminated);
        assert_eq!(ports.reserved_count(), 0);
    }

    #[tokio::test]
    async fn api_read_and_create() {
        let manager = manager();
        let reply = manager
            .handle_api(ApiCall {
                method: ApiMethod::Create,
                user: User::new("alice"),
                user_filter: None,
                body: br#"{"config": {"description": "debug box"}}"#.to_vec(),
            })
            .await
            .unwrap();
        let ApiReply::Launched(summary) = reply else {
            panic!("unexpected reply {reply:?}");
        };
        assert_eq!(summary.description, "debug box");

        let reply = manager
            .handle_api(ApiCall {
                method: ApiMethod::Read,
                user: User::new("bob"),
                user_filter: Some("alice".to_string()),
                body: Vec::new(),
            })
            .await
            .unwrap();
        assert!(matches!(reply, ApiReply::Sessions(ref s) if s.len() == 1));
    }

    #[tokio::test]
    async fn api_rejects_bad_body_and_method() {
        let manager = manager();
        let reply = manager
            .handle_api(ApiCall {
                method: ApiMethod::Create,
                user: User::new("alice"),
                user_filter: None,
                body: b"{not json".to_vec(),
            })
            .await
            .unwrap();
        assert!(matches!(reply, ApiReply::Rejected(LaunchError::Validation(_))));

        let reply = manager
            .handle_api(ApiCall {
                method: ApiMethod::Other("DELETE".to_string()),
                user: User::new("alice"),
                user_filter: None,
                body: Vec::new(),
            })
            .await
            .unwrap();
        assert!(matches!(reply, ApiReply::MethodNotAllowed));
        assert!(manager.list_sessions(None).await.unwrap().is_empty());
    }
}
