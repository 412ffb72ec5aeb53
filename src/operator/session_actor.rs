use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::mailbox::{self, AskError, MAILBOX_CAPACITY};
use crate::launch::{Archive, SessionSpec};
use crate::shared::models::{SessionState, SessionSummary, TaskId};

#[derive(Debug)]
pub enum SessionMessage {
    /// Answered with `None` when the session's owner does not match the filter.
    GetSummary {
        user_filter: Option<String>,
        reply: oneshot::Sender<Option<SessionSummary>>,
    },
    ContainerLog {
        line: String,
    },
    /// The bootstrap archive is handed out once, to whoever creates the container.
    TakeArchive {
        reply: oneshot::Sender<Option<Archive>>,
    },
    Terminate {
        reply: oneshot::Sender<SessionSummary>,
    },
}

#[derive(Debug)]
pub struct SessionHandle {
    task_id: TaskId,
    /// Ports assigned at launch; returned to the allocator when the session goes away.
    ports: BTreeMap<String, u16>,
    mailbox: mpsc::Sender<SessionMessage>,
    abort: AbortHandle,
}

impl SessionHandle {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn ports(&self) -> &BTreeMap<String, u16> {
        &self.ports
    }

    pub async fn summary(
        &self,
        user_filter: Option<String>,
        timeout: Duration,
    ) -> Result<Option<SessionSummary>, AskError> {
        mailbox::ask(&self.mailbox, timeout, |reply| SessionMessage::GetSummary {
            user_filter,
            reply,
        })
        .await
    }

    pub async fn report_log(&self, line: String) -> Result<(), AskError> {
        self.mailbox
            .send(SessionMessage::ContainerLog { line })
            .await
            .map_err(|_| AskError::Closed)
    }

    pub async fn take_archive(&self, timeout: Duration) -> Result<Option<Archive>, AskError> {
        mailbox::ask(&self.mailbox, timeout, |reply| SessionMessage::TakeArchive { reply }).await
    }

    pub async fn terminate(&self, timeout: Duration) -> Result<SessionSummary, AskError> {
        mailbox::ask(&self.mailbox, timeout, |reply| SessionMessage::Terminate { reply }).await
    }

    /// Stop the actor without waiting for it to answer.
    pub fn abort(&self) {
        self.abort.abort();
    }
}

pub struct SessionActor {
    spec: SessionSpec,
    bootstrap: Option<Archive>,
    state: SessionState,
    registered_time: DateTime<Utc>,
    mailbox: mpsc::Receiver<SessionMessage>,
}

impl SessionActor {
    pub fn spawn(mut spec: SessionSpec) -> SessionHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let task_id = spec.task_id;
        let ports = spec.config.environment.ports.clone();
        let bootstrap = Some(std::mem::take(&mut spec.bootstrap));

        let actor = Self {
            spec,
            bootstrap,
            state: SessionState::Pending,
            registered_time: Utc::now(),
            mailbox: rx,
        };
        let join = tokio::spawn(actor.run());

        SessionHandle {
            task_id,
            ports,
            mailbox: tx,
            abort: join.abort_handle(),
        }
    }

    async fn run(mut self) {
        debug!(task_id = %self.spec.task_id, "Session actor started");

        while let Some(message) = self.mailbox.recv().await {
            match message {
                SessionMessage::GetSummary { user_filter, reply } => {
                    let summary = match user_filter.as_deref() {
                        Some(user) if user != self.spec.owner => None,
                        _ => Some(self.summary()),
                    };
                    let _ = reply.send(summary);
                }
                SessionMessage::ContainerLog { line } => self.observe_log(&line),
                SessionMessage::TakeArchive { reply } => {
                    let _ = reply.send(self.bootstrap.take());
                }
                SessionMessage::Terminate { reply } => {
                    self.transition(SessionState::Terminated);
                    let _ = reply.send(self.summary());
                    break;
                }
            }
        }

        info!(task_id = %self.spec.task_id, "Session stopped");
    }

    fn observe_log(&mut self, line: &str) {
        for service in self.spec.readiness.observe(line) {
            info!(task_id = %self.spec.task_id, service = %service, "Service is ready");
        }
        if self.spec.readiness.all_ready() {
            self.transition(SessionState::Running);
        }
    }

    fn transition(&mut self, target: SessionState) {
        if self.state == target {
            return;
        }
        if !self.state.can_transition_to(&target) {
            warn!(
                task_id = %self.spec.task_id,
                "Ignoring invalid state transition {:?} -> {:?}", self.state, target
            );
            return;
        }
        info!(task_id = %self.spec.task_id, "Session state {:?} -> {:?}", self.state, target);
        self.state = target;
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.spec.task_id,
            owner: self.spec.owner.clone(),
            description: self.spec.config.description.clone(),
            state: self.state,
            service_address: self.spec.service_address.clone(),
            ports: self.spec.config.environment.ports.clone(),
            ready: self.spec.readiness.all_ready(),
            registered_time: self.registered_time,
        }
    }
}
