//! Current identity, kept in sync with the auth-state stream.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use helpdesk_core::auth::{AuthEvent, AuthStateChange, Session};
use helpdesk_core::backend::AuthBackend;
use helpdesk_core::schema::Role;

/// What dependents see of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// False until the initial auth state is known.
    pub resolved: bool,
    pub session: Option<Session>,
    pub role: Option<Role>,
    pub is_admin: bool,
}

impl SessionSnapshot {
    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn resolved(session: Option<Session>) -> Self {
        let role = session.as_ref().and_then(Session::role);
        Self {
            resolved: true,
            session,
            role,
            is_admin: role == Some(Role::Admin),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Holds the session and notifies dependents on change.
///
/// One listener task per store. It subscribes before reading the current
/// session so no change between the two is lost.
pub struct SessionStore {
    state_rx: watch::Receiver<SessionSnapshot>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("snapshot", &*self.state_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Subscribe to `auth` and start resolving the initial state.
    /// Must be called inside a tokio runtime.
    pub fn start(auth: Arc<dyn AuthBackend>) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionSnapshot::unresolved());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let events = auth.subscribe();

        let task = tokio::spawn(listen(auth, events, state_tx, shutdown_rx));

        Self {
            state_rx,
            shutdown_tx,
            task: Some(task),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Change notifications.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_rx.clone()
    }

    /// Wait for the initial state.
    pub async fn wait_resolved(&self) -> SessionSnapshot {
        let mut rx = self.state_rx.clone();
        let resolved = rx.wait_for(|s| s.resolved).await.ok().map(|s| s.clone());
        // Listener gone; report what was last seen.
        resolved.unwrap_or_else(|| self.snapshot())
    }

    /// Wait for the next snapshot matching `predicate`.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let mut rx = self.state_rx.clone();
        rx.wait_for(predicate).await.ok().map(|s| s.clone())
    }

    /// Unsubscribe from the auth stream.
    pub fn close(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.close();
    }
}

async fn listen(
    auth: Arc<dyn AuthBackend>,
    mut events: broadcast::Receiver<AuthStateChange>,
    state_tx: watch::Sender<SessionSnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let initial = auth.current_session().await;
    tracing::debug!(event = ?AuthEvent::InitialSession, signed_in = initial.is_some(), "Auth state");
    state_tx.send_replace(SessionSnapshot::resolved(initial));

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(change) => {
                    tracing::debug!(
                        event = ?change.event,
                        user_id = ?change.session.as_ref().map(|s| s.user.id),
                        "Auth state"
                    );
                    state_tx.send_replace(SessionSnapshot::resolved(change.session));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth events dropped; re-reading session");
                    let current = auth.current_session().await;
                    state_tx.send_replace(SessionSnapshot::resolved(current));
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("Session listener stopped");
}
