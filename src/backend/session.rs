//! Current sign-in state with push notifications on login/logout

use bevy::prelude::*;

use crate::backend::types::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionListenerId(u64);

type SessionListener = Box<dyn FnMut(Option<&Session>) + Send + Sync>;

#[derive(Resource, Default)]
pub struct SessionState {
    session: Option<Session>,
    listeners: Vec<(SessionListenerId, SessionListener)>,
    next_listener: u64,
    pub pending: bool,
    pub notice: Option<String>,
    pub error: Option<String>,
}

impl SessionState {
    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.id.as_str())
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SessionListenerId
    where
        F: FnMut(Option<&Session>) + Send + Sync + 'static,
    {
        let id = SessionListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SessionListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Replace the session; listeners hear about it only when the signed-in
    /// user actually changes.
    pub fn set(&mut self, session: Option<Session>) {
        let changed_user = self.user_id() != session.as_ref().map(|s| s.user.id.as_str());
        self.session = session;
        self.pending = false;
        if changed_user {
            for (_, listener) in self.listeners.iter_mut() {
                listener(self.session.as_ref());
            }
        }
    }

    pub fn clear(&mut self) {
        self.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::SessionUser;
    use std::sync::{Arc, Mutex};

    fn session(user: &str, token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: None,
            expires_at: None,
            user: SessionUser {
                id: user.to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn listeners_hear_login_and_logout() {
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let log = seen.clone();
        let mut state = SessionState::default();
        state.subscribe(move |s| {
            log.lock().unwrap().push(s.map(|s| s.user.id.clone()));
        });

        state.set(Some(session("u1", "t1")));
        // token refresh for the same user is not a login
        state.set(Some(session("u1", "t2")));
        state.clear();
        state.clear();

        assert_eq!(*seen.lock().unwrap(), vec![Some("u1".to_string()), None]);
        assert_eq!(state.token(), None);
    }

    #[test]
    fn unsubscribed_listener_is_silent() {
        let seen: Arc<Mutex<usize>> = Arc::default();
        let count = seen.clone();
        let mut state = SessionState::default();
        let id = state.subscribe(move |_| *count.lock().unwrap() += 1);
        assert!(state.unsubscribe(id));
        state.set(Some(session("u1", "t1")));
        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(state.token(), Some("t1"));
    }
}
