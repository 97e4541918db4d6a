//! Session view controller: the Login / Register / Main panel machine, the
//! owned session, and what the front end should currently display.
//!
//! Handlers take `&mut self` and await their backend calls one after the
//! other. The only work that outlives a handler is the counter write returned
//! by [`SessionController::increment_counter`].

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::domain::{UserState, BET_STAKE, DEFAULT_COINS};
use storage::KeyValueStore;
use tracing::{debug, info, warn};

use crate::{
    error::{BackendError, Field, SessionError, ValidationError},
    validation::Validator,
    Identity, SessionBackend,
};

/// Fixed key of the persisted identity record in the local store.
pub const IDENTITY_RECORD_KEY: &str = "currentUser";

const REGISTERED_NOTICE: &str = "Registration succeeded! Please log in";
const NOT_ENOUGH_COINS: &str = "Not enough coins: 100 coins are needed to play";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Login,
    Register,
    Main,
}

impl Panel {
    pub const ALL: [Panel; 3] = [Panel::Login, Panel::Register, Panel::Main];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Win,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResult {
    pub text: String,
    pub tone: Tone,
}

/// Everything the front end renders. Exactly one panel is visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub panel: Panel,
    pub field_errors: BTreeMap<Field, String>,
    /// Blocking message the user has to acknowledge.
    pub alert: Option<String>,
    pub notice: Option<String>,
    pub username: Option<String>,
    pub counter: u64,
    pub coins: u64,
    pub show_coins: bool,
    pub game_result: Option<GameResult>,
}

impl ViewModel {
    fn new(show_coins: bool) -> Self {
        Self {
            panel: Panel::Login,
            field_errors: BTreeMap::new(),
            alert: None,
            notice: None,
            username: None,
            counter: 0,
            coins: DEFAULT_COINS,
            show_coins,
            game_result: None,
        }
    }

    pub fn is_visible(&self, panel: Panel) -> bool {
        self.panel == panel
    }

    pub fn has_messages(&self) -> bool {
        !self.field_errors.is_empty()
            || self.alert.is_some()
            || self.notice.is_some()
            || self.game_result.is_some()
    }

    fn clear_messages(&mut self) {
        self.field_errors.clear();
        self.alert = None;
        self.notice = None;
        self.game_result = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    pub state: UserState,
}

/// Identity record kept in the local store between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedIdentity {
    pub identity: Identity,
    pub saved_at: DateTime<Utc>,
}

/// Pending write of an already displayed counter value.
///
/// Failures are logged and dropped: the displayed value is never rolled back,
/// so display and backend can disagree until the next successful load.
#[must_use = "the counter is only saved when the write is persisted"]
pub struct CounterWrite {
    backend: Arc<dyn SessionBackend>,
    identity: Identity,
    counter: u64,
}

/// What became of a [`CounterWrite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub saved: bool,
    /// Credentials renewed on the way; hand them to
    /// [`SessionController::adopt_identity`].
    pub refreshed: Option<Identity>,
}

impl CounterWrite {
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Saves the value, renewing expired credentials and retrying once.
    pub async fn persist(self) -> WriteOutcome {
        let first = self
            .backend
            .update_counter(&self.identity, self.counter)
            .await;
        let (result, refreshed) = match first {
            Err(BackendError::Unauthorized) => self.retry_with_renewed_credentials().await,
            other => (other, None),
        };

        let saved = match result {
            Ok(()) => {
                debug!(user_id = %self.identity.user_id, counter = self.counter, "counter saved");
                true
            }
            Err(err) => {
                warn!(
                    user_id = %self.identity.user_id,
                    counter = self.counter,
                    error = %err,
                    "failed to save counter"
                );
                false
            }
        };
        WriteOutcome { saved, refreshed }
    }

    async fn retry_with_renewed_credentials(
        &self,
    ) -> (Result<(), BackendError>, Option<Identity>) {
        match self.backend.refresh_session(&self.identity).await {
            Ok(Some(refreshed)) => {
                let retry = self.backend.update_counter(&refreshed, self.counter).await;
                (retry, Some(refreshed))
            }
            Ok(None) => (Err(BackendError::Unauthorized), None),
            Err(err) => (Err(err), None),
        }
    }
}

pub struct SessionController {
    backend: Arc<dyn SessionBackend>,
    store: Arc<dyn KeyValueStore>,
    validator: Validator,
    session: Option<Session>,
    view: ViewModel,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        store: Arc<dyn KeyValueStore>,
        validator: Validator,
    ) -> Self {
        let view = ViewModel::new(backend.capabilities().bet_game);
        Self {
            backend,
            store,
            validator,
            session: None,
            view,
        }
    }

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Cached state of the current session, or the defaults when signed out.
    pub fn user_state(&self) -> UserState {
        self.session
            .as_ref()
            .map(|session| session.state)
            .unwrap_or_default()
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn take_alert(&mut self) -> Option<String> {
        self.view.alert.take()
    }

    /// Picks the initial panel: Main when a persisted identity is still
    /// signed in, Login otherwise.
    pub async fn start(&mut self) -> Panel {
        match self.restore_identity().await {
            Some(identity) => {
                info!(user_id = %identity.user_id, binding = %self.backend.binding(), "restored session");
                self.begin_session(identity, None).await;
                self.enter(Panel::Main);
            }
            None => self.enter(Panel::Login),
        }
        self.view.panel
    }

    pub fn show_register(&mut self) -> Result<(), SessionError> {
        self.link_to(Panel::Register)
    }

    pub fn show_login(&mut self) -> Result<(), SessionError> {
        self.link_to(Panel::Login)
    }

    pub async fn submit_register(
        &mut self,
        username: &str,
        password: &str,
        confirmation: Option<&str>,
    ) -> Result<(), SessionError> {
        self.require_panel(Panel::Register, Panel::Login)?;
        self.view.clear_messages();

        if let Err(err) = self
            .validator
            .check_registration(username, password, confirmation)
        {
            return Err(self.reject_field(err));
        }

        match self.backend.register(username, password).await {
            Ok(outcome) => {
                info!(username, user_id = ?outcome.user_id, "registration accepted");
                self.enter(Panel::Login);
                self.view.notice = Some(
                    outcome
                        .message
                        .unwrap_or_else(|| REGISTERED_NOTICE.to_string()),
                );
                Ok(())
            }
            Err(err) => {
                info!(username, error = %err, "registration failed");
                let message = format!("Registration failed: {err}");
                self.view.alert = Some(message.clone());
                Err(SessionError::Auth(message))
            }
        }
    }

    pub async fn submit_login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        self.require_panel(Panel::Login, Panel::Main)?;
        self.view.clear_messages();

        if let Err(err) = self.validator.check_login(username) {
            return Err(self.reject_field(err));
        }

        match self.backend.login(username, password).await {
            Ok(outcome) => {
                info!(user_id = %outcome.identity.user_id, binding = %self.backend.binding(), "signed in");
                self.persist_identity(&outcome.identity).await;
                self.begin_session(outcome.identity, outcome.state).await;
                self.enter(Panel::Main);
                Ok(())
            }
            Err(err) => {
                info!(username, error = %err, "login failed");
                let message = format!("Login failed: {err}");
                self.view.alert = Some(message.clone());
                Err(SessionError::Auth(message))
            }
        }
    }

    /// Bumps the counter on screen right away and hands back the write that
    /// saves it.
    pub fn increment_counter(&mut self) -> Result<CounterWrite, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        session.state.counter = session.state.counter.saturating_add(1);
        self.view.counter = session.state.counter;

        Ok(CounterWrite {
            backend: Arc::clone(&self.backend),
            identity: session.identity.clone(),
            counter: session.state.counter,
        })
    }

    pub async fn play_bet_game(&mut self) -> Result<(), SessionError> {
        if !self.backend.capabilities().bet_game {
            return Err(SessionError::Unsupported("bet game"));
        }
        let (identity, coins) = match &self.session {
            Some(session) => (session.identity.clone(), session.state.coins),
            None => return Err(SessionError::NoSession),
        };
        self.view.alert = None;

        if coins < BET_STAKE {
            self.view.alert = Some(NOT_ENOUGH_COINS.to_string());
            return Err(SessionError::Game(NOT_ENOUGH_COINS.to_string()));
        }

        match self.backend.play_bet_game(&identity, coins).await {
            Ok(outcome) => {
                info!(
                    user_id = %identity.user_id,
                    is_odd = outcome.is_odd,
                    random_number = ?outcome.random_number,
                    new_coins = outcome.new_coins,
                    "bet settled"
                );
                if let Some(session) = self.session.as_mut() {
                    session.state.coins = outcome.new_coins;
                }
                self.view.coins = outcome.new_coins;
                self.view.game_result = Some(GameResult {
                    text: outcome.message,
                    tone: if outcome.is_odd { Tone::Win } else { Tone::Loss },
                });
                Ok(())
            }
            Err(err) => {
                warn!(user_id = %identity.user_id, error = %err, "bet failed");
                let message = match err {
                    BackendError::Rejected(message) => message,
                    other => format!("Game failed: {other}"),
                };
                self.view.alert = Some(message.clone());
                Err(SessionError::Game(message))
            }
        }
    }

    /// Replaces the credentials of the current session with renewed ones and
    /// persists them. Ignored when that account is no longer signed in.
    pub async fn adopt_identity(&mut self, identity: Identity) {
        let Some(session) = self.session.as_mut() else {
            debug!(user_id = %identity.user_id, "dropping renewed credentials after sign-out");
            return;
        };
        if session.identity.user_id != identity.user_id {
            debug!(user_id = %identity.user_id, "dropping renewed credentials of another account");
            return;
        }
        session.identity = identity.clone();
        self.persist_identity(&identity).await;
    }

    /// Always ends on the Login panel with the counter and coins reset.
    pub async fn logout(&mut self) {
        if let Err(err) = self.store.remove(IDENTITY_RECORD_KEY).await {
            warn!(error = %err, "failed to clear persisted identity");
        }
        if let Some(session) = self.session.take() {
            if let Err(err) = self.backend.sign_out(&session.identity).await {
                warn!(user_id = %session.identity.user_id, error = %err, "backend sign-out failed");
            }
            info!(user_id = %session.identity.user_id, "signed out");
        }
        self.view.username = None;
        self.view.counter = 0;
        self.view.coins = DEFAULT_COINS;
        self.enter(Panel::Login);
    }

    fn enter(&mut self, panel: Panel) {
        debug!(from = ?self.view.panel, to = ?panel, "panel change");
        self.view.panel = panel;
        self.view.clear_messages();
    }

    fn link_to(&mut self, panel: Panel) -> Result<(), SessionError> {
        if self.view.panel == Panel::Main {
            return Err(SessionError::InvalidTransition {
                from: Panel::Main,
                to: panel,
            });
        }
        self.enter(panel);
        Ok(())
    }

    fn require_panel(&self, expected: Panel, target: Panel) -> Result<(), SessionError> {
        if self.view.panel == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.view.panel,
                to: target,
            })
        }
    }

    fn reject_field(&mut self, err: ValidationError) -> SessionError {
        debug!(field = ?err.field, "submission blocked by validation");
        self.view.field_errors.insert(err.field, err.message.clone());
        SessionError::Validation(err)
    }

    async fn begin_session(&mut self, identity: Identity, initial: Option<UserState>) {
        let mut state = initial.unwrap_or_default();
        match self.backend.fetch_user_state(&identity).await {
            Ok(loaded) => state = loaded,
            Err(err) => {
                warn!(user_id = %identity.user_id, error = %err, "failed to load user data");
            }
        }
        self.view.username = Some(identity.username.clone());
        self.view.counter = state.counter;
        self.view.coins = state.coins;
        self.session = Some(Session { identity, state });
    }

    async fn persist_identity(&self, identity: &Identity) {
        let record = PersistedIdentity {
            identity: identity.clone(),
            saved_at: Utc::now(),
        };
        let serialized = match serde_json::to_string(&record) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(error = %err, "failed to encode identity record");
                return;
            }
        };
        if let Err(err) = self.store.set(IDENTITY_RECORD_KEY, &serialized).await {
            warn!(error = %err, "failed to persist identity record");
        }
    }

    async fn restore_identity(&self) -> Option<Identity> {
        let raw = match self.store.get(IDENTITY_RECORD_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "failed to read persisted identity");
                return None;
            }
        };

        let record = match serde_json::from_str::<PersistedIdentity>(&raw) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "discarding unreadable identity record");
                self.forget_identity().await;
                return None;
            }
        };

        match self.backend.check_session(&record.identity).await {
            Ok(true) => {
                debug!(saved_at = %record.saved_at, "persisted identity still signed in");
                Some(record.identity)
            }
            Ok(false) => match self.backend.refresh_session(&record.identity).await {
                Ok(Some(refreshed)) => {
                    info!(user_id = %refreshed.user_id, "renewed persisted session");
                    self.persist_identity(&refreshed).await;
                    Some(refreshed)
                }
                Ok(None) => {
                    info!(user_id = %record.identity.user_id, "persisted session expired");
                    self.forget_identity().await;
                    None
                }
                Err(err) => {
                    warn!(user_id = %record.identity.user_id, error = %err, "could not renew persisted session");
                    None
                }
            },
            Err(err) => {
                warn!(user_id = %record.identity.user_id, error = %err, "could not verify persisted session");
                None
            }
        }
    }

    async fn forget_identity(&self) {
        if let Err(err) = self.store.remove(IDENTITY_RECORD_KEY).await {
            warn!(error = %err, "failed to clear persisted identity");
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
