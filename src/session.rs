//! Per-browser session state for the HTML form.
//!
//! A session moves through `Idle → Evaluating → Evaluated → Generating →
//! Generated`. The `Evaluating` and `Generating` states last for exactly one
//! in-flight completion call; while in them every other action is refused.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use uuid::Uuid;

use crate::agent::context::{optional_text, AnnouncementContext, ValidationError};
use crate::evaluation::{Evaluation, Verdict};

/// Free press-release drafts per session.
pub const FREE_GENERATION_LIMIT: u32 = 5;

pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Evaluating,
    Evaluated,
    Generating,
    Generated,
}

impl SessionState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SessionState::Evaluating | SessionState::Generating)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("A request is already in progress")]
    Busy,
    #[error("Add your announcement first")]
    Invalid(#[from] ValidationError),
    #[error("Run PR Readiness Check first")]
    NotEvaluated,
    #[error("PR Readiness Verdict is {0}. Generation is blocked.")]
    Blocked(Verdict),
    #[error("You've used all {} free pitches", FREE_GENERATION_LIMIT)]
    LimitReached,
}

/// The fields the form lets the founder edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFields {
    pub announcement: String,
    pub market: String,
    pub funding: String,
    pub partners: String,
}

impl Default for FormFields {
    fn default() -> Self {
        Self {
            announcement: String::new(),
            market: "Fintech compliance".to_string(),
            funding: "$3M seed".to_string(),
            partners: "AcmePay (regulated UK fintech)".to_string(),
        }
    }
}

impl FormFields {
    /// Stage, geography and backers are not on the form and are sent as
    /// fixed values.
    pub fn to_context(&self) -> Result<AnnouncementContext, ValidationError> {
        Ok(AnnouncementContext {
            stage: Some("Seed".to_string()),
            market: optional_text(Some(&self.market)),
            geo: Some("TBD".to_string()),
            funding: optional_text(Some(&self.funding)),
            backers: Some("TBD".to_string()),
            partners: optional_text(Some(&self.partners)),
            ..AnnouncementContext::new(self.announcement.clone())?
        })
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    form: FormFields,
    brief: String,
    evaluation: Option<Evaluation>,
    draft: Option<String>,
    generations_used: u32,
    error: Option<String>,
    last_seen: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            form: FormFields::default(),
            brief: String::new(),
            evaluation: None,
            draft: None,
            generations_used: 0,
            error: None,
            last_seen: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn form(&self) -> &FormFields {
        &self.form
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.evaluation.as_ref().map(|e| e.result.verdict)
    }

    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    pub fn generations_used(&self) -> u32 {
        self.generations_used
    }

    pub fn generations_remaining(&self) -> u32 {
        FREE_GENERATION_LIMIT.saturating_sub(self.generations_used)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Start a readiness check. Allowed from any settled state; drops the
    /// previous evaluation so generation stays locked until the new verdict
    /// arrives. The generation counter is kept.
    pub fn begin_evaluation(
        &mut self,
        form: FormFields,
    ) -> Result<AnnouncementContext, SessionError> {
        if self.state.is_in_flight() {
            return Err(self.reject(SessionError::Busy));
        }
        self.form = form;
        let ctx = match self.form.to_context() {
            Ok(ctx) => ctx,
            Err(err) => return Err(self.reject(err.into())),
        };
        self.brief = ctx.announcement.clone();
        self.evaluation = None;
        self.error = None;
        self.state = SessionState::Evaluating;
        Ok(ctx)
    }

    pub fn complete_evaluation(&mut self, evaluation: Evaluation) {
        if self.state != SessionState::Evaluating {
            log::warn!("ignoring evaluation result in state {:?}", self.state);
            return;
        }
        self.evaluation = Some(evaluation);
        self.error = None;
        self.state = SessionState::Evaluated;
    }

    pub fn fail_evaluation(&mut self, message: impl Into<String>) {
        if self.state != SessionState::Evaluating {
            log::warn!("ignoring evaluation failure in state {:?}", self.state);
            return;
        }
        self.evaluation = None;
        self.error = Some(message.into());
        self.state = SessionState::Idle;
    }

    pub fn can_generate(&self) -> bool {
        self.generation_gate().is_ok()
    }

    fn generation_gate(&self) -> Result<(), SessionError> {
        if self.state.is_in_flight() {
            return Err(SessionError::Busy);
        }
        let verdict = match (&self.state, self.verdict()) {
            (SessionState::Evaluated, Some(verdict)) => verdict,
            _ => return Err(SessionError::NotEvaluated),
        };
        if !verdict.permits_generation() {
            return Err(SessionError::Blocked(verdict));
        }
        if self.generations_used >= FREE_GENERATION_LIMIT {
            return Err(SessionError::LimitReached);
        }
        Ok(())
    }

    /// Open a generation if the gate allows it, returning the announcement
    /// that was evaluated.
    pub fn begin_generation(&mut self) -> Result<String, SessionError> {
        if let Err(err) = self.generation_gate() {
            return Err(self.reject(err));
        }
        self.error = None;
        self.state = SessionState::Generating;
        Ok(self.brief.clone())
    }

    pub fn complete_generation(&mut self, draft: impl Into<String>) {
        if self.state != SessionState::Generating {
            log::warn!("ignoring generated draft in state {:?}", self.state);
            return;
        }
        self.draft = Some(draft.into());
        self.generations_used += 1;
        self.error = None;
        self.state = SessionState::Generated;
    }

    /// The evaluation stays valid, so a failed draft returns to `Evaluated`
    /// without consuming a free generation.
    pub fn fail_generation(&mut self, message: impl Into<String>) {
        if self.state != SessionState::Generating {
            log::warn!("ignoring generation failure in state {:?}", self.state);
            return;
        }
        self.error = Some(message.into());
        self.state = SessionState::Evaluated;
    }

    /// Show `message` on the next render without changing state.
    pub fn report(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    fn reject(&mut self, err: SessionError) -> SessionError {
        self.error = Some(err.to_string());
        err
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

/// In-memory sessions keyed by the id carried in the session cookie.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    capacity: usize,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.lock().contains_key(id)
    }

    /// Return `id` if it names a live session, otherwise start a new one.
    pub fn resolve(&self, id: Option<SessionId>) -> SessionId {
        let mut sessions = self.lock();
        if let Some(id) = id.filter(|id| sessions.contains_key(id)) {
            return id;
        }
        let id = Uuid::new_v4();
        self.insert(&mut sessions, id);
        id
    }

    /// Run `f` against the session, recreating it if it was evicted. The
    /// lock is held only for the duration of `f`.
    pub fn with<R>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.lock();
        if !sessions.contains_key(&id) {
            self.insert(&mut sessions, id);
        }
        let session = sessions.entry(id).or_default();
        session.touch();
        f(session)
    }

    /// Sessions waiting on a completion are never evicted, so the store may
    /// briefly grow past its capacity when all of them are in flight.
    fn insert(&self, sessions: &mut HashMap<SessionId, Session>, id: SessionId) {
        while sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .filter(|(_, session)| !session.state.is_in_flight())
                .min_by_key(|(_, session)| session.last_seen)
                .map(|(id, _)| *id);
            match oldest {
                Some(oldest) => {
                    log::debug!("evicting session {}", oldest);
                    sessions.remove(&oldest);
                }
                None => {
                    log::warn!(
                        "all {} sessions are in flight; exceeding capacity",
                        sessions.len()
                    );
                    break;
                }
            }
        }
        sessions.insert(id, Session::new());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
