//! Application state for the HTTP server

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::Result;
use crate::ingestion::ExtractorRegistry;
use crate::pipeline::QaPipeline;
use crate::types::response::AcceptedFile;
use crate::types::Document;

/// One upload batch and the document built from it
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub document: Document,
    pub files: Vec<AcceptedFile>,
    pub created_at: DateTime<Utc>,
    last_used: Mutex<Instant>,
}

impl Session {
    /// Mark the session as used now
    pub fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    /// Time since the session was created or last asked a question
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_used.lock())
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    pipeline: Arc<QaPipeline>,
    registry: Arc<ExtractorRegistry>,
    /// Live sessions; each is private to its own requests
    sessions: DashMap<Uuid, Arc<Session>>,
    ready: RwLock<bool>,
}

impl AppState {
    /// Build state with the configured backend
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(backend = ?config.backend, "Initializing application state");
        let pipeline = QaPipeline::from_config(&config)?;
        Ok(Self::from_parts(
            config,
            Arc::new(pipeline),
            ExtractorRegistry::with_defaults(),
        ))
    }

    /// Build state around an existing pipeline and extractor registry
    pub fn from_parts(config: RagConfig, pipeline: Arc<QaPipeline>, registry: ExtractorRegistry) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                registry: Arc::new(registry),
                sessions: DashMap::new(),
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> &Arc<QaPipeline> {
        &self.inner.pipeline
    }

    pub fn registry(&self) -> Arc<ExtractorRegistry> {
        Arc::clone(&self.inner.registry)
    }

    /// Store a new session and return its ID
    ///
    /// At `max_sessions`, the least recently used session is ended first.
    pub async fn create_session(&self, document: Document, files: Vec<AcceptedFile>) -> Uuid {
        let max_sessions = self.inner.config.server.max_sessions;
        while self.inner.sessions.len() >= max_sessions {
            let now = Instant::now();
            let oldest = self
                .inner
                .sessions
                .iter()
                .max_by_key(|s| s.value().idle_for(now))
                .map(|s| *s.key());
            let Some(oldest) = oldest else { break };
            if self.end_session(&oldest).await {
                tracing::info!(
                    session_id = %oldest,
                    max_sessions,
                    "Session limit reached, ended least recently used"
                );
            }
        }

        let id = Uuid::new_v4();
        let session = Session {
            id,
            document,
            files,
            created_at: Utc::now(),
            last_used: Mutex::new(Instant::now()),
        };
        self.inner.sessions.insert(id, Arc::new(session));
        id
    }

    pub fn session(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.inner.sessions.get(id).map(|s| Arc::clone(s.value()))
    }

    pub fn remove_session(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.inner.sessions.remove(id).map(|(_, s)| s)
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Remove a session and release its cached index; returns whether it existed
    pub async fn end_session(&self, id: &Uuid) -> bool {
        let Some(session) = self.remove_session(id) else {
            return false;
        };
        self.inner.pipeline.invalidate(&session.document).await;
        true
    }

    /// End every session idle for at least `session_ttl_secs` as of `now`
    pub async fn expire_sessions(&self, now: Instant) -> Vec<Uuid> {
        let ttl = self.inner.config.server.session_ttl_secs;
        if ttl == 0 {
            return Vec::new();
        }
        let ttl = Duration::from_secs(ttl);

        let idle: Vec<Uuid> = self
            .inner
            .sessions
            .iter()
            .filter(|s| s.value().idle_for(now) >= ttl)
            .map(|s| *s.key())
            .collect();

        let mut expired = Vec::with_capacity(idle.len());
        for id in idle {
            if self.end_session(&id).await {
                expired.push(id);
            }
        }

        if !expired.is_empty() {
            tracing::info!(
                expired = expired.len(),
                remaining = self.session_count(),
                "Expired idle sessions"
            );
        }
        expired
    }

    /// Sweep idle sessions every `session_sweep_secs` until `stop` turns true
    pub fn spawn_session_sweeper(&self, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        let state = self.clone();
        let period = Duration::from_secs(self.inner.config.server.session_sweep_secs.max(1));

        tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = async { stop.wait_for(|stopping| *stopping).await.map(|_| ()) } => {
                        tracing::debug!("Session sweeper stopping");
                        break;
                    }
                    _ = ticks.tick() => {
                        state.expire_sessions(Instant::now()).await;
                    }
                }
            }
        })
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
