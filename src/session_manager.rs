use crate::analyzer::Swatch;
use crate::engine::HexColor;
use crate::error::RejectionError;
use crate::models::{
    LogoSummary, NoticeEvent, SelectionEvent, SessionSnapshot, SseEvent, StatsEvent,
    SwatchesEvent, TextEvent,
};
use crate::selection::Selection;
use crate::upload::LogoUpload;
use futures_util::stream::Stream;
use memorable_ids::{generate, suffix_generators, GenerateOptions};
use serde::Serialize;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

const HISTORY_SIZE: usize = 10;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Guard that removes a client from the clients map when dropped
struct ClientGuard {
    client_id: String,
    clients: Arc<RwLock<HashMap<String, ()>>>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        let client_id = self.client_id.clone();
        let clients = self.clients.clone();
        tokio::spawn(async move {
            clients.write().await.remove(&client_id);
            info!("Client {} disconnected and removed", client_id);
        });
    }
}

/// Proof that an upload was started. Only the newest ticket may publish
/// its swatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket {
    generation: u64,
}

#[derive(Default)]
struct SessionState {
    logo: Option<LogoUpload>,
    swatches: Vec<Swatch>,
    selection: Selection,
    brand_text: Option<String>,
}

pub struct Session {
    id: String,
    sender: broadcast::Sender<SseEvent>,
    history: Arc<RwLock<Vec<SseEvent>>>,
    clients: Arc<RwLock<HashMap<String, ()>>>,
    state: RwLock<SessionState>,
    generation: AtomicU64,
    last_activity: AtomicI64,
}

impl Session {
    pub fn new(id: String) -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            id,
            sender,
            history: Arc::new(RwLock::new(Vec::new())),
            clients: Arc::new(RwLock::new(HashMap::new())),
            state: RwLock::new(SessionState::default()),
            generation: AtomicU64::new(0),
            last_activity: AtomicI64::new(now_millis()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn touch(&self) {
        self.last_activity.store(now_millis(), Ordering::Relaxed);
    }

    pub fn idle_for(&self, now: i64) -> Duration {
        let idle = now - self.last_activity.load(Ordering::Relaxed);
        Duration::from_millis(idle.max(0) as u64)
    }

    pub async fn subscribe(&self) -> Pin<Box<dyn Stream<Item = SseEvent> + Send>> {
        let client_id = Uuid::new_v4().to_string();
        self.clients.write().await.insert(client_id.clone(), ());

        let mut receiver = self.sender.subscribe();
        let history = self.history.read().await.clone();

        // Create a guard that will remove the client when the stream is dropped
        let _guard = ClientGuard {
            client_id,
            clients: self.clients.clone(),
        };

        Box::pin(async_stream::stream! {
            // Move guard into the stream so it's dropped when the stream is dropped
            let _guard = _guard;

            // Send history first
            for event in history {
                yield event;
            }

            // Then stream new events
            while let Ok(event) = receiver.recv().await {
                yield event;
            }
        })
    }

    pub async fn get_stats(&self) -> StatsEvent {
        let clients = self.clients.read().await;
        let client_ids: Vec<String> = clients.keys().cloned().collect();
        StatsEvent {
            client_count: client_ids.len(),
            conn_count: self.subscriber_count(),
            clients: client_ids,
        }
    }

    /// Start a new upload. Any upload still decoding is superseded.
    pub fn begin_upload(&self) -> UploadTicket {
        self.touch();
        UploadTicket {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    pub fn is_current(&self, ticket: UploadTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Store a decoded logo if `ticket` is still the newest upload. Returns
    /// false and leaves the session alone otherwise.
    pub async fn complete_upload(
        &self,
        ticket: UploadTicket,
        logo: LogoUpload,
        swatches: Vec<Swatch>,
    ) -> bool {
        let mut state = self.state.write().await;
        if !self.is_current(ticket) {
            debug!(
                "Session {}: discarding stale decode of {} (generation {})",
                self.id, logo.file_name, ticket.generation
            );
            return false;
        }

        let event = SwatchesEvent {
            file_name: logo.file_name.clone(),
            swatches: swatches.clone(),
        };
        info!(
            "Session {}: {} produced {} swatches",
            self.id,
            logo.file_name,
            swatches.len()
        );

        *state = SessionState {
            logo: Some(logo),
            swatches,
            selection: Selection::default(),
            brand_text: None,
        };
        drop(state);

        self.publish("swatches", &event).await;
        true
    }

    /// Click on a swatch of the current palette.
    pub async fn select(&self, color: HexColor) -> Result<Selection, RejectionError> {
        self.touch();
        let mut state = self.state.write().await;
        if !state.swatches.iter().any(|swatch| swatch.hex == color) {
            return Err(RejectionError::UnknownSwatch(color));
        }

        let (selection, change) = state.selection.click(color)?;
        state.selection = selection;
        drop(state);

        debug!("Session {}: {:?} {}", self.id, change, color);
        self.publish("selection", &SelectionEvent { change, selection })
            .await;
        Ok(selection)
    }

    pub async fn selection(&self) -> Selection {
        self.state.read().await.selection
    }

    pub async fn logo(&self) -> Option<LogoUpload> {
        self.state.read().await.logo.clone()
    }

    pub async fn brand_text(&self) -> Option<String> {
        self.state.read().await.brand_text.clone()
    }

    pub async fn set_brand_text(&self, text: String) {
        self.state.write().await.brand_text = Some(text.clone());
        self.publish("text", &TextEvent { text }).await;
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            id: self.id.clone(),
            logo: state.logo.as_ref().map(|logo| LogoSummary {
                file_name: logo.file_name.clone(),
                kind: logo.kind,
                size: logo.bytes.len(),
            }),
            swatches: state.swatches.clone(),
            selection: state.selection,
            brand_text: state.brand_text.clone(),
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    pub async fn publish_notice(&self, notice: NoticeEvent) {
        self.publish("notice", &notice).await;
    }

    pub async fn publish_stats(&self, stats: StatsEvent) {
        self.publish("stats", &stats).await;
    }

    async fn publish(&self, event_type: &str, payload: &impl Serialize) {
        let data = match serde_json::to_string(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!("Session {}: failed to encode {} event: {}", self.id, event_type, e);
                return;
            }
        };
        let sse_event = SseEvent {
            event_type: event_type.to_string(),
            data,
        };

        // Add to history
        let mut history = self.history.write().await;
        history.push(sse_event.clone());
        if history.len() > HISTORY_SIZE {
            history.remove(0);
        }
        drop(history);

        // Broadcast to all subscribers
        let _ = self.sender.send(sse_event);
    }
}

pub struct SessionManager {
    sessions: HashMap<String, Arc<Session>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    pub fn create_session(&mut self) -> Arc<Session> {
        let mut id = memorable_id();
        while self.sessions.contains_key(&id) {
            id = memorable_id();
        }

        info!("Created session {}", id);
        let session = Arc::new(Session::new(id.clone()));
        self.sessions.insert(id, session.clone());
        session
    }

    pub fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions that nobody watches and nobody touched within the TTL.
    pub fn garbage_collect(&mut self) -> usize {
        let now = now_millis();
        let ttl = self.ttl;
        let before = self.sessions.len();

        self.sessions.retain(|id, session| {
            let keep = session.subscriber_count() > 0 || session.idle_for(now) < ttl;
            if !keep {
                info!("Removing idle session: {}", id);
            }
            keep
        });

        before - self.sessions.len()
    }
}

fn memorable_id() -> String {
    generate(GenerateOptions {
        components: 2,
        suffix: Some(suffix_generators::number),
        ..Default::default()
    })
    .unwrap_or_else(|_| Uuid::new_v4().to_string())
}
