//! Session: one conversation with its own activation, memory and timers.
//!
//! Turns run strictly one after another (`process_turn` takes `&mut self`).
//! The only concurrent writer is the delayed re-analysis task, and it shares
//! the mind with the turn through a single `tokio::sync::Mutex`. A turn holds
//! that lock from start to finish; re-analysis holds it only while applying
//! its result, never across its own collaborator calls.

use crate::collaborator::{
    Collaborator, ClassifyRequest, EmpathyRequest, ExtractionRequest, GenerationRequest,
    LlmCollaborator, ReanalysisRequest, ResponseNeedRequest, SpontaneousRequest,
};
use crate::llm::CompletionParams;
use crate::providers::build_client;
use anima_core::{AnimaConfig, CollaboratorError, CollaboratorKind, StateGraph};
use anima_limbic::{AffectEngine, ResponseSignal, TriggerPhase};
use anima_memory::{JournalRecord, KnowledgeStore, MemoryArchive, MemoryJournal};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

const SPONTANEOUS_CHANNEL: usize = 16;

// ============================================================================
// Public types
// ============================================================================

/// What one turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub turn: u64,
    /// Interlocutor states recognised this turn (graph-known only).
    pub user_states: Vec<String>,
    pub pressure: f32,
    pub phase: TriggerPhase,
    pub response: Option<String>,
    /// In-turn spontaneous utterance, if a state saturated.
    pub spontaneous: Option<String>,
    /// Collaborators that failed and were replaced by their defaults.
    pub degraded: Vec<CollaboratorKind>,
}

impl TurnOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// An utterance produced outside a turn, by the delayed re-analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SpontaneousUtterance {
    pub turn: u64,
    pub triggered: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub turn: u64,
    pub phase: TriggerPhase,
    pub top_states: Vec<(String, f32)>,
    pub active_states: BTreeMap<String, f32>,
    pub pressure: f32,
    pub empathy_target: Vec<String>,
    pub archive_len: usize,
    pub history_len: usize,
    pub knowledge_concepts: usize,
}

// ============================================================================
// Shared state
// ============================================================================

struct Mind {
    engine: AffectEngine,
    archive: MemoryArchive,
    knowledge: KnowledgeStore,
    history: Vec<String>,
    empathy_target: Vec<String>,
    turn: u64,
}

impl Mind {
    fn recent_history(&self, window: usize) -> Vec<String> {
        let skip = self.history.len().saturating_sub(window);
        self.history[skip..].to_vec()
    }

    fn significant(&self, threshold: f32) -> BTreeMap<String, f32> {
        self.engine.store().above(threshold).into_iter().collect()
    }
}

struct SessionContext {
    id: Uuid,
    started_at: DateTime<Utc>,
    graph: Arc<StateGraph>,
    collaborator: Arc<dyn Collaborator>,
    journal: Option<MemoryJournal>,
    config: AnimaConfig,
    mind: Mutex<Mind>,
    spontaneous_tx: mpsc::Sender<SpontaneousUtterance>,
}

impl SessionContext {
    fn journal_append(&self, record: &JournalRecord) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(record) {
                tracing::warn!("Journal write failed (non-fatal): {}", e);
            }
        }
    }

    fn deliver(&self, utterance: SpontaneousUtterance) {
        match self.spontaneous_tx.try_send(utterance) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Spontaneous channel full, dropping utterance");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Spontaneous receiver dropped");
            }
        }
    }
}

fn recover<T: Default>(
    kind: CollaboratorKind,
    result: std::result::Result<T, CollaboratorError>,
    degraded: &mut Vec<CollaboratorKind>,
) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!("{:?} collaborator failed, continuing without it: {}", kind, e);
        degraded.push(kind);
        T::default()
    })
}

// ============================================================================
// Session
// ============================================================================

pub struct Session {
    ctx: Arc<SessionContext>,
    pending: Vec<JoinHandle<()>>,
}

impl Session {
    /// Create a session.
    ///
    /// Returns `(Session, Receiver)`: the receiver yields utterances fired by
    /// the delayed re-analysis between turns.
    pub fn new(
        graph: Arc<StateGraph>,
        collaborator: Arc<dyn Collaborator>,
        knowledge: KnowledgeStore,
        journal: Option<MemoryJournal>,
        config: AnimaConfig,
    ) -> (Self, mpsc::Receiver<SpontaneousUtterance>) {
        let (tx, rx) = mpsc::channel(SPONTANEOUS_CHANNEL);
        let engine = AffectEngine::new(
            graph.clone(),
            config.activation.clone(),
            config.propagation.clone(),
            config.pressure.clone(),
            config.trigger.clone(),
        );
        let mind = Mind {
            engine,
            archive: MemoryArchive::new(config.memory.archive_capacity),
            knowledge,
            history: Vec::new(),
            empathy_target: Vec::new(),
            turn: 0,
        };
        let ctx = SessionContext {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            graph,
            collaborator,
            journal,
            config,
            mind: Mutex::new(mind),
            spontaneous_tx: tx,
        };
        tracing::info!("Session {} started", ctx.id);
        (
            Self {
                ctx: Arc::new(ctx),
                pending: Vec::new(),
            },
            rx,
        )
    }

    /// Wire a session from configuration: load the graph, build the LLM
    /// client, open the knowledge store and the journal.
    ///
    /// Only a broken graph (or an unusable provider) is an error. A corrupt
    /// knowledge file is logged and replaced with an in-memory store.
    pub fn from_config(
        config: AnimaConfig,
    ) -> Result<(Self, mpsc::Receiver<SpontaneousUtterance>)> {
        let graph = StateGraph::load(&config.graph.path)
            .with_context(|| format!("Failed to load state graph {}", config.graph.path.display()))?;
        tracing::info!("Loaded {} states from {}", graph.len(), config.graph.path.display());
        let graph = Arc::new(graph);

        let client = build_client(&config.llm)?;
        let params = CompletionParams {
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            json_mode: false,
        };
        let collaborator = Arc::new(LlmCollaborator::new(client, &graph, params));

        let knowledge = match &config.memory.knowledge_path {
            Some(path) => KnowledgeStore::open(path).unwrap_or_else(|e| {
                tracing::warn!(
                    "Knowledge store {} unusable ({}), keeping concepts in memory",
                    path.display(),
                    e
                );
                KnowledgeStore::in_memory()
            }),
            None => KnowledgeStore::in_memory(),
        };
        let journal = config.memory.journal_path.as_ref().map(MemoryJournal::new);

        Ok(Self::new(graph, collaborator, knowledge, journal, config))
    }

    pub fn id(&self) -> Uuid {
        self.ctx.id
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        &self.ctx.graph
    }

    /// Re-analysis tasks that have not finished yet.
    pub fn pending_reanalyses(&self) -> usize {
        self.pending.iter().filter(|h| !h.is_finished()).count()
    }

    /// Run the full pipeline for one utterance.
    pub async fn process_turn(&mut self, utterance: &str) -> TurnOutcome {
        let ctx = self.ctx.clone();
        let cfg = &ctx.config;
        let utterance = utterance.trim().to_string();
        let mut degraded = Vec::new();

        let mut mind = ctx.mind.lock().await;
        mind.history.push(format!("Пользователь: {}", utterance));
        mind.turn += 1;
        let turn = mind.turn;
        tracing::info!("Session {} turn {}: '{}'", ctx.id, turn, utterance);

        // 1. Who is the interlocutor right now
        let classification = recover(
            CollaboratorKind::Classifier,
            ctx.collaborator
                .classify(ClassifyRequest {
                    utterance: utterance.clone(),
                    active_states: mind.engine.active_names(0.0),
                    candidates: ctx.graph.names().map(String::from).collect(),
                })
                .await,
            &mut degraded,
        );
        let user_states = ctx.graph.retain_known(&classification.states);
        mind.empathy_target = user_states.clone();

        // 2. Own states in response
        let empathy = recover(
            CollaboratorKind::Empathy,
            ctx.collaborator
                .empathize(EmpathyRequest {
                    active_states: mind.engine.top(usize::MAX),
                    interlocutor_states: user_states.clone(),
                })
                .await,
            &mut degraded,
        );
        if !empathy.deactivate.is_empty() {
            tracing::debug!("Ignoring explicit deactivation of {:?}", empathy.deactivate);
        }

        // 3. Stimulus, fade once, then spread
        mind.engine.react(&empathy.activate, &empathy.increase_weight);

        // 4. Should we speak
        let pressure = mind.engine.pressure();
        let need = recover(
            CollaboratorKind::ResponseNeed,
            ctx.collaborator
                .assess_need(ResponseNeedRequest {
                    active_states: mind.engine.store().above(cfg.memory.significance),
                    pressure,
                    utterance: utterance.clone(),
                    history: mind.recent_history(cfg.session.history_window),
                })
                .await,
            &mut degraded,
        );
        let decision = mind.engine.evaluate(&ResponseSignal {
            respond: need.respond,
            themes: need.themes,
        });

        // 5. Speak
        let mut response = None;
        if decision.responds() {
            let related = self.related_concepts(&mind);
            let memories = mind
                .archive
                .recent(cfg.session.history_window)
                .iter()
                .map(|e| format!("ход {}: {}", e.turn, e.describe()))
                .collect();
            let text = ctx
                .collaborator
                .generate(GenerationRequest {
                    utterance: utterance.clone(),
                    themes: decision.themes.clone(),
                    active_states: mind.engine.store().above(cfg.memory.significance),
                    related_concepts: related,
                    memories,
                })
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("Generator failed, using fallback response: {}", e);
                    degraded.push(CollaboratorKind::Generator);
                    cfg.session.fallback_response.clone()
                });
            mind.history.push(format!("Бот: {}", text));
            response = Some(text);
        }

        let mut spontaneous = None;
        if decision.fires_spontaneously() {
            tracing::info!("Spontaneous trigger in turn {}: {:?}", turn, decision.spontaneous);
            let text = ctx
                .collaborator
                .spontaneous(SpontaneousRequest {
                    triggered: decision.spontaneous.clone(),
                    top_states: mind.engine.top(cfg.session.top_states),
                    history: mind.recent_history(cfg.session.history_window),
                })
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("Spontaneous generator failed, using fallback: {}", e);
                    degraded.push(CollaboratorKind::Spontaneous);
                    cfg.session.fallback_spontaneous.clone()
                });
            mind.history.push(format!("Бот (спонтанно): {}", text));
            spontaneous = Some(text);
        }

        // 6. Remember and discharge
        if decision.speaks() {
            let snapshot = mind.significant(cfg.memory.significance);
            let target = mind.empathy_target.clone();
            mind.archive.record(snapshot, target, turn);

            let said = [response.as_deref(), spontaneous.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("\n");
            ctx.journal_append(&JournalRecord {
                utterance: utterance.clone(),
                response: said,
                top_states: mind.engine.top(cfg.session.top_states),
            });

            mind.engine.discharge(&decision.spontaneous);
        }

        if let Some(text) = &response {
            let drafts = recover(
                CollaboratorKind::Extraction,
                ctx.collaborator
                    .extract_concepts(ExtractionRequest {
                        utterance: utterance.clone(),
                        response: text.clone(),
                        active_states: mind.engine.active_names(0.0),
                    })
                    .await,
                &mut degraded,
            );
            if let Err(e) = mind.knowledge.add_concepts(drafts) {
                tracing::warn!("Knowledge store write failed (non-fatal): {}", e);
            }
        }

        mind.engine.finish();
        drop(mind);

        if let Some(text) = &response {
            self.schedule_reanalysis(utterance, text.clone());
        }

        TurnOutcome {
            turn,
            user_states,
            pressure,
            phase: decision.phase,
            response,
            spontaneous,
            degraded,
        }
    }

    /// Up to `related_limit` concept names related to any significant state.
    fn related_concepts(&self, mind: &Mind) -> Vec<String> {
        let cfg = &self.ctx.config.memory;
        let mut related: Vec<String> = Vec::new();
        for name in mind.engine.active_names(cfg.significance) {
            for concept in mind.knowledge.find_related(&name, cfg.related_limit) {
                if !related.contains(&concept) {
                    related.push(concept);
                }
            }
        }
        related.truncate(cfg.related_limit);
        related
    }

    fn schedule_reanalysis(&mut self, utterance: String, response: String) {
        self.pending.retain(|h| !h.is_finished());

        let ctx = self.ctx.clone();
        let delay = Duration::from_secs_f64(ctx.config.session.reanalysis_delay_secs.max(0.0));
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            reanalyze(ctx, utterance, response).await;
        });
        self.pending.push(handle);
    }

    pub async fn status(&self) -> SessionStatus {
        let mind = self.ctx.mind.lock().await;
        SessionStatus {
            session_id: self.ctx.id,
            started_at: self.ctx.started_at,
            turn: mind.turn,
            phase: mind.engine.phase(),
            top_states: mind.engine.top(self.ctx.config.session.top_states),
            active_states: mind.engine.snapshot(),
            pressure: mind.engine.pressure(),
            empathy_target: mind.empathy_target.clone(),
            archive_len: mind.archive.len(),
            history_len: mind.history.len(),
            knowledge_concepts: mind.knowledge.len(),
        }
    }

    /// Cancel every pending re-analysis. Nothing is delivered afterwards.
    pub fn shutdown(&mut self) {
        let pending = self.pending.len();
        for handle in self.pending.drain(..) {
            handle.abort();
        }
        if pending > 0 {
            tracing::info!("Session {} cancelled {} pending re-analyses", self.ctx.id, pending);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Delayed re-analysis
// ============================================================================

async fn reanalyze(ctx: Arc<SessionContext>, utterance: String, response: String) {
    let cfg = &ctx.config;
    tracing::info!("Session {} re-analysing '{}'", ctx.id, utterance);

    let journal_tail = match &ctx.journal {
        Some(journal) => journal
            .tail(cfg.memory.journal_tail_lines)
            .unwrap_or_else(|e| {
                tracing::warn!("Journal read failed (non-fatal): {}", e);
                String::new()
            }),
        None => String::new(),
    };
    let top_states = ctx.mind.lock().await.engine.top(cfg.session.top_states);

    let analysis = match ctx
        .collaborator
        .reanalyze(ReanalysisRequest {
            utterance,
            response,
            journal_tail,
            top_states,
        })
        .await
    {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!("Re-analysis failed (non-fatal): {}", e);
            return;
        }
    };
    if !analysis.decrease.is_empty() {
        tracing::debug!("Leaving {:?} to decay on their own", analysis.decrease);
    }

    let (request, turn) = {
        let mut mind = ctx.mind.lock().await;
        mind.engine.apply_reanalysis(&analysis.increase);
        let fired = mind.engine.check_spontaneous();
        if fired.is_empty() {
            return;
        }
        tracing::info!("Spontaneous trigger after re-analysis: {:?}", fired);

        let request = SpontaneousRequest {
            triggered: fired.clone(),
            top_states: mind.engine.top(cfg.session.top_states),
            history: mind.recent_history(cfg.session.history_window),
        };
        let snapshot = mind.significant(cfg.memory.significance);
        let target = mind.empathy_target.clone();
        let turn = mind.turn;
        mind.archive.record(snapshot, target, turn);
        mind.engine.discharge(&fired);
        mind.engine.finish();
        (request, turn)
    };

    let text = ctx
        .collaborator
        .spontaneous(request.clone())
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Spontaneous generator failed, using fallback: {}", e);
            cfg.session.fallback_spontaneous.clone()
        });

    ctx.mind
        .lock()
        .await
        .history
        .push(format!("Бот (спонтанно): {}", text));
    ctx.journal_append(&JournalRecord {
        utterance: String::new(),
        response: text.clone(),
        top_states: request.top_states,
    });
    ctx.deliver(SpontaneousUtterance {
        turn,
        triggered: request.triggered,
        text,
    });
}
