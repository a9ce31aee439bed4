//! Task lifecycle REST handlers plus SSE/WebSocket event streaming.
//!
//! Events reach clients through the shared bus: every runner publishes its
//! step records and status changes there, and the stream handlers filter by
//! task id. A stream ends after it has delivered a terminal status event.

use axum::{
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};

use crate::SharedState;
use openmanus_agent::{stop_channel, TaskRunner};
use openmanus_core::event::AgentEvent;
use openmanus_core::task::{Task, TaskStatus};
use openmanus_telemetry::TaskTrace;

/// Maximum number of in-memory task snapshots before oldest are evicted.
const MAX_TASKS: usize = 1_000;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn not_found(id: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("No task with id '{id}'"),
        }),
    )
}

// ── Task lifecycle ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub prompt: String,
}

#[derive(Serialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
}

/// `POST /api/tasks` — create a task and spawn its runner.
pub async fn create_task_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<CreateTaskResponse>), (StatusCode, Json<ErrorResponse>)> {
    if payload.prompt.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "prompt must not be empty".into(),
            }),
        ));
    }

    let task_id = spawn_task(state, payload.prompt).await;
    info!(task_id = %task_id, "Task created");

    Ok((StatusCode::CREATED, Json(CreateTaskResponse { task_id })))
}

/// Store a running snapshot, spawn the runner, and hand back the id.
///
/// The snapshot in the store stays at `Running` until the runner finishes
/// and writes the final task back; live progress flows over the event bus.
async fn spawn_task(state: SharedState, prompt: String) -> String {
    let mut task = Task::new(prompt);
    let task_id = task.id.to_string();
    let (stop_handle, stop_signal) = stop_channel();

    {
        let mut tasks = state.tasks.write().await;
        if tasks.len() >= MAX_TASKS
            && let Some(oldest) = tasks
                .iter()
                .min_by_key(|(_, t)| t.created_at)
                .map(|(k, _)| k.clone())
        {
            tasks.remove(&oldest);
        }
        let mut snapshot = task.clone();
        snapshot.status = TaskStatus::Running;
        tasks.insert(task_id.clone(), snapshot);
    }
    state.stops.write().await.insert(task_id.clone(), stop_handle);

    let runner = TaskRunner::new(state.provider.clone(), state.tools.clone(), &state.config)
        .with_event_bus(state.event_bus.clone())
        .with_trace_sink(state.recorder.clone());

    let spawn_state = state.clone();
    let spawn_id = task_id.clone();
    tokio::spawn(async move {
        let outcome = runner.run(&mut task, stop_signal).await;
        if let openmanus_core::task::RunOutcome::Failed(e) = &outcome {
            error!(task_id = %spawn_id, error = %e, "Task failed");
        }
        spawn_state.stops.write().await.remove(&spawn_id);
        spawn_state.tasks.write().await.insert(spawn_id.clone(), task);
    });

    task_id
}

#[derive(Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub prompt: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            prompt: task.prompt.clone(),
            status: task.status,
            created_at: task.created_at,
            finished_at: task.finished_at,
            result: task.result.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskSummary>,
}

/// `GET /api/tasks` — list task summaries, newest first.
pub async fn list_tasks_handler(State(state): State<SharedState>) -> Json<TaskListResponse> {
    let tasks = state.tasks.read().await;
    let mut summaries: Vec<TaskSummary> = tasks.values().map(TaskSummary::from).collect();
    summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(TaskListResponse { tasks: summaries })
}

/// `GET /api/tasks/{id}` — the full task: messages, steps, result.
pub async fn get_task_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, (StatusCode, Json<ErrorResponse>)> {
    let tasks = state.tasks.read().await;
    tasks.get(&id).map(|t| Json(t.clone())).ok_or_else(|| not_found(&id))
}

#[derive(Serialize)]
pub struct StopResponse {
    pub task_id: String,
    pub status: TaskStatus,
}

/// `POST /api/tasks/{id}/stop` — request a cooperative stop.
///
/// Missing task: 404. Terminal task: a 200 no-op reporting the status it
/// already reached.
pub async fn stop_task_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<StopResponse>, (StatusCode, Json<ErrorResponse>)> {
    let status = {
        let tasks = state.tasks.read().await;
        tasks.get(&id).map(|t| t.status).ok_or_else(|| not_found(&id))?
    };

    if !status.is_terminal()
        && let Some(handle) = state.stops.read().await.get(&id)
    {
        info!(task_id = %id, "Stop requested");
        handle.stop();
    }

    Ok(Json(StopResponse { task_id: id, status }))
}

/// `GET /api/tasks/{id}/trace` — recorded LLM/tool spans for a task.
pub async fn task_trace_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TaskTrace>, (StatusCode, Json<ErrorResponse>)> {
    state.recorder.trace(&id).map(Json).ok_or_else(|| not_found(&id))
}

// ── Event streaming ───────────────────────────────────────────────────────

fn event_name(event: &AgentEvent) -> &'static str {
    match event {
        AgentEvent::Step { .. } => "step",
        AgentEvent::StatusChanged { .. } => "status",
    }
}

fn is_terminal_event(event: &AgentEvent) -> bool {
    matches!(event, AgentEvent::StatusChanged { status, .. } if status.is_terminal())
}

/// `GET /api/tasks/{id}/events` — SSE stream of this task's step events.
///
/// Opens with the task's current status, then relays live events until a
/// terminal status has been delivered.
pub async fn task_events_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, (StatusCode, Json<ErrorResponse>)>
{
    // Subscribe before snapshotting so no event between the two is lost.
    let rx = state.event_bus.subscribe();
    let status = {
        let tasks = state.tasks.read().await;
        tasks.get(&id).map(|t| t.status).ok_or_else(|| not_found(&id))?
    };

    let initial = futures::stream::iter([AgentEvent::StatusChanged {
        task_id: id.clone(),
        status,
    }]);

    let filter_id = id.clone();
    let live = BroadcastStream::new(rx).filter_map(move |result| {
        futures::future::ready(match result {
            Ok(event) if event.task_id() == filter_id => Some(event.as_ref().clone()),
            _ => None,
        })
    });

    let stream = initial
        .chain(live)
        .scan(false, |done, event| {
            if *done {
                return futures::future::ready(None);
            }
            if is_terminal_event(&event) {
                *done = true;
            }
            futures::future::ready(Some(event))
        })
        .map(|event| {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Ok(SseEvent::default().event(event_name(&event)).data(data))
        });

    Ok(Sse::new(stream))
}

/// `GET /ws/{id}` — the same event stream over a WebSocket.
///
/// Server → client only: frames are `AgentEvent` JSON. The socket closes
/// after the terminal status frame.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    if !state.tasks.read().await.contains_key(&id) {
        return Err(not_found(&id));
    }
    Ok(ws.on_upgrade(move |socket| handle_ws_connection(socket, state, id)))
}

async fn handle_ws_connection(mut socket: WebSocket, state: SharedState, id: String) {
    info!(task_id = %id, "WebSocket connection established");

    let mut rx = state.event_bus.subscribe();
    let status = {
        let tasks = state.tasks.read().await;
        match tasks.get(&id) {
            Some(t) => t.status,
            None => return,
        }
    };

    let initial = AgentEvent::StatusChanged {
        task_id: id.clone(),
        status,
    };
    let frame = serde_json::to_string(&initial).unwrap_or_default();
    if socket.send(WsMessage::Text(frame.into())).await.is_err() {
        return;
    }
    if is_terminal_event(&initial) {
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            event = rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                if event.task_id() != id {
                    continue;
                }
                let frame = serde_json::to_string(event.as_ref()).unwrap_or_default();
                if socket.send(WsMessage::Text(frame.into())).await.is_err() {
                    break; // client disconnected
                }
                if is_terminal_event(&event) {
                    let _ = socket.send(WsMessage::Close(None)).await;
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue, // inbound frames are ignored
                }
            }
        }
    }

    info!(task_id = %id, "WebSocket connection closed");
}
