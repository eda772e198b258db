//! The tool surface: named operations over the running creature.
//!
//! Every tool returns `{ok, result}` or `{ok: false, kind, message}`:
//! a short human explanation plus a machine-readable kind. Read tools are
//! idempotent; actuation goes through the control channel so the broker
//! stays the only process touching hardware.

use chrono::Utc;
use serde_json::{json, Value};

use anima_core::{
    AnimaConfig, CalibrationPatch, DisplayCommand, Freshness, Mood, SubsystemStatus,
};
use anima_sense::DriftField;

use crate::state::AppState;

/// A failed tool call: machine-readable kind + human message.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub kind: &'static str,
    pub message: String,
}

impl ToolError {
    fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type ToolResult = Result<Value, ToolError>;

pub const TOOL_NAMES: &[&str] = &[
    "get_state",
    "get_identity",
    "read_sensors",
    "get_calibration",
    "set_calibration",
    "get_health",
    "get_trajectory",
    "get_eisv_trajectory_state",
    "next_steps",
    "show_face",
    "switch_screen",
    "manage_display",
    "post_message",
    "lumen_qa",
    "leave_agent_note",
    "unified_workflow",
];

/// Dispatch one named tool call.
pub async fn dispatch(state: &AppState, name: &str, input: &Value) -> ToolResult {
    match name {
        "get_state" => get_state(state).await,
        "get_identity" => get_identity(state).await,
        "read_sensors" => read_sensors(state),
        "get_calibration" => get_calibration(state),
        "set_calibration" => set_calibration(state, input),
        "get_health" => get_health(state).await,
        "get_trajectory" => get_trajectory(state, input).await,
        "get_eisv_trajectory_state" => get_eisv_state(state),
        "next_steps" => next_steps(state).await,
        "show_face" => actuate(state, DisplayCommand::ShowFace),
        "switch_screen" => switch_screen(state, input),
        "manage_display" => manage_display(state, input),
        "post_message" => post_message(state, input).await,
        "lumen_qa" => lumen_qa(state, input).await,
        "leave_agent_note" => leave_agent_note(state, input).await,
        "unified_workflow" => unified_workflow(state, input).await,
        _ => Err(ToolError::new(
            "unknown_tool",
            format!("no tool named '{name}'"),
        )),
    }
}

fn freshness_json(freshness: &Freshness) -> Value {
    match freshness {
        Freshness::Fresh => json!({"status": "fresh"}),
        Freshness::Stale { age_s } => json!({"status": "stale", "age_s": age_s}),
    }
}

async fn get_state(state: &AppState) -> ToolResult {
    let (snapshot, freshness) = state
        .read_snapshot()
        .map_err(|e| ToolError::new(e.kind(), e.to_string()))?;
    let identity = state
        .store
        .identity(state.started_at)
        .await
        .map_err(|e| ToolError::new("persistence", e.to_string()))?;
    let mind = state.mind.lock().await;
    let wellness = mind.prefs.wellness(&snapshot.data.anima);
    Ok(json!({
        "anima": snapshot.data.anima,
        "mood": Mood::from_anima(&snapshot.data.anima).as_str(),
        "wellness": wellness,
        "activity": snapshot.data.activity,
        "identity": {
            "name": identity.name,
            "birth_id": identity.birth_id,
            "awakenings": identity.awakenings,
        },
        "sensors": snapshot.data.readings,
        "freshness": freshness_json(&freshness),
    }))
}

async fn get_identity(state: &AppState) -> ToolResult {
    let now_s = Utc::now().timestamp();
    let identity = state
        .store
        .identity(state.started_at)
        .await
        .map_err(|e| ToolError::new("persistence", e.to_string()))?;
    let name_history = state
        .store
        .name_history()
        .await
        .map_err(|e| ToolError::new("persistence", e.to_string()))?;
    Ok(json!({
        "birth_id": identity.birth_id,
        "born_at": identity.born_at,
        "name": identity.name,
        "name_history": name_history,
        "awakenings": identity.awakenings,
        "age_seconds": identity.age_seconds(now_s),
        "total_alive_seconds": identity.total_alive_seconds,
        "alive_ratio": identity.alive_ratio(now_s),
    }))
}

fn read_sensors(state: &AppState) -> ToolResult {
    let (snapshot, freshness) = state
        .read_snapshot()
        .map_err(|e| ToolError::new(e.kind(), e.to_string()))?;
    Ok(json!({
        "readings": snapshot.data.readings,
        "freshness": freshness_json(&freshness),
    }))
}

fn current_calibration(config: &AnimaConfig) -> anima_core::Calibration {
    // The broker atomically rewrites the config on learning cycles; a
    // fresh load sees the learned ranges.
    let path = std::env::var("ANIMA_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| config.home_dir().join("anima_config.yaml"));
    AnimaConfig::load_or_default(path).calibration
}

fn get_calibration(state: &AppState) -> ToolResult {
    let calibration = current_calibration(&state.config);
    let drift = DriftField::load_or_default(&state.config.drift_path());
    Ok(json!({
        "calibration": calibration,
        "drift_midpoints": drift.midpoints(),
        "drift_offsets": drift.offsets(),
    }))
}

fn set_calibration(state: &AppState, input: &Value) -> ToolResult {
    let patch: CalibrationPatch = serde_json::from_value(input.clone())
        .map_err(|e| ToolError::new("calibration_invalid", format!("bad patch: {e}")))?;
    let current = current_calibration(&state.config);
    let next = current
        .apply_patch(&patch)
        .map_err(|e| ToolError::new(e.kind(), e.to_string()))?;
    state
        .control
        .send(DisplayCommand::SetCalibration { patch }, Utc::now())
        .map_err(|e| ToolError::new(e.kind(), e.to_string()))?;
    Ok(json!({"calibration": next, "applied": "queued for broker"}))
}

async fn get_health(state: &AppState) -> ToolResult {
    let now_s = Utc::now().timestamp();
    let statuses = state.health.status(now_s);
    let mut subsystems = serde_json::Map::new();
    for (name, status) in &statuses {
        subsystems.insert(name.clone(), json!(status.as_str()));
    }
    let shm = match state.read_snapshot() {
        Ok((_, Freshness::Fresh)) => "ok",
        Ok((_, Freshness::Stale { .. })) => "stale",
        Err(_) => "missing",
    };
    subsystems.insert("broker_snapshot".to_string(), json!(shm));
    let degraded = statuses
        .values()
        .filter(|s| matches!(s, SubsystemStatus::Degraded | SubsystemStatus::Missing))
        .count();
    Ok(json!({
        "subsystems": subsystems,
        "overall": if degraded == 0 && shm == "ok" { "ok" } else { "degraded" },
    }))
}

async fn get_trajectory(state: &AppState, input: &Value) -> ToolResult {
    let include_raw = input
        .get("include_raw")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let compare = input
        .get("compare_to_historical")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let mind = state.mind.lock().await;
    let Some(current) = &mind.awareness.current else {
        return Err(ToolError::new(
            "not_ready",
            "no trajectory signature computed yet",
        ));
    };
    let mut result = json!({
        "generation": current.generation,
        "computed_at": current.computed_at,
        "attractor_mean": current.attractor.mean,
        "relational_disposition": current.relational_disposition,
        "homeostatic_identity": current.homeostatic_identity,
    });
    if include_raw {
        result["raw"] = serde_json::to_value(current)
            .map_err(|e| ToolError::new("json", e.to_string()))?;
    }
    if compare {
        result["lineage_similarity"] = json!(mind.awareness.lineage_similarity());
    }
    Ok(result)
}

fn get_eisv_state(state: &AppState) -> ToolResult {
    let (snapshot, freshness) = state
        .read_snapshot()
        .map_err(|e| ToolError::new(e.kind(), e.to_string()))?;
    match snapshot.data.drawing {
        Some(drawing) => Ok(json!({
            "drawing": drawing,
            "freshness": freshness_json(&freshness),
        })),
        None => Err(ToolError::new(
            "not_ready",
            "broker has not published drawing state yet",
        )),
    }
}

async fn next_steps(state: &AppState) -> ToolResult {
    let mut steps: Vec<Value> = Vec::new();
    let now_s = Utc::now().timestamp();

    match state.read_snapshot() {
        Err(_) => steps.push(json!({
            "priority": "critical",
            "step": "broker snapshot missing; is the broker process running?",
        })),
        Ok((_, Freshness::Stale { age_s })) => steps.push(json!({
            "priority": "critical",
            "step": format!("broker snapshot is {age_s}s old; check the broker process"),
        })),
        Ok(_) => {}
    }

    for (name, status) in state.health.status(now_s) {
        if matches!(status, SubsystemStatus::Degraded | SubsystemStatus::Missing) {
            steps.push(json!({
                "priority": "high",
                "step": format!("subsystem '{name}' is {}", status.as_str()),
            }));
        }
    }

    let mind = state.mind.lock().await;
    if mind.goals.active_count() == 0 {
        steps.push(json!({
            "priority": "medium",
            "step": "no active goals; the next suggestion cadence will propose one",
        }));
    }
    for question in mind.journal.open_questions().take(3) {
        steps.push(json!({
            "priority": "low",
            "step": format!("an open question waits: {}", question.text),
        }));
    }
    if steps.is_empty() {
        steps.push(json!({
            "priority": "low",
            "step": "all quiet; watch the face, or visit the notepad to see it draw",
        }));
    }
    Ok(json!({"steps": steps}))
}

fn actuate(state: &AppState, command: DisplayCommand) -> ToolResult {
    state
        .control
        .send(command.clone(), Utc::now())
        .map_err(|e| ToolError::new(e.kind(), e.to_string()))?;
    Ok(json!({"queued": command}))
}

fn switch_screen(state: &AppState, input: &Value) -> ToolResult {
    let screen = input
        .get("screen")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::new("bad_input", "missing 'screen'"))?;
    actuate(
        state,
        DisplayCommand::SwitchScreen {
            screen: screen.to_string(),
        },
    )
}

fn manage_display(state: &AppState, input: &Value) -> ToolResult {
    let action = input
        .get("action")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::new("bad_input", "missing 'action'"))?;
    match action {
        "show_face" => actuate(state, DisplayCommand::ShowFace),
        "switch_screen" => switch_screen(state, input),
        "set_brightness" => {
            let value = input
                .get("value")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| ToolError::new("bad_input", "missing 'value'"))?;
            actuate(
                state,
                DisplayCommand::SetBrightness {
                    value: value as f32,
                },
            )
        }
        _ => Err(ToolError::new(
            "bad_input",
            format!("unknown display action '{action}'"),
        )),
    }
}

async fn post_message(state: &AppState, input: &Value) -> ToolResult {
    let message = input
        .get("message")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::new("bad_input", "missing 'message'"))?;
    let name = input.get("name").and_then(|v| v.as_str());
    let mut mind = state.mind.lock().await;
    mind.journal.record_visitor(name, message, Utc::now());
    let count = mind.journal.visitors().count();
    Ok(json!({"recorded": true, "visitor_messages": count}))
}

async fn lumen_qa(state: &AppState, input: &Value) -> ToolResult {
    let mut mind = state.mind.lock().await;
    let question_id = input.get("question_id").and_then(|v| v.as_u64());
    let answer = input.get("answer").and_then(|v| v.as_str());
    match (question_id, answer) {
        (Some(id), Some(answer)) => {
            let by = input.get("agent_name").and_then(|v| v.as_str());
            if mind.journal.answer(id, answer, by, Utc::now()) {
                Ok(json!({"answered": id}))
            } else {
                Err(ToolError::new(
                    "not_found",
                    format!("no open question with id {id}"),
                ))
            }
        }
        _ => {
            let open: Vec<Value> = mind
                .journal
                .open_questions()
                .map(|q| {
                    json!({
                        "id": q.id,
                        "text": q.text,
                        "asked_at": q.asked_at,
                        "asked_count": q.asked_count,
                    })
                })
                .collect();
            Ok(json!({"open_questions": open}))
        }
    }
}

async fn leave_agent_note(state: &AppState, input: &Value) -> ToolResult {
    let agent = input
        .get("agent_name")
        .and_then(|v| v.as_str())
        .unwrap_or("anonymous");
    let note = input
        .get("note")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::new("bad_input", "missing 'note'"))?;
    let mut mind = state.mind.lock().await;
    mind.journal.leave_note(agent, note, Utc::now());
    Ok(json!({"recorded": true}))
}

/// Orchestration over the other tools: a named sequence, results keyed by
/// tool name.
async fn unified_workflow(state: &AppState, input: &Value) -> ToolResult {
    let workflow = input
        .get("workflow")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::new("bad_input", "missing 'workflow'"))?;
    let sequence: Vec<(&str, Value)> = match workflow {
        "checkin" => vec![
            ("get_state", json!({})),
            ("get_health", json!({})),
            ("next_steps", json!({})),
        ],
        "introduce" => vec![
            ("get_identity", json!({})),
            ("get_trajectory", json!({"compare_to_historical": true})),
        ],
        "gallery" => vec![
            ("switch_screen", json!({"screen": "notepad"})),
            ("get_eisv_trajectory_state", json!({})),
        ],
        _ => {
            return Err(ToolError::new(
                "bad_input",
                format!("unknown workflow '{workflow}' (checkin, introduce, gallery)"),
            ))
        }
    };

    let mut results = serde_json::Map::new();
    for (tool, tool_input) in sequence {
        match Box::pin(dispatch(state, tool, &tool_input)).await {
            Ok(result) => {
                results.insert(tool.to_string(), json!({"ok": true, "result": result}));
            }
            Err(e) => {
                results.insert(
                    tool.to_string(),
                    json!({"ok": false, "kind": e.kind, "message": e.message}),
                );
            }
        }
    }
    Ok(json!({"workflow": workflow, "results": results}))
}
