// src/services/training.rs
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

pub const PHASES: [&str; 5] = [
    "Data Processing",
    "Context Analysis",
    "Model Training",
    "Fine-tuning",
    "Validation",
];

const ACTIVE_PHASE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseState {
    Completed,
    InProgress,
    Pending,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseProgress {
    pub phase: &'static str,
    pub status: PhaseState,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSnapshot {
    pub chatbot_id: Uuid,
    /// Phase label sent by the client, or the active phase when absent
    pub phase: String,
    pub progress: f64,
    pub phases: Vec<PhaseProgress>,
    pub documents_processed: i64,
    pub total_documents: i64,
    pub time_remaining: i64,
    pub current_accuracy: f64,
    pub training_speed: u32,
}

/// Computes the reported training state for a given progress percentage.
/// Progress outside 0..=100 is clamped.
pub fn snapshot(
    chatbot_id: Uuid,
    phase: Option<&str>,
    progress: f64,
    total_documents: i64,
    training_speed: u32,
) -> TrainingSnapshot {
    let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 100.0) };

    let phases = PHASES
        .iter()
        .enumerate()
        .map(|(i, &phase)| {
            let (status, value) = match i {
                i if i < ACTIVE_PHASE => (PhaseState::Completed, 100.0),
                ACTIVE_PHASE => (PhaseState::InProgress, progress),
                _ => (PhaseState::Pending, 0.0),
            };
            PhaseProgress {
                phase,
                status,
                progress: value,
            }
        })
        .collect();

    TrainingSnapshot {
        chatbot_id,
        phase: phase
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(PHASES[ACTIVE_PHASE])
            .to_string(),
        progress,
        phases,
        documents_processed: (total_documents as f64 * progress / 100.0).floor() as i64,
        total_documents,
        time_remaining: ((100.0 - progress) / 5.0).floor().max(0.0) as i64,
        current_accuracy: (80.0 + progress / 5.0).min(92.0),
        training_speed,
    }
}

/// Simulated throughput in tokens per second.
pub fn random_training_speed() -> u32 {
    rand::thread_rng().gen_range(2300..2500)
}

pub fn job_id(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("train_{}", now.timestamp_millis())
}
