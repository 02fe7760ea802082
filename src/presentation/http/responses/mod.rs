use poem_openapi::Object;
use uuid::Uuid;

use crate::presentation::models::PhaseKind;

#[derive(Object)]
pub struct AuthResponseDto {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Object)]
pub struct ChannelDto {
    pub channel_id: String,
    pub display_name: Option<String>,
}

#[derive(Object)]
pub struct AddRecipientsResponseDto {
    pub added: u32,
}

#[derive(Object)]
pub struct ChannelStatsDto {
    pub channel_id: String,
    pub total: u64,
    pub active: u64,
    pub blocked: u64,
}

#[derive(Object)]
pub struct StartBroadcastResponseDto {
    pub session_id: Uuid,
    pub recipients: u32,
}

#[derive(Object)]
pub struct BroadcastStatusDto {
    pub session_id: Uuid,
    pub channel_id: String,
    pub phase: PhaseKind,
    pub total: u32,
    pub processed: u32,
    pub sent: u32,
    pub failed: u32,
    pub blocked: u32,
    pub current_speed: f64,
    pub cancelled: bool,
    pub error: Option<String>,
    pub report: Option<BroadcastReportDto>,
}

#[derive(Object)]
pub struct BroadcastReportDto {
    pub channel_name: String,
    pub total: u32,
    pub success: u32,
    pub failed: u32,
    pub blocked: u32,
    pub delivery_rate: f64,
    pub wall_clock_seconds: f64,
    pub avg_latency_seconds: f64,
    pub throughput_per_second: f64,
    pub worker_count: u32,
    pub rate_limit_hits: u64,
    pub cancelled: bool,
    pub started_at: String,
    pub finished_at: String,
}
