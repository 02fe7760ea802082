use base64::{Engine, engine::general_purpose::STANDARD};
use poem::http::StatusCode;
use tracing::error;

use crate::{
    application::dispatch::SessionStatus,
    domain::{
        errors::DomainError,
        models::{
            ChannelCredential, DispatchReport, ImageMessage, Payload, RecipientStats, TextMessage,
        },
    },
    presentation::http::{
        requests::StartBroadcastRequestDto,
        responses::{BroadcastReportDto, BroadcastStatusDto, ChannelDto, ChannelStatsDto},
    },
};

pub fn map_channel(credential: &ChannelCredential) -> ChannelDto {
    ChannelDto {
        channel_id: credential.channel_id.clone(),
        display_name: credential.display_name.clone(),
    }
}

pub fn map_channel_stats(channel_id: &str, stats: RecipientStats) -> ChannelStatsDto {
    ChannelStatsDto {
        channel_id: channel_id.to_string(),
        total: stats.total,
        active: stats.active,
        blocked: stats.blocked,
    }
}

pub fn map_status(status: &SessionStatus) -> BroadcastStatusDto {
    BroadcastStatusDto {
        session_id: status.id,
        channel_id: status.channel_id.clone(),
        phase: status.phase.into(),
        total: status.total as u32,
        processed: status.snapshot.processed() as u32,
        sent: status.snapshot.sent as u32,
        failed: status.snapshot.failed as u32,
        blocked: status.snapshot.blocked as u32,
        current_speed: status.snapshot.current_speed,
        cancelled: status.cancelled,
        error: status.error.clone(),
        report: status.report.as_deref().map(map_report),
    }
}

pub fn map_report(report: &DispatchReport) -> BroadcastReportDto {
    BroadcastReportDto {
        channel_name: report.channel_name.clone(),
        total: report.total as u32,
        success: report.success as u32,
        failed: report.failed as u32,
        blocked: report.blocked as u32,
        delivery_rate: report.delivery_rate(),
        wall_clock_seconds: report.wall_clock_seconds,
        avg_latency_seconds: report.avg_latency_seconds,
        throughput_per_second: report.throughput_per_second,
        worker_count: report.worker_count as u32,
        rate_limit_hits: report.rate_limit_hits,
        cancelled: report.cancelled,
        started_at: report.started_at.to_rfc3339(),
        finished_at: report.finished_at.to_rfc3339(),
    }
}

/// Builds the broadcast payload. Exactly one of text or image is accepted.
pub fn build_payload(request: &StartBroadcastRequestDto) -> Result<Payload, DomainError> {
    let text = request.text.as_deref().filter(|t| !t.trim().is_empty());
    match (text, request.image_base64.as_deref()) {
        (Some(text), None) => {
            let mut message = TextMessage::new(text);
            message.parse_mode = request.parse_mode.into();
            Ok(Payload::Text(message))
        }
        (None, Some(encoded)) => {
            let bytes = STANDARD
                .decode(encoded.trim())
                .map_err(|err| DomainError::Validation(format!("image_base64: {err}")))?;
            if bytes.is_empty() {
                return Err(DomainError::Validation("image_base64 is empty".to_string()));
            }
            let mut image = ImageMessage::new(bytes, request.caption.clone());
            image.parse_mode = request.parse_mode.into();
            Ok(Payload::Image(image))
        }
        (Some(_), Some(_)) => Err(DomainError::Validation(
            "text and image_base64 are mutually exclusive".to_string(),
        )),
        (None, None) => Err(DomainError::Validation(
            "either text or image_base64 is required".to_string(),
        )),
    }
}

pub fn map_domain_error(err: DomainError) -> poem::Error {
    let status = match &err {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Other(inner) => {
            error!(error = %inner, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    poem::Error::from_string(err.to_string(), status)
}

#[cfg(test)]
mod tests {
    use super::build_payload;
    use crate::{
        domain::{
            errors::DomainError,
            models::{ParseMode, Payload},
        },
        presentation::{http::requests::StartBroadcastRequestDto, models::ParseModeKind},
    };

    fn request(text: Option<&str>, image: Option<&str>) -> StartBroadcastRequestDto {
        StartBroadcastRequestDto {
            channel_id: "main".to_string(),
            text: text.map(str::to_string),
            image_base64: image.map(str::to_string),
            caption: Some("cap".to_string()),
            parse_mode: ParseModeKind::MarkdownV2,
            worker_count: None,
            staging_chat_id: None,
        }
    }

    #[test]
    fn text_payload_keeps_parse_mode() {
        match build_payload(&request(Some("hi"), None)).unwrap() {
            Payload::Text(message) => {
                assert_eq!(message.text, "hi");
                assert_eq!(message.parse_mode, ParseMode::MarkdownV2);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn image_payload_is_decoded() {
        match build_payload(&request(None, Some("AQID"))).unwrap() {
            Payload::Image(image) => {
                assert_eq!(&image.bytes[..], &[1, 2, 3]);
                assert_eq!(image.caption.as_deref(), Some("cap"));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn ambiguous_or_missing_content_is_rejected() {
        assert!(matches!(
            build_payload(&request(Some("hi"), Some("AQID"))),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            build_payload(&request(Some("  "), None)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            build_payload(&request(None, Some("not base64!"))),
            Err(DomainError::Validation(_))
        ));
    }
}
