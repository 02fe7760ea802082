use std::sync::Arc;

use poem_openapi::{OpenApi, param::Path, payload::Json};
use tracing::info;
use uuid::Uuid;

use crate::{
    application::usecases::start_broadcast::StartBroadcastRequest,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::{build_payload, map_domain_error, map_status},
        requests::StartBroadcastRequestDto,
        responses::{BroadcastStatusDto, StartBroadcastResponseDto},
        security::JwtAuth,
    },
};

#[derive(Clone)]
pub struct BroadcastsEndpoints {
    state: Arc<ApiState>,
}

impl BroadcastsEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl BroadcastsEndpoints {
    /// Starts a broadcast in the background and returns its session id.
    #[oai(path = "/broadcasts", method = "post", tag = EndpointsTags::Broadcasts)]
    pub async fn start_broadcast(
        &self,
        auth: JwtAuth,
        request: Json<StartBroadcastRequestDto>,
    ) -> poem::Result<Json<StartBroadcastResponseDto>> {
        let admin = auth.into_admin(&self.state.jwt_config)?;
        let payload = build_payload(&request).map_err(map_domain_error)?;
        let request = request.0;

        let response = self
            .state
            .start_broadcast_usecase
            .execute(StartBroadcastRequest {
                channel_id: request.channel_id,
                payload,
                worker_count: request.worker_count.map(|n| n as usize),
                staging_chat: request.staging_chat_id,
            })
            .await
            .map_err(map_domain_error)?;

        info!(session = %response.session_id, requested_by = %admin.subject, "broadcast accepted");
        Ok(Json(StartBroadcastResponseDto {
            session_id: response.session_id,
            recipients: response.recipients as u32,
        }))
    }

    #[oai(
        path = "/broadcasts/:session_id",
        method = "get",
        tag = EndpointsTags::Broadcasts
    )]
    pub async fn get_broadcast(
        &self,
        auth: JwtAuth,
        session_id: Path<Uuid>,
    ) -> poem::Result<Json<BroadcastStatusDto>> {
        auth.into_admin(&self.state.jwt_config)?;

        let status = self
            .state
            .get_broadcast_usecase
            .execute(session_id.0)
            .await
            .map_err(map_domain_error)?;

        Ok(Json(map_status(&status)))
    }

    #[oai(
        path = "/broadcasts/:session_id/actions/cancel",
        method = "post",
        tag = EndpointsTags::Broadcasts
    )]
    pub async fn cancel_broadcast(&self, auth: JwtAuth, session_id: Path<Uuid>) -> poem::Result<()> {
        auth.into_admin(&self.state.jwt_config)?;

        self.state
            .cancel_broadcast_usecase
            .execute(session_id.0)
            .await
            .map_err(map_domain_error)?;

        Ok(())
    }
}
