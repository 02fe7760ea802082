use std::sync::Arc;

use poem_openapi::{OpenApi, param::Path, payload::Json};

use crate::{
    application::usecases::register_channel::RegisterChannelRequest,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::{map_channel, map_channel_stats, map_domain_error},
        requests::{AddRecipientsRequestDto, RegisterChannelRequestDto},
        responses::{AddRecipientsResponseDto, ChannelDto, ChannelStatsDto},
        security::JwtAuth,
    },
};

#[derive(Clone)]
pub struct ChannelsEndpoints {
    state: Arc<ApiState>,
}

impl ChannelsEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl ChannelsEndpoints {
    #[oai(path = "/channels", method = "post", tag = EndpointsTags::Channels)]
    pub async fn register_channel(
        &self,
        auth: JwtAuth,
        request: Json<RegisterChannelRequestDto>,
    ) -> poem::Result<Json<ChannelDto>> {
        auth.into_admin(&self.state.jwt_config)?;
        let request = request.0;

        let channel = self
            .state
            .register_channel_usecase
            .execute(RegisterChannelRequest {
                channel_id: request.channel_id,
                token: request.token,
                display_name: request.display_name,
            })
            .await
            .map_err(map_domain_error)?;

        Ok(Json(map_channel(&channel)))
    }

    #[oai(
        path = "/channels/:channel_id/recipients",
        method = "post",
        tag = EndpointsTags::Channels
    )]
    pub async fn add_recipients(
        &self,
        auth: JwtAuth,
        channel_id: Path<String>,
        request: Json<AddRecipientsRequestDto>,
    ) -> poem::Result<Json<AddRecipientsResponseDto>> {
        auth.into_admin(&self.state.jwt_config)?;

        let added = self
            .state
            .register_channel_usecase
            .add_recipients(&channel_id.0, &request.recipients)
            .await
            .map_err(map_domain_error)?;

        Ok(Json(AddRecipientsResponseDto {
            added: added as u32,
        }))
    }

    #[oai(
        path = "/channels/:channel_id/stats",
        method = "get",
        tag = EndpointsTags::Channels
    )]
    pub async fn channel_stats(
        &self,
        auth: JwtAuth,
        channel_id: Path<String>,
    ) -> poem::Result<Json<ChannelStatsDto>> {
        auth.into_admin(&self.state.jwt_config)?;

        let stats = self
            .state
            .channel_stats_usecase
            .execute(&channel_id.0)
            .await
            .map_err(map_domain_error)?;

        Ok(Json(map_channel_stats(&channel_id.0, stats)))
    }
}
