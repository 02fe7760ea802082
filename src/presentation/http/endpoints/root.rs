use std::sync::Arc;

use poem_openapi::Tags;

use super::{
    auth::AuthEndpoints, broadcasts::BroadcastsEndpoints, channels::ChannelsEndpoints,
    health::HealthEndpoints,
};
use crate::application::{
    services::jwt::JwtServiceConfig,
    usecases::{
        authenticate_admin::AuthenticateAdminUseCase, cancel_broadcast::CancelBroadcastUseCase,
        get_broadcast::GetBroadcastUseCase, get_channel_stats::GetChannelStatsUseCase,
        register_channel::RegisterChannelUseCase, start_broadcast::StartBroadcastUseCase,
    },
};

#[derive(Clone)]
pub struct ApiState {
    pub auth_usecase: Arc<AuthenticateAdminUseCase>,
    pub register_channel_usecase: Arc<RegisterChannelUseCase>,
    pub channel_stats_usecase: Arc<GetChannelStatsUseCase>,
    pub start_broadcast_usecase: Arc<StartBroadcastUseCase>,
    pub cancel_broadcast_usecase: Arc<CancelBroadcastUseCase>,
    pub get_broadcast_usecase: Arc<GetBroadcastUseCase>,
    pub jwt_config: JwtServiceConfig,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Auth,
    Channels,
    Broadcasts,
}

pub type Endpoints = (
    HealthEndpoints,
    AuthEndpoints,
    ChannelsEndpoints,
    BroadcastsEndpoints,
);

pub fn endpoints(state: Arc<ApiState>) -> Endpoints {
    (
        HealthEndpoints,
        AuthEndpoints::new(state.clone()),
        ChannelsEndpoints::new(state.clone()),
        BroadcastsEndpoints::new(state),
    )
}
