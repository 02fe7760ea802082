use std::sync::Arc;

use poem_openapi::{OpenApi, payload::Json};

use crate::{
    application::usecases::authenticate_admin::AuthRequest,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::map_domain_error,
        requests::AuthRequestDto,
        responses::AuthResponseDto,
    },
};

#[derive(Clone)]
pub struct AuthEndpoints {
    state: Arc<ApiState>,
}

impl AuthEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl AuthEndpoints {
    /// Exchanges the admin API key for a bearer token.
    #[oai(path = "/auth/token", method = "post", tag = EndpointsTags::Auth)]
    pub async fn issue_token(
        &self,
        request: Json<AuthRequestDto>,
    ) -> poem::Result<Json<AuthResponseDto>> {
        let response = self
            .state
            .auth_usecase
            .execute(AuthRequest {
                api_key: request.0.api_key,
            })
            .map_err(map_domain_error)?;

        Ok(Json(AuthResponseDto {
            access_token: response.access_token,
            expires_in: response.expires_in,
        }))
    }
}
