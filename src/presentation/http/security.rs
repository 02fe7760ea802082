use poem::{Error as PoemError, Result as PoemResult, http::StatusCode};
use poem_openapi::SecurityScheme;
use poem_openapi::auth::Bearer;

use crate::application::{
    services::jwt::{JwtService, JwtServiceConfig},
    usecases::authenticate_admin::ADMIN_SUBJECT,
};

#[derive(SecurityScheme)]
#[oai(ty = "bearer", bearer_format = "JWT")]
pub struct JwtAuth(pub Bearer);

pub struct AuthenticatedAdmin {
    pub subject: String,
}

impl JwtAuth {
    pub fn into_admin(self, config: &JwtServiceConfig) -> PoemResult<AuthenticatedAdmin> {
        let service = JwtService::new(config.clone());
        match service.verify(&self.0.token) {
            Ok(claims) if claims.sub == ADMIN_SUBJECT => Ok(AuthenticatedAdmin {
                subject: claims.sub,
            }),
            Ok(_) => Err(PoemError::from_string(
                "token is not allowed to manage broadcasts",
                StatusCode::FORBIDDEN,
            )),
            Err(_) => Err(PoemError::from_string(
                "invalid or expired token",
                StatusCode::UNAUTHORIZED,
            )),
        }
    }
}
