use crate::{
    application::services::jwt::{JwtService, JwtServiceConfig},
    domain::errors::DomainError,
};

pub const ADMIN_SUBJECT: &str = "admin";

pub struct AuthenticateAdminUseCase {
    admin_api_key: String,
    jwt: JwtService,
}

pub struct AuthRequest {
    pub api_key: String,
}

pub struct AuthResponse {
    pub access_token: String,
    pub expires_in: u64,
}

impl AuthenticateAdminUseCase {
    pub fn new(admin_api_key: String, jwt_config: JwtServiceConfig) -> Self {
        let jwt = JwtService::new(jwt_config);
        Self { admin_api_key, jwt }
    }

    pub fn execute(&self, request: AuthRequest) -> Result<AuthResponse, DomainError> {
        if self.admin_api_key.is_empty() || request.api_key != self.admin_api_key {
            return Err(DomainError::Forbidden("invalid api key".to_string()));
        }

        let access_token = self.jwt.issue(ADMIN_SUBJECT)?;
        Ok(AuthResponse {
            access_token,
            expires_in: self.jwt.expiration().as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{AuthRequest, AuthenticateAdminUseCase};
    use crate::{
        application::services::jwt::{JwtService, JwtServiceConfig},
        domain::errors::DomainError,
    };

    fn config() -> JwtServiceConfig {
        JwtServiceConfig {
            secret: "secret".to_string(),
            expiration: Duration::from_secs(3600),
        }
    }

    #[test]
    fn matching_key_yields_admin_token() {
        let usecase = AuthenticateAdminUseCase::new("key".to_string(), config());
        let response = usecase
            .execute(AuthRequest {
                api_key: "key".to_string(),
            })
            .unwrap();

        assert_eq!(response.expires_in, 3600);
        let claims = JwtService::new(config())
            .verify(&response.access_token)
            .unwrap();
        assert_eq!(claims.sub, "admin");
    }

    #[test]
    fn wrong_key_is_forbidden() {
        let usecase = AuthenticateAdminUseCase::new("key".to_string(), config());
        let result = usecase.execute(AuthRequest {
            api_key: "nope".to_string(),
        });
        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }
}
