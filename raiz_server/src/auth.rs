//! Bearer token issuing and checking.
//!
//! Tokens are HS256 JWTs. The subject is the user id. Access and refresh tokens are signed with the same secret and
//! told apart by the `token_type` claim, so a refresh token can never be used to call the API, and vice versa.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    data_objects::TokenResponse,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id, as a string.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
}

impl JwtClaims {
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse::<i64>().map_err(|_| AuthError::InvalidToken(format!("'{}' is not a user id", self.sub)))
    }
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
        }
    }

    /// Issue a new token for the given user.
    /// This method DOES NOT check the user's credentials. This must be done prior to calling `issue_token`.
    pub fn issue_token(&self, user_id: i64, token_type: TokenType) -> Result<String, AuthError> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_token_ttl,
            TokenType::Refresh => self.refresh_token_ttl,
        };
        let claims =
            JwtClaims { sub: user_id.to_string(), exp: (now + ttl).timestamp(), iat: now.timestamp(), token_type };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(format!("Could not sign token. {e}")))
    }

    pub fn issue_token_pair(&self, user_id: i64) -> Result<TokenResponse, AuthError> {
        let access_token = self.issue_token(user_id, TokenType::Access)?;
        let refresh_token = self.issue_token(user_id, TokenType::Refresh)?;
        trace!("🔐️ Issued token pair for user #{user_id}");
        Ok(TokenResponse::bearer(access_token, refresh_token))
    }

    /// Checks the signature and expiry of the token, and that it is of the expected type.
    pub fn validate(&self, token: &str, expected: TokenType) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if data.claims.token_type != expected {
            return Err(AuthError::WrongTokenType(expected.as_str().to_string()));
        }
        Ok(data.claims)
    }
}

/// The caller of an endpoint, as identified by the bearer access token in the `Authorization` header.
///
/// Add this as a handler argument to require authentication. The handler is not called if the token is missing or
/// invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

impl FromRequest for AuthenticatedUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate_request(req))
    }
}

fn authenticate_request(req: &HttpRequest) -> Result<AuthenticatedUser, ServerError> {
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| ServerError::ConfigurationError("No token issuer has been configured".into()))?;
    let header = req.headers().get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    let token = bearer_token(value).ok_or(AuthError::MissingToken)?;
    let claims = issuer.validate(token, TokenType::Access).map_err(|e| {
        debug!("🔐️ Access token rejected. {e}");
        e
    })?;
    let user_id = claims.user_id()?;
    trace!("🔐️ Request authenticated for user #{user_id}");
    Ok(AuthenticatedUser { user_id })
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
