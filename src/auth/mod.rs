use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{self, Identity};
use crate::error::TrackingError;

/// Claims minted by the marketplace auth service. Only the subject and the
/// expiry matter to this service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TrackingError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| TrackingError::Authentication(err.to_string()))
    }
}

/// Resolves the handshake credential to a live identity. Runs once per
/// connection attempt; the result stays attached to the connection until it
/// drops.
pub async fn authenticate(
    db_pool: &SqlitePool,
    verifier: &TokenVerifier,
    token: Option<&str>,
) -> Result<Identity, TrackingError> {
    let token = token.ok_or_else(|| TrackingError::Authentication("missing token".to_owned()))?;
    let claims = verifier.verify(token)?;

    db::fetch_identity(db_pool, claims.sub)
        .await?
        .ok_or_else(|| TrackingError::Authentication("unknown or inactive user".to_owned()))
}
