//! The interactions endpoint: ed25519 request verification, payload
//! decoding, and dispatch to the command handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::discord::commands::CommandHandler;
use crate::discord::types::{interaction_type, Interaction, InteractionResponse};
use crate::error::{DocdexError, Result};

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Verifies interaction signatures against the application public key.
///
/// Discord signs `timestamp || body` and sends the signature and the
/// timestamp as headers; anything that does not verify must be answered
/// with 401 or Discord disables the endpoint.
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub fn from_hex(public_key: &str) -> Result<Self> {
        let raw = hex::decode(public_key.trim())
            .map_err(|e| DocdexError::Config(format!("Discord public key is not hex: {e}")))?;
        let raw: [u8; 32] = raw
            .try_into()
            .map_err(|_| DocdexError::Config("Discord public key must be 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&raw)
            .map_err(|e| DocdexError::Config(format!("Discord public key is invalid: {e}")))?;
        Ok(Self { key })
    }

    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> bool {
        let Ok(raw) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&raw) else {
            return false;
        };
        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        self.key.verify(&message, &signature).is_ok()
    }
}

/// Shared state behind the interactions route.
pub struct AppState {
    pub verifier: SignatureVerifier,
    pub commands: CommandHandler,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/interactions", post(handle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let timestamp = headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok());
    let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !state.verifier.verify(timestamp, &body, signature) {
        debug!("rejecting an interaction with a bad signature");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(err) => {
            warn!(error = %err, "undecodable interaction payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    Json(dispatch(&state, &interaction).await).into_response()
}

async fn dispatch(state: &AppState, interaction: &Interaction) -> InteractionResponse {
    match interaction.kind {
        interaction_type::PING => InteractionResponse::pong(),
        interaction_type::APPLICATION_COMMAND => state.commands.run_command(interaction).await,
        interaction_type::AUTOCOMPLETE => state.commands.run_autocomplete(interaction),
        interaction_type::MESSAGE_COMPONENT => state.commands.run_component(interaction).await,
        other => {
            debug!(kind = other, "ignoring an unsupported interaction type");
            InteractionResponse::ephemeral("Unsupported interaction.")
        }
    }
}
