use crate::AppState;
use crate::error::AppError;
use crate::helpers::now;
use crate::outbound::strip_whatsapp_prefix;
use crate::validation;

use axum::{Json, extract::Form, extract::State, http::StatusCode, response::IntoResponse};
use axum_macros::debug_handler;
use gamewatch_db::{Channel, DeliveryError, Ping};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

/// Update ping payload, field names as the lobby server sends them.
#[derive(Deserialize)]
pub(crate) struct UpdateRequest {
    game: String,
    appkey: i64,
    server: String,
    region: String,
    serverurl: String,
    status: String,
    maxplayers: u32,
    curplayers: u32,
}

#[derive(Deserialize)]
pub(crate) struct DeletionRequest {
    serverurl: String,
}

/// Inbound Twilio message, form-encoded with Twilio's capitalized keys.
#[derive(Deserialize)]
pub(crate) struct InboundMessage {
    #[serde(rename = "Body", default)]
    _body: Option<String>,
    #[serde(rename = "From")]
    from: String,
}

#[debug_handler]
pub(crate) async fn submit_update(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Reject malformed pings before any state mutation
    validation::validate_game_name(&payload.game)?;
    validation::validate_server_url(&payload.serverurl)?;
    validation::validate_player_counts(payload.curplayers, payload.maxplayers)?;

    let ping = Ping {
        game: payload.game,
        appkey: payload.appkey,
        server: payload.server,
        region: payload.region,
        server_url: payload.serverurl,
        status: payload.status,
        max_players: payload.maxplayers,
        cur_players: payload.curplayers,
    };

    let alert = state.db.apply_update(ping, now()).await?;

    // The alert decision is final once the transaction commits; dispatch is
    // detached from the request so an aborted caller cannot drop it.
    if let Some(alert) = alert {
        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(&alert).await;
        });
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Game event processed successfully" })),
    ))
}

#[debug_handler]
pub(crate) async fn submit_deletion(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DeletionRequest>,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_server_url(&payload.serverurl)?;

    let server_url = payload.serverurl;
    let alert = state.db.apply_deletion(server_url.clone(), now()).await?;

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher.dispatch(&alert).await;
    });

    Ok((
        StatusCode::OK,
        Json(json!({ "message": format!("delete event recorded for {server_url}") })),
    ))
}

/// Inbound SMS/WhatsApp reply: answer with the current event-log size on the
/// channel the message arrived on. Reply delivery is best-effort and never
/// affects the response status.
#[debug_handler]
pub(crate) async fn inbound_message(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<InboundMessage>,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_sender(&payload.from)?;

    let count = state.db.event_count().await?;
    let text = format!("There are currently {count} rows in the event database.");

    let (phone, channel) = if payload.from.starts_with("whatsapp:") {
        (strip_whatsapp_prefix(&payload.from), Channel::Whatsapp)
    } else {
        (payload.from.as_str(), Channel::Sms)
    };

    info!(%channel, "replying to inbound message");
    state.dispatcher.reply(phone, channel, &text).await;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "handled incoming message" })),
    ))
}

/// Delivery-error callback from the messaging provider.
#[debug_handler]
pub(crate) async fn delivery_error(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let error = DeliveryError {
        resource_sid: string_field(&payload, "/resource_sid"),
        service_sid: string_field(&payload, "/service_sid"),
        error_code: string_field(&payload, "/error_code"),
        error_message: string_field(&payload, "/more_info/Msg"),
        callback_url: string_field(&payload, "/webhook/request/url"),
        request_method: string_field(&payload, "/webhook/request/method"),
        payload: Some(payload.to_string()),
    };

    state.db.record_delivery_error(error, now()).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Error data stored successfully" })),
    ))
}

/// Pull a string out of the callback payload; Twilio sends some codes as
/// numbers, so those are stringified.
fn string_field(payload: &Value, pointer: &str) -> Option<String> {
    match payload.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
