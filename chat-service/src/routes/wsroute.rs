use crate::auth;
use crate::error::AppError;
use crate::models::ChatMessageResponse;
use crate::rooms;
use crate::services::MessageStore;
use crate::state::AppState;
use crate::websocket::{ConnectionId, ConnectionRegistry};
use actix::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Handler, Message as ActixMessage,
    StreamHandler, WrapFuture,
};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

// Broadcast frame forwarded from the registry channel to the session.
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct BroadcastMessage(String);

/// Session that accepts the upgrade only to close it with a policy
/// violation. Failed handshakes never reach the registry.
struct WsPolicyReject;

impl Actor for WsPolicyReject {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: None,
        }));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsPolicyReject {
    fn handle(&mut self, _msg: Result<ws::Message, ws::ProtocolError>, _ctx: &mut Self::Context) {}
}

/// One authenticated chat connection.
///
/// `user_id` comes from the validated token and is the only trusted sender
/// identity for the lifetime of the connection; the path parameter only
/// selected `peer_id`.
struct WsSession {
    user_id: String,
    peer_id: String,
    room_id: String,
    connection_id: ConnectionId,
    registry: ConnectionRegistry,
    store: Arc<dyn MessageStore>,
    rx: Option<UnboundedReceiver<String>>,
    hb: Instant,
}

impl WsSession {
    #[allow(clippy::too_many_arguments)]
    fn new(
        user_id: String,
        peer_id: String,
        room_id: String,
        connection_id: ConnectionId,
        registry: ConnectionRegistry,
        store: Arc<dyn MessageStore>,
        rx: UnboundedReceiver<String>,
    ) -> Self {
        Self {
            user_id,
            peer_id,
            room_id,
            connection_id,
            registry,
            store,
            rx: Some(rx),
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!("websocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            user_id = %self.user_id,
            room_id = %self.room_id,
            "websocket session started"
        );

        self.hb(ctx);

        // Bridge the registry channel into the actor mailbox. The forwarder
        // ends when deregistration drops the channel sender.
        if let Some(mut rx) = self.rx.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(payload) = rx.recv().await {
                    if addr.try_send(BroadcastMessage(payload)).is_err() {
                        break;
                    }
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            user_id = %self.user_id,
            room_id = %self.room_id,
            "websocket session closed"
        );

        // Deregistration is idempotent, so teardown is safe no matter how
        // the session ended.
        let registry = self.registry.clone();
        let room_id = self.room_id.clone();
        let connection_id = self.connection_id;
        actix::spawn(async move {
            registry.deregister(&room_id, connection_id).await;
        });
    }
}

impl Handler<BroadcastMessage> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: BroadcastMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                let store = self.store.clone();
                let registry = self.registry.clone();
                let sender_id = self.user_id.clone();
                let receiver_id = self.peer_id.clone();
                let room_id = self.room_id.clone();

                let fut = async move {
                    // Broadcast only after successful persistence; the
                    // payload carries the store's canonical fields.
                    let message = store.persist(&sender_id, &receiver_id, &text).await?;
                    let payload = serde_json::to_string(&ChatMessageResponse::from(message))
                        .map_err(|_| AppError::Internal)?;
                    registry.broadcast(&room_id, &payload).await;
                    Ok::<_, AppError>(())
                }
                .into_actor(self)
                .map(|result, act, ctx| {
                    if let Err(e) = result {
                        tracing::error!(
                            error = %e,
                            room_id = %act.room_id,
                            "failed to persist inbound frame, dropping it"
                        );
                        ctx.text(r#"{"error":"message_not_persisted"}"#);
                    }
                });

                // ctx.wait suspends frame processing until persist and
                // broadcast complete, keeping this connection's frames in
                // strict receipt order.
                ctx.wait(fut);
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("binary websocket frames are not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::debug!(error = %e, "websocket transport error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// Chat WebSocket endpoint.
///
/// Credential lookup order: cookie `access_token`, then query parameter
/// `token`. Missing or invalid credentials close the socket with a policy
/// violation before it ever reaches the registry.
#[get("/chat/ws/{peer_id}")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<WsQuery>,
) -> Result<HttpResponse, Error> {
    let peer_id = path.into_inner();

    let token = req
        .cookie("access_token")
        .map(|c| c.value().to_string())
        .or_else(|| query.into_inner().token);

    let Some(token) = token else {
        tracing::warn!("websocket rejected: no credential provided");
        return ws::start(WsPolicyReject, &req, stream);
    };

    let claims =
        match auth::authenticate(&state.validator, state.config.auth_timeout, &token).await {
            Ok(claims) => claims,
            Err(_) => {
                tracing::warn!("websocket rejected: invalid or expired credential");
                return ws::start(WsPolicyReject, &req, stream);
            }
        };

    let user_id = claims.sub;
    let room_id = rooms::room_id(&user_id, &peer_id);
    let connection_id = ConnectionId::new();

    let Some(rx) = state.registry.register(&room_id, connection_id).await else {
        return Err(AppError::Internal.into());
    };

    let session = WsSession::new(
        user_id,
        peer_id,
        room_id.clone(),
        connection_id,
        state.registry.clone(),
        state.store.clone(),
        rx,
    );

    let resp = ws::start(session, &req, stream);

    if resp.is_err() {
        // The actor never started, so its teardown will not run.
        let registry = state.registry.clone();
        actix::spawn(async move {
            registry.deregister(&room_id, connection_id).await;
        });
    }

    resp
}
