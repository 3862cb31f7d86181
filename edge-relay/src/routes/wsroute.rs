use crate::error::AppError;
use crate::state::RelayState;
use actix::{
    Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler,
};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as UpstreamMessage, MaybeTlsStream, WebSocketStream,
};

/// Close code sent when the downstream connection carries no credential.
/// Distinct from the origin's 1008 so edge rejections are identifiable.
const CLOSE_CODE_NO_CREDENTIAL: u16 = 4003;

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type UpstreamSink = SplitSink<Upstream, UpstreamMessage>;
type UpstreamStream = SplitStream<Upstream>;

// Frame read from the upstream connection, forwarded to the downstream
// session.
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct UpstreamFrame(UpstreamMessage);

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct UpstreamClosed;

/// Session that accepts the upgrade only to close it again: the downstream
/// connection presented no credential.
struct WsCredentialReject;

impl Actor for WsCredentialReject {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Other(CLOSE_CODE_NO_CREDENTIAL),
            description: None,
        }));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsCredentialReject {
    fn handle(&mut self, _msg: Result<ws::Message, ws::ProtocolError>, _ctx: &mut Self::Context) {}
}

/// One relayed session: the actor owns the downstream side, a writer task
/// owns the upstream sink and a reader task owns the upstream stream.
///
/// Frames are forwarded opaquely in both directions. Whichever direction
/// terminates first stops the actor, and the actor's teardown cancels the
/// other: the reader is aborted and dropping the writer channel closes the
/// upstream sink. No half-open socket survives the session.
struct RelaySession {
    sink: Option<UpstreamSink>,
    stream: Option<UpstreamStream>,
    up_tx: Option<UnboundedSender<UpstreamMessage>>,
    reader: Option<JoinHandle<()>>,
}

impl RelaySession {
    fn new(sink: UpstreamSink, stream: UpstreamStream) -> Self {
        Self {
            sink: Some(sink),
            stream: Some(stream),
            up_tx: None,
            reader: None,
        }
    }

    fn forward_upstream(&self, frame: UpstreamMessage) {
        if let Some(tx) = &self.up_tx {
            let _ = tx.send(frame);
        }
    }
}

impl Actor for RelaySession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("relay session started");

        // Writer: drains the forwarding channel into the upstream sink.
        // Ends when the channel sender is dropped at teardown.
        let (tx, mut rx) = unbounded_channel();
        self.up_tx = Some(tx);
        if let Some(mut sink) = self.sink.take() {
            actix::spawn(async move {
                while let Some(frame) = rx.recv().await {
                    if sink.send(frame).await.is_err() {
                        break;
                    }
                }
                let _ = sink.close().await;
            });
        }

        // Reader: pulls upstream frames into the actor mailbox.
        if let Some(mut stream) = self.stream.take() {
            let addr = ctx.address();
            let handle = actix::spawn(async move {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(frame) => {
                            if addr.try_send(UpstreamFrame(frame)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "upstream transport error");
                            break;
                        }
                    }
                }
                let _ = addr.try_send(UpstreamClosed);
            });
            self.reader = Some(handle);
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("relay session closed");

        // Cancel both forwarding directions.
        self.up_tx.take();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl Handler<UpstreamFrame> for RelaySession {
    type Result = ();

    fn handle(&mut self, msg: UpstreamFrame, ctx: &mut Self::Context) {
        match msg.0 {
            UpstreamMessage::Text(text) => ctx.text(text.as_str()),
            UpstreamMessage::Binary(data) => ctx.binary(data),
            UpstreamMessage::Close(_) => {
                ctx.close(None);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<UpstreamClosed> for RelaySession {
    type Result = ();

    fn handle(&mut self, _msg: UpstreamClosed, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelaySession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.forward_upstream(UpstreamMessage::Text(text.to_string().into()));
            }
            Ok(ws::Message::Binary(data)) => {
                self.forward_upstream(UpstreamMessage::Binary(data));
            }
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                self.forward_upstream(UpstreamMessage::Close(None));
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::debug!(error = %e, "downstream transport error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// Edge WebSocket endpoint: authenticates the downstream connection by
/// cookie, dials the origin chat gateway with the credential propagated,
/// and only then accepts the downstream upgrade. An unreachable origin is
/// rejected with 503 at establishment time, not silently accepted and
/// dropped later.
#[get("/chat/ws/{peer_id}")]
pub async fn ws_proxy(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<RelayState>,
    path: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let peer_id = path.into_inner();

    let Some(cookie) = req.cookie("access_token") else {
        tracing::warn!("relay rejected: no access_token cookie");
        return ws::start(WsCredentialReject, &req, stream);
    };

    let url = state.config.origin_ws_url(&peer_id, cookie.value());
    let upstream =
        tokio::time::timeout(state.config.upstream_timeout, connect_async(url)).await;

    let ws_stream = match upstream {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "origin gateway unreachable");
            return Err(AppError::UpstreamUnavailable(e.to_string()).into());
        }
        Err(_) => {
            tracing::error!("origin gateway connect timed out");
            return Err(AppError::UpstreamUnavailable("connect timed out".into()).into());
        }
    };

    let (sink, upstream_stream) = ws_stream.split();
    ws::start(RelaySession::new(sink, upstream_stream), &req, stream)
}
