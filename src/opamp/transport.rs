use crate::opamp::panic_message;
use crate::opamp::proto::{AgentToServer, ServerToAgent};
use crate::opamp::session::Session;
use crate::registry::connection::{AgentConnection, SendError};
use crate::registry::AgentRegistry;
use crate::settings::{OpampSettings, TlsSettings};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use prost::Message as _;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Path agents connect to; anything else is rejected during the handshake.
pub const SESSION_PATH: &str = "/v1/opamp";

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("binding session listener: `{0}`")]
    Bind(std::io::Error),

    #[error("accepting session: `{0}`")]
    Accept(std::io::Error),

    #[error("loading TLS material: `{0}`")]
    Tls(String),
}

/// Hosts the WebSocket listener for agent sessions.
///
/// One instance per supervisor round: a crashed transport is discarded and
/// a fresh one built from the same settings, while the registry lives
/// outside and keeps its records.
pub struct SessionTransport {
    settings: OpampSettings,
    registry: Arc<AgentRegistry>,
}

impl SessionTransport {
    pub fn new(settings: OpampSettings, registry: Arc<AgentRegistry>) -> Self {
        Self { settings, registry }
    }

    pub async fn run(self) -> Result<(), TransportError> {
        let acceptor = tls_acceptor(&self.settings.tls)?;
        let listener = TcpListener::bind(self.settings.listen_address.as_str())
            .await
            .map_err(TransportError::Bind)?;
        info!(
            address = %self.settings.listen_address,
            tls = acceptor.is_some(),
            "session transport listening"
        );

        loop {
            let (stream, peer) = listener.accept().await.map_err(TransportError::Accept)?;
            let registry = self.registry.clone();
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Err(err) = serve_connection(stream, peer, acceptor, registry).await {
                    debug!(peer = %peer, error = %err, "session ended");
                }
            });
        }
    }
}

fn tls_acceptor(tls: &TlsSettings) -> Result<Option<TlsAcceptor>, TransportError> {
    if !tls.is_enabled() {
        return Ok(None);
    }

    let cert_reader =
        File::open(&tls.cert_file).map_err(|err| TransportError::Tls(err.to_string()))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_reader))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| TransportError::Tls(err.to_string()))?;

    let key_reader =
        File::open(&tls.key_file).map_err(|err| TransportError::Tls(err.to_string()))?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_reader))
        .map_err(|err| TransportError::Tls(err.to_string()))?
        .ok_or_else(|| {
            TransportError::Tls(format!("no private key in {}", tls.key_file.display()))
        })?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| TransportError::Tls(err.to_string()))?;
    Ok(Some(TlsAcceptor::from(Arc::new(config))))
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    registry: Arc<AgentRegistry>,
) -> Result<(), TransportError> {
    match acceptor {
        Some(acceptor) => {
            let stream = acceptor
                .accept(stream)
                .await
                .map_err(TransportError::Accept)?;
            serve_session(stream, peer, registry).await
        }
        None => serve_session(stream, peer, registry).await,
    }
}

fn session_path_check(req: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if req.uri().path() == SESSION_PATH {
        Ok(response)
    } else {
        debug!(path = req.uri().path(), "rejecting session on unknown path");
        let mut rejection = ErrorResponse::new(Some("no such endpoint".to_string()));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    }
}

/// Connection handle handed to the registry: a send queues a frame for the
/// session's writer task.
struct WsAgentConnection {
    frames: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl AgentConnection for WsAgentConnection {
    async fn send(&self, msg: ServerToAgent) -> Result<(), SendError> {
        self.frames
            .send(Message::Binary(msg.encode_to_vec()))
            .map_err(|_| SendError::Closed)
    }

    fn is_alive(&self) -> bool {
        !self.frames.is_closed()
    }
}

async fn serve_session<S>(
    stream: S,
    peer: SocketAddr,
    registry: Arc<AgentRegistry>,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws = accept_hdr_async(stream, session_path_check)
        .await
        .map_err(|err| TransportError::Accept(std::io::Error::other(err)))?;

    let (mut sink, mut source) = ws.split();
    let (frames, mut pending) = mpsc::unbounded_channel::<Message>();

    // All outbound traffic, replies and control-plane pushes alike, goes
    // through one queue so frames keep a single writer.
    let writer = tokio::spawn(async move {
        while let Some(frame) = pending.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let connection = Arc::new(WsAgentConnection {
        frames: frames.clone(),
    });
    let mut session = Session::new(peer, registry, connection);
    session.accept();

    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Binary(data)) => match AgentToServer::decode(data.as_slice()) {
                Ok(msg) => {
                    // Fault barrier: a broken callback must not take the
                    // transport down with it.
                    let outcome = catch_unwind(AssertUnwindSafe(|| session.on_message(&msg)));
                    let reply = match outcome {
                        Ok(reply) => reply,
                        Err(panic) => {
                            error!(
                                agent_id = %session.current_id(),
                                panic = panic_message(panic.as_ref()),
                                "session callback panicked"
                            );
                            ServerToAgent {
                                instance_uid: msg.instance_uid.clone(),
                                ..Default::default()
                            }
                        }
                    };
                    if frames.send(Message::Binary(reply.encode_to_vec())).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(peer = %peer, error = %err, "undecodable session frame"),
            },
            Ok(Message::Ping(payload)) => {
                let _ = frames.send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(peer = %peer, error = %err, "session read failed");
                break;
            }
        }
    }

    session.close();
    drop(frames);
    writer.abort();
    Ok(())
}
