//! TCP client for the sign control protocol.

use std::io::ErrorKind;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use serde::Serialize;
use serde::de::DeserializeOwned;

use signbridge_core::config::{Credentials, SessionConfig};
use signbridge_proto::frame::{self, Frame, FrameError, Opcode};
use signbridge_proto::payload::{
    ListRequest, LoginAck, LoginRequest, ProgramId, ProgramInfo, ProgramList, SessionToken,
    SwitchAck, SwitchRequest,
};

use super::error::SessionError;

/// Smallest payload a real response can carry (`{}`); anything shorter is
/// a truncated or garbage response.
const MIN_RESPONSE_PAYLOAD: usize = 2;

/// Lifecycle state of a sign session.
///
/// `Connecting` covers an established-but-unauthenticated connection;
/// `Failed` is terminal and reached on any I/O or protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Closing,
    Failed,
}

/// One authenticated TCP connection to a sign controller.
pub struct SignSession {
    stream: Option<TcpStream>,
    state: SessionState,
    token: Option<SessionToken>,
    config: SessionConfig,
    peer: String,
    buf: Vec<u8>,
}

impl SignSession {
    /// Open a TCP connection to `address`, enforcing the connect timeout.
    pub async fn connect(address: &str, config: &SessionConfig) -> Result<Self, SessionError> {
        debug!(address, "Connecting to sign");
        let connect_timeout = config.connect_timeout();
        let stream = match timeout(connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                return Err(SessionError::ConnectRefused(address.to_string()));
            }
            Ok(Err(source)) => {
                return Err(SessionError::Connect {
                    address: address.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(SessionError::ConnectTimeout {
                    address: address.to_string(),
                    timeout: connect_timeout,
                });
            }
        };
        Ok(Self {
            stream: Some(stream),
            state: SessionState::Connecting,
            token: None,
            config: config.clone(),
            peer: address.to_string(),
            buf: Vec::new(),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Authenticate with the sign and store the connection-scoped token.
    pub async fn authenticate(
        &mut self,
        credentials: &Credentials,
    ) -> Result<SessionToken, SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::NotReady(self.state));
        }
        self.state = SessionState::Authenticating;

        let login = LoginRequest {
            serial_number: credentials.serial_number.clone(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            login_type: credentials.login_type,
        };
        let ack: LoginAck = match self
            .round_trip(Opcode::LOGIN, &login, Opcode::LOGIN_ACK)
            .await
        {
            Ok(ack) => ack,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };

        if ack.result != 0 {
            self.fail();
            return Err(SessionError::AuthRejected(
                ack.message
                    .unwrap_or_else(|| format!("result {}", ack.result)),
            ));
        }
        let Some(token) = ack.token else {
            self.fail();
            return Err(SessionError::Protocol("login ack carried no token".into()));
        };

        self.token = Some(token.clone());
        self.state = SessionState::Ready;
        debug!(peer = %self.peer, "Authenticated");
        Ok(token)
    }

    /// Fetch the sign's program directory.
    ///
    /// Order is whatever the sign returns; lookups are by name.
    pub async fn list_programs(&mut self) -> Result<Vec<ProgramInfo>, SessionError> {
        let token = self.require_ready()?;
        let request = ListRequest { token };
        match self
            .round_trip::<_, ProgramList>(Opcode::LIST_PROGRAMS, &request, Opcode::PROGRAM_LIST)
            .await
        {
            Ok(list) => Ok(list.program_infos),
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    /// Switch the sign to the given program.
    ///
    /// Always issued and checked, even when the sign may already be
    /// showing the target: the client never trusts cached display state.
    pub async fn switch_program(&mut self, identifier: &ProgramId) -> Result<(), SessionError> {
        let token = self.require_ready()?;
        let request = SwitchRequest {
            token,
            identifier: identifier.clone(),
        };
        let ack: SwitchAck = match self
            .round_trip(Opcode::SWITCH_PROGRAM, &request, Opcode::SWITCH_ACK)
            .await
        {
            Ok(ack) => ack,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };
        if ack.result != 0 {
            return Err(SessionError::Device(
                ack.message
                    .unwrap_or_else(|| format!("result {}", ack.result)),
            ));
        }
        debug!(peer = %self.peer, identifier = %identifier, "Switched program");
        Ok(())
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            self.state = SessionState::Closing;
            debug!(peer = %self.peer, "Session closed");
        }
        if self.state != SessionState::Failed {
            self.state = SessionState::Disconnected;
        }
    }

    fn fail(&mut self) {
        self.state = SessionState::Failed;
        self.stream = None;
    }

    fn require_ready(&self) -> Result<SessionToken, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotReady(self.state));
        }
        self.token
            .clone()
            .ok_or_else(|| SessionError::Protocol("ready session has no token".into()))
    }

    async fn round_trip<Req: Serialize, Resp: DeserializeOwned>(
        &mut self,
        command: Opcode,
        request: &Req,
        expect: Opcode,
    ) -> Result<Resp, SessionError> {
        let frame = Frame::json(command, request)
            .map_err(|e| SessionError::Protocol(format!("encode {command} payload: {e}")))?;
        self.send(&frame).await?;

        let response = self.read_frame().await?;
        if response.command != expect {
            return Err(SessionError::Protocol(format!(
                "expected {expect} response, got {}",
                response.command
            )));
        }
        if response.payload.len() < MIN_RESPONSE_PAYLOAD {
            return Err(SessionError::Protocol(format!(
                "{} byte response payload below the {MIN_RESPONSE_PAYLOAD} byte floor",
                response.payload.len()
            )));
        }
        response
            .parse()
            .map_err(|e| SessionError::Protocol(format!("unparsable {expect} payload: {e}")))
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), SessionError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| SessionError::Protocol("session is closed".into()))?;
        stream.write_all(&frame::encode(frame)).await?;
        Ok(())
    }

    /// Read one complete frame, bounded by the response timeout.
    async fn read_frame(&mut self) -> Result<Frame, SessionError> {
        match timeout(self.config.response_timeout(), self.read_frame_inner()).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::ResponseTimeout),
        }
    }

    async fn read_frame_inner(&mut self) -> Result<Frame, SessionError> {
        loop {
            match frame::decode(&self.buf) {
                Ok((frame, consumed)) => {
                    self.buf.drain(..consumed);
                    return Ok(frame);
                }
                Err(FrameError::Incomplete { .. }) => {}
                Err(e) => return Err(SessionError::Protocol(e.to_string())),
            }

            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| SessionError::Protocol("session is closed".into()))?;
            let mut chunk = [0u8; 4096];
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(SessionError::Protocol("connection closed mid-response".into()));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}
