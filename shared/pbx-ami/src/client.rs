//! AMI session client
//!
//! One session owns one connection and runs one action at a time. AMI has
//! no length prefix, so replies are framed by reading into a buffer until
//! the blank-line terminator shows up or the per-action deadline passes.

use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, trace};

use crate::{Action, AmiError, ProtocolResponse, Result, SessionState};

const LINE_TERMINATOR: &[u8] = b"\r\n";
const BLOCK_TERMINATOR: &[u8] = b"\r\n\r\n";
const MAX_BLOCK_LEN: usize = 64 * 1024;
const RESULT_WILL_FOLLOW: &str = "Result will follow";
const BANNER_PREFIX: &str = "Asterisk Call Manager/";

/// Deadlines applied by a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Bound on establishing the TCP connection
    pub connect_timeout: Duration,
    /// Bound on receiving a complete reply to one action
    pub response_timeout: Duration,
    /// Bound on the courtesy Logoff exchange during close
    pub logoff_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
            logoff_timeout: Duration::from_secs(1),
        }
    }
}

impl SessionOptions {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_logoff_timeout(mut self, timeout: Duration) -> Self {
        self.logoff_timeout = timeout;
        self
    }
}

/// A single conversation with the manager interface
pub struct AmiSession<S = TcpStream> {
    stream: Option<S>,
    buffer: BytesMut,
    state: SessionState,
    options: SessionOptions,
    banner: String,
    peer: String,
}

impl AmiSession<TcpStream> {
    /// Connect to `host:port` and consume the manager greeting
    pub async fn open(host: &str, port: u16, options: SessionOptions) -> Result<Self> {
        let addr = format!("{}:{}", host, port);

        let stream = timeout(options.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| AmiError::Connection(format!("connect to {} timed out", addr)))?
            .map_err(|e| AmiError::Connection(format!("{}: {}", addr, e)))?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle on manager socket");
        }

        Self::handshake(stream, addr, options).await
    }
}

impl<S> AmiSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run a session over an already established stream
    pub async fn from_stream(stream: S, options: SessionOptions) -> Result<Self> {
        Self::handshake(stream, "stream".to_string(), options).await
    }

    async fn handshake(stream: S, peer: String, options: SessionOptions) -> Result<Self> {
        let mut session = Self {
            stream: Some(stream),
            buffer: BytesMut::with_capacity(4096),
            state: SessionState::Disconnected,
            options,
            banner: String::new(),
            peer,
        };

        let deadline = Instant::now() + session.options.response_timeout;
        let greeting = session.read_line(deadline, "manager greeting").await;
        let banner = session.settle(greeting.and_then(check_banner))?;

        session.banner = banner;
        session.state = SessionState::Connected;
        info!(peer = %session.peer, banner = %session.banner, "Connected to manager interface");

        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Greeting line sent by the manager, e.g. `Asterisk Call Manager/5.0.1`
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Authenticate the session
    pub async fn login(&mut self, username: &str, secret: &str) -> Result<ProtocolResponse> {
        if self.state != SessionState::Connected {
            return Err(AmiError::InvalidState(format!(
                "login requires a connected session, state is {:?}",
                self.state
            )));
        }

        let action = Action::login(username, secret);
        let deadline = Instant::now() + self.options.response_timeout;
        let exchanged = self.exchange(&action, deadline).await;
        let response = self.settle(exchanged)?;

        if !response.is_success() {
            let reason = response
                .message()
                .or_else(|| response.status())
                .unwrap_or("no status in reply")
                .to_string();
            debug!(peer = %self.peer, username, reason = %reason, "Manager rejected login");
            return Err(AmiError::Authentication(reason));
        }

        self.state = SessionState::Authenticated;
        info!(peer = %self.peer, username, "Manager session authenticated");
        Ok(response)
    }

    /// Send one action and wait for its reply
    pub async fn send_action(&mut self, action: &Action) -> Result<ProtocolResponse> {
        self.ensure_authenticated(action.name())?;

        let deadline = Instant::now() + self.options.response_timeout;
        let exchanged = self.exchange(action, deadline).await;
        self.settle(exchanged)
    }

    /// Read one AstDB entry.
    ///
    /// Handles both reply shapes: `Val` inline in the response, or a
    /// `Result will follow` response trailed by `DBGetResponse` /
    /// `DBGetComplete` events. Returns `None` when the entry is absent.
    pub async fn db_get(&mut self, family: &str, key: &str) -> Result<Option<String>> {
        let response = self.send_action(&Action::db_get(family, key)).await?;

        if let Some(value) = response.value() {
            return Ok(Some(value.to_string()));
        }

        let follows = response.is_success()
            && response
                .message()
                .map(|m| m.eq_ignore_ascii_case(RESULT_WILL_FOLLOW))
                .unwrap_or(false);
        if !follows {
            debug!(family, key, status = ?response.status(), message = ?response.message(), "DBGet returned no value");
            return Ok(None);
        }

        let deadline = Instant::now() + self.options.response_timeout;
        loop {
            let read = self.read_block(deadline, "DBGetResponse").await;
            let block = self.settle(read)?;

            if let Some(value) = block.value() {
                return Ok(Some(value.to_string()));
            }
            if block
                .event()
                .map(|e| e.eq_ignore_ascii_case("DBGetComplete"))
                .unwrap_or(false)
            {
                return Ok(None);
            }
            trace!(event = ?block.event(), "Skipping block while waiting for DBGetResponse");
        }
    }

    /// Log off and drop the connection.
    ///
    /// Never fails: a Logoff that goes unanswered or a socket that will
    /// not shut down cleanly is only logged.
    pub async fn close(&mut self) {
        if self.state == SessionState::Authenticated {
            let deadline = Instant::now() + self.options.logoff_timeout;
            match self.exchange(&Action::logoff(), deadline).await {
                Ok(response) => debug!(peer = %self.peer, status = ?response.status(), "Logoff acknowledged"),
                Err(e) => debug!(peer = %self.peer, error = %e, "Logoff failed"),
            }
        }

        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(peer = %self.peer, error = %e, "Socket shutdown failed");
            }
        }

        self.buffer.clear();
        self.state = SessionState::Closed;
    }

    fn ensure_authenticated(&self, action: &str) -> Result<()> {
        if self.state != SessionState::Authenticated {
            return Err(AmiError::InvalidState(format!(
                "{} requires an authenticated session, state is {:?}",
                action, self.state
            )));
        }
        Ok(())
    }

    /// Tear the session down if a step failed at the transport level
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_transient() || matches!(e, AmiError::Protocol(_)) {
                debug!(peer = %self.peer, error = %e, "Manager session aborted");
                self.abort();
            }
        }
        result
    }

    fn abort(&mut self) {
        self.stream = None;
        self.buffer.clear();
        self.state = SessionState::Closed;
    }

    async fn exchange(&mut self, action: &Action, deadline: Instant) -> Result<ProtocolResponse> {
        let wire = action.encode()?;
        debug!(peer = %self.peer, action = action.name(), "Sending manager action");

        let stream = self.stream_mut()?;
        match timeout_at(deadline, stream.write_all(wire.as_bytes())).await {
            Err(_) => return Err(AmiError::Timeout(format!("{} to be written", action.name()))),
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(())) => {}
        }

        let response = self.read_reply(deadline, action.name()).await?;
        trace!(action = action.name(), status = ?response.status(), "Manager reply received");
        Ok(response)
    }

    /// Next block that answers an action, skipping unsolicited events
    async fn read_reply(&mut self, deadline: Instant, action: &str) -> Result<ProtocolResponse> {
        loop {
            let block = self.read_block(deadline, action).await?;

            if block.headers().is_empty() && block.body().is_empty() {
                continue;
            }
            if block.is_event() {
                trace!(event = ?block.event(), "Skipping unsolicited event");
                continue;
            }
            return Ok(block);
        }
    }

    async fn read_block(&mut self, deadline: Instant, waiting_for: &str) -> Result<ProtocolResponse> {
        loop {
            if let Some(pos) = find(&self.buffer, BLOCK_TERMINATOR) {
                let block = self.buffer.split_to(pos + BLOCK_TERMINATOR.len());
                let text = String::from_utf8_lossy(&block[..pos]);
                return Ok(ProtocolResponse::parse(&text));
            }
            self.fill_buffer(deadline, waiting_for).await?;
        }
    }

    async fn read_line(&mut self, deadline: Instant, waiting_for: &str) -> Result<String> {
        loop {
            if let Some(pos) = find(&self.buffer, LINE_TERMINATOR) {
                let line = self.buffer.split_to(pos + LINE_TERMINATOR.len());
                return Ok(String::from_utf8_lossy(&line[..pos]).trim().to_string());
            }
            self.fill_buffer(deadline, waiting_for).await?;
        }
    }

    async fn fill_buffer(&mut self, deadline: Instant, waiting_for: &str) -> Result<()> {
        if self.buffer.len() >= MAX_BLOCK_LEN {
            return Err(AmiError::Protocol(format!(
                "no terminator within {} bytes while waiting for {}",
                MAX_BLOCK_LEN, waiting_for
            )));
        }

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| AmiError::InvalidState("session is closed".to_string()))?;

        match timeout_at(deadline, stream.read_buf(&mut self.buffer)).await {
            Err(_) => Err(AmiError::Timeout(waiting_for.to_string())),
            Ok(Ok(0)) => Err(AmiError::ConnectionClosed),
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    fn stream_mut(&mut self) -> Result<&mut S> {
        self.stream
            .as_mut()
            .ok_or_else(|| AmiError::InvalidState("session is closed".to_string()))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Anything else on the socket means we reached the wrong service
fn check_banner(line: String) -> Result<String> {
    if line.starts_with(BANNER_PREFIX) {
        Ok(line)
    } else {
        Err(AmiError::Protocol(format!(
            "unexpected greeting {:?}, not a manager interface",
            line
        )))
    }
}
