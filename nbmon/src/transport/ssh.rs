//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};
use regex::bytes::Regex;
use russh::client::{self, Handle, KeyboardInteractiveAuthResponse, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::config::{HostKeyVerification, SshConfig};
use crate::channel::{Matched, PatternBuffer};
use crate::error::TransportError;

/// Keyboard-interactive rounds answered before giving up.
const MAX_INTERACTIVE_ROUNDS: usize = 3;

/// SSH transport wrapping russh client.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    pub async fn connect(config: SshConfig) -> Result<Self, TransportError> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification,
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());
        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic UnknownKey
            let host_key = host_key_error.lock().ok().and_then(|mut slot| slot.take());
            match (host_key, e) {
                (Some(detailed), _) => detailed,
                (None, russh::Error::IO(source)) => TransportError::ConnectionFailed {
                    host: config.host.clone(),
                    port: config.port,
                    source,
                },
                (None, e) => TransportError::Ssh(e),
            }
        })?;

        Self::authenticate(&mut session, &config).await?;

        Ok(Self { session, config })
    }

    /// Open a PTY shell channel on this connection.
    pub async fn open_shell(&self) -> Result<ShellChannel, TransportError> {
        let channel = self.session.channel_open_session().await?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await?;

        channel.request_shell(true).await?;

        Ok(ShellChannel {
            channel,
            buffer: PatternBuffer::default(),
        })
    }

    /// Authenticate with the server.
    ///
    /// Password authentication first; many network operating systems only
    /// offer keyboard-interactive, which is answered with the same password.
    async fn authenticate(
        session: &mut Handle<SshHandler>,
        config: &SshConfig,
    ) -> Result<(), TransportError> {
        let password = config.password.expose_secret();

        let accepted = session
            .authenticate_password(&config.username, password)
            .await?
            .success();
        if accepted {
            return Ok(());
        }

        debug!(
            "password auth rejected for {}@{}, trying keyboard-interactive",
            config.username,
            config.socket_addr()
        );

        let mut response = session
            .authenticate_keyboard_interactive_start(&config.username, None::<String>)
            .await?;

        let mut rounds = 0;
        loop {
            match response {
                KeyboardInteractiveAuthResponse::Success => return Ok(()),
                KeyboardInteractiveAuthResponse::InfoRequest { ref prompts, .. }
                    if rounds < MAX_INTERACTIVE_ROUNDS =>
                {
                    let answers = vec![password.to_string(); prompts.len()];
                    rounds += 1;
                    response = session
                        .authenticate_keyboard_interactive_respond(answers)
                        .await?;
                }
                _ => break,
            }
        }

        Err(TransportError::AuthenticationFailed {
            user: config.username.clone(),
        })
    }

    /// Close the connection.
    pub async fn close(self) -> Result<(), TransportError> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// Interactive shell on an open SSH session.
pub struct ShellChannel {
    channel: Channel<Msg>,
    buffer: PatternBuffer,
}

impl ShellChannel {
    /// Send one line of input.
    pub async fn send(&mut self, line: &str) -> Result<(), TransportError> {
        let mut input = Vec::with_capacity(line.len() + 1);
        input.extend_from_slice(line.as_bytes());
        input.push(b'\n');
        self.channel.data(&input[..]).await?;
        Ok(())
    }

    /// Read until `pattern` matches the tail of the received output.
    pub async fn read_until(&mut self, pattern: &Regex) -> Result<Matched, TransportError> {
        loop {
            if let Some(matched) = self.buffer.take_until(pattern) {
                trace!("matched {:?} after {} bytes", matched.matched, matched.output.len());
                return Ok(matched);
            }
            self.fill().await?;
        }
    }

    /// Read past the echo of `command`.
    pub async fn skip_echo(&mut self, command: &str) -> Result<(), TransportError> {
        while !self.buffer.skip_past_line(command) {
            self.fill().await?;
        }
        Ok(())
    }

    /// Wait for the next channel message and buffer its payload.
    async fn fill(&mut self) -> Result<(), TransportError> {
        match self.channel.wait().await {
            Some(ChannelMsg::Data { data }) => self.buffer.extend(&data),
            Some(ChannelMsg::ExtendedData { data, .. }) => self.buffer.extend(&data),
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                debug!(
                    "channel closed with {} bytes unread: {:?}",
                    self.buffer.len(),
                    self.buffer.as_str_lossy()
                );
                return Err(TransportError::Disconnected);
            }
            Some(other) => trace!("ignoring channel message {:?}", other),
        }
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Detailed host-key error for connect() to surface.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };
        Ok(accepted)
    }
}
