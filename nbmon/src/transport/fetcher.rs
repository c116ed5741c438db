//! SSH-backed configuration fetcher.

use log::{debug, trace};
use regex::bytes::Regex;
use secrecy::ExposeSecret;

use super::config::{SshConfig, SshOptions};
use super::ssh::{ShellChannel, SshTransport};
use super::{ConfigFetcher, ConnectionAttrs};
use crate::channel::Matched;
use crate::error::{ConfigurationError, FetchError, TransportError};
use crate::platform::{PlatformDefinition, PlatformRegistry, PrivilegeLevel};

/// Pulls running configurations over an interactive SSH shell.
///
/// One session per call: connect, authenticate, escalate to the platform's
/// config privilege, disable paging, run the show command, disconnect. The
/// whole exchange is bounded by [`SshOptions::timeout`].
pub struct SshFetcher {
    registry: PlatformRegistry,
    options: SshOptions,
}

impl SshFetcher {
    /// Fetcher for the built-in platforms.
    pub fn new(options: SshOptions) -> Self {
        Self::with_registry(PlatformRegistry::with_builtins(), options)
    }

    /// Fetcher for a custom set of platforms.
    pub fn with_registry(registry: PlatformRegistry, options: SshOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }

    fn ssh_config(&self, platform: &PlatformDefinition, attrs: &ConnectionAttrs) -> SshConfig {
        SshConfig {
            host: attrs.address.clone(),
            port: attrs.port,
            username: attrs.username.clone(),
            password: attrs.password.clone(),
            timeout: self.options.timeout,
            terminal_width: platform.terminal_width,
            terminal_height: platform.terminal_height,
            host_key_verification: self.options.host_key_verification,
            known_hosts_path: self.options.known_hosts_path.clone(),
        }
    }

    async fn session(
        &self,
        platform: &PlatformDefinition,
        attrs: &ConnectionAttrs,
    ) -> Result<String, FetchError> {
        let prompt = platform
            .prompt_pattern()
            .map_err(|e| broken_platform(platform, e))?;

        let transport = SshTransport::connect(self.ssh_config(platform, attrs)).await?;
        let result = read_config(&transport, platform, &prompt, attrs).await;

        if let Err(e) = transport.close().await {
            debug!("disconnect from {} failed: {}", attrs.address, e);
        }
        result
    }
}

impl ConfigFetcher for SshFetcher {
    fn supports_platform(&self, platform: &str) -> bool {
        self.registry.contains(platform)
    }

    async fn fetch_config(&self, attrs: &ConnectionAttrs) -> Result<String, FetchError> {
        let platform =
            self.registry
                .get(&attrs.platform)
                .ok_or_else(|| ConfigurationError::UnknownPlatform {
                    tag: attrs.platform.clone(),
                })?;

        debug!(
            "fetching config from {}:{} ({})",
            attrs.address, attrs.port, platform.name
        );

        match tokio::time::timeout(self.options.timeout, self.session(platform, attrs)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.options.timeout)),
        }
    }
}

async fn read_config(
    transport: &SshTransport,
    platform: &PlatformDefinition,
    prompt: &Regex,
    attrs: &ConnectionAttrs,
) -> Result<String, FetchError> {
    let mut shell = transport.open_shell().await?;

    let login = shell.read_until(prompt).await?;
    let current = platform
        .determine_privilege(&login.matched)
        .ok_or_else(|| TransportError::EnableFailed {
            prompt: login.matched.clone(),
        })?;
    trace!("logged in at {} ({:?})", current.name, login.matched);

    let path = platform
        .escalation_path(&current.name)
        .ok_or_else(|| TransportError::EnableFailed {
            prompt: login.matched.clone(),
        })?;
    for level in path {
        escalate(&mut shell, platform, prompt, level, attrs).await?;
    }

    for command in &platform.on_open_commands {
        run_command(&mut shell, platform, prompt, command).await?;
    }

    let config = run_command(&mut shell, platform, prompt, &platform.show_config_command).await?;
    Ok(config)
}

/// Enter `level` from its parent, answering the secret prompt if one shows up.
async fn escalate(
    shell: &mut ShellChannel,
    platform: &PlatformDefinition,
    prompt: &Regex,
    level: &PrivilegeLevel,
    attrs: &ConnectionAttrs,
) -> Result<(), FetchError> {
    let command = level
        .escalate_command
        .as_deref()
        .ok_or_else(|| TransportError::EnableFailed {
            prompt: level.name.clone(),
        })?;
    debug!("{}: entering {} with '{}'", attrs.address, level.name, command);
    shell.send(command).await?;

    let reply = match &level.escalate_prompt {
        Some(auth) => {
            let auth_or_prompt =
                either_pattern(auth, prompt).map_err(|e| broken_platform(platform, e))?;
            let reply = shell.read_until(&auth_or_prompt).await?;
            if auth.is_match(reply.matched.as_bytes()) {
                // Devices without a dedicated enable secret take the login password
                let secret = attrs.secret.as_ref().unwrap_or(&attrs.password);
                shell.send(secret.expose_secret()).await?;
                let answer = shell.read_until(&auth_or_prompt).await?;
                if auth.is_match(answer.matched.as_bytes()) {
                    return Err(TransportError::EnableFailed {
                        prompt: answer.matched,
                    }
                    .into());
                }
                answer
            } else {
                reply
            }
        }
        None => shell.read_until(prompt).await?,
    };

    match platform.determine_privilege(&reply.matched) {
        Some(reached) if reached.name == level.name => Ok(()),
        _ => Err(TransportError::EnableFailed {
            prompt: reply.matched,
        }
        .into()),
    }
}

/// Run one command and return its output without echo or prompt.
async fn run_command(
    shell: &mut ShellChannel,
    platform: &PlatformDefinition,
    prompt: &Regex,
    command: &str,
) -> Result<String, FetchError> {
    shell.send(command).await?;
    shell.skip_echo(command).await?;
    let Matched { output, .. } = shell.read_until(prompt).await?;
    let output = normalize_output(&output);

    if let Some(failure) = platform.detect_failure(&output) {
        return Err(TransportError::CommandFailed {
            command: command.to_string(),
            message: failure.to_string(),
        }
        .into());
    }
    Ok(output)
}

/// Output text with the newlines before the prompt removed.
fn normalize_output(output: &[u8]) -> String {
    String::from_utf8_lossy(output)
        .trim_end_matches('\n')
        .to_string()
}

fn either_pattern(first: &Regex, second: &Regex) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?:{})|(?:{})", first.as_str(), second.as_str()))
}

fn broken_platform(platform: &PlatformDefinition, error: regex::Error) -> ConfigurationError {
    ConfigurationError::InvalidAttribute {
        field: "platform",
        message: format!("{} has an unusable prompt pattern: {}", platform.name, error),
    }
}
