use super::*;
use async_ssh2_tokio::Config;
use async_ssh2_tokio::client::AuthMethod;
use russh::client::Msg;
use russh::{Channel, Pty};

/// Splits `host:port`. Brackets around IPv6 hosts are removed.
pub(crate) fn split_address(address: &str) -> Result<(String, u16), SessionError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| SessionError::connect(address, "address must be host:port"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(SessionError::connect(address, "empty host"));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| SessionError::connect(address, format!("invalid port '{port}': {e}")))?;
    Ok((host.to_string(), port))
}

/// Terminal modes sent with the pty request.
pub(crate) fn terminal_modes(pty: &config::PtyConfig) -> [(Pty, u32); 3] {
    [
        (Pty::ECHO, u32::from(pty.echo)),
        (Pty::TTY_OP_ISPEED, pty.speed),
        (Pty::TTY_OP_OSPEED, pty.speed),
    ]
}

/// Dials and authenticates, then opens a shell on a fresh pty channel.
///
/// Returns the client, which must stay alive for the connection to stay up,
/// and the shell channel.
pub(crate) async fn connect(
    identity: &Identity,
    config: &SessionConfig,
    security: &ConnectionSecurityOptions,
) -> Result<(Client, Channel<Msg>), SessionError> {
    let label = identity.label();
    let (host, port) = split_address(&identity.address)?;

    let ssh_config = Config {
        preferred: security.preferred(),
        ..Default::default()
    };

    debug_if!(config.log, "{} Connecting...", label);
    let connect_timeout = config.connect_timeout();
    let client = tokio::time::timeout(
        connect_timeout,
        Client::connect_with_config(
            (host, port),
            &identity.user,
            AuthMethod::with_password(&identity.password),
            security.server_check.clone(),
            ssh_config,
        ),
    )
    .await
    .map_err(|_| {
        SessionError::connect(
            &identity.address,
            format!("timed out after {connect_timeout:?}"),
        )
    })?
    .map_err(|e| match e {
        async_ssh2_tokio::Error::PasswordWrong => SessionError::AuthError {
            user: identity.user.clone(),
        },
        other => SessionError::connect(&identity.address, other),
    })
    .inspect_err(|e| error!("{} {}", label, e))?;
    debug_if!(config.log, "{} TCP connection successful", label);

    let mut channel = client
        .get_channel()
        .await
        .map_err(|e| SessionError::SessionSetupError(format!("open channel: {e}")))?;
    channel
        .request_pty(
            false,
            &config.pty.term,
            config.pty.columns,
            config.pty.rows,
            0,
            0,
            &terminal_modes(&config.pty),
        )
        .await
        .map_err(|e| SessionError::SessionSetupError(format!("request pty: {e}")))?;
    channel
        .request_shell(false)
        .await
        .map_err(|e| SessionError::SessionSetupError(format!("request shell: {e}")))?;
    debug_if!(config.log, "{} Shell request successful", label);

    Ok((client, channel))
}
