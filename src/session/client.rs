use super::*;

impl Session {
    /// Connects over SSH and starts an interactive shell.
    ///
    /// Setup failures are returned as errors; no session is created for them.
    pub async fn connect(
        identity: &Identity,
        config: SessionConfig,
        security: &ConnectionSecurityOptions,
    ) -> Result<Session, SessionError> {
        let (client, channel) = transport::connect(identity, &config, security).await?;
        let mut session = Self::from_stream(identity.label(), channel.into_stream(), config);
        session.client = Some(client);
        session.drain_banner().await;
        Ok(session)
    }

    /// Starts a session over an already established shell stream and waits
    /// for the login banner to settle.
    pub async fn start<S>(label: impl Into<String>, stream: S, config: SessionConfig) -> Session
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut session = Self::from_stream(label, stream, config);
        session.drain_banner().await;
        session
    }

    /// Wraps a shell stream without reading anything from it.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_stream<S>(label: impl Into<String>, stream: S, config: SessionConfig) -> Session
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let label = label.into();
        let health = Health::new();
        let mux = Mux::spawn(stream, &label, health.clone(), config.log);
        Session {
            label,
            client: None,
            mux,
            health,
            brand: None,
            brand_probed: false,
            last_used: Instant::now(),
            config,
        }
    }

    async fn drain_banner(&mut self) {
        let banner = self
            .read_until_any_of(self.config.banner_idle(), PROMPT_MARKERS)
            .await;
        debug_if!(
            self.config.log,
            "{} Shell ready, banner {} bytes",
            self.label,
            banner.len()
        );
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.health.get()
    }

    /// Whether both I/O tasks are still running and the session is not closed.
    pub fn is_usable(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Time of the last write or read.
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// Queues commands for the shell in order. Each is sent as one line.
    ///
    /// Does not wait for the device. Fails only if the session is closed or
    /// its writer task has stopped.
    pub fn write_commands<I, S>(&mut self, commands: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.state() == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        self.touch();
        for command in commands {
            let command = command.as_ref();
            debug_if!(self.config.log, "{} Write {:?}", self.label, command);
            self.mux.writes.send(command).inspect_err(|e| {
                error!("{} {}", self.label, e);
            })?;
        }
        Ok(())
    }

    /// Brand known without probing, either detected earlier or set as a hint.
    pub fn cached_brand(&self) -> Option<Brand> {
        self.brand
    }

    /// Records the brand supplied by the caller; skips detection later.
    pub fn set_brand(&mut self, brand: Brand) {
        self.brand = Some(brand);
        self.brand_probed = true;
    }

    /// Detects the device vendor from its version banner.
    ///
    /// Probes at most once per session: a result of `None` is cached as well.
    /// Probes that fail to write or that run on a degraded session are not
    /// cached.
    pub async fn brand(&mut self) -> Option<Brand> {
        if self.brand_probed {
            return self.brand;
        }
        if let Err(e) = self.write_commands(BRAND_PROBE_COMMANDS) {
            error!("{} Brand probe failed: {}", self.label, e);
            return None;
        }
        let output = self.read_until_idle(self.config.brand_idle()).await;
        let brand = Brand::detect(&output);
        if !self.is_usable() {
            error!("{} Brand probe ran on a {:?} session", self.label, self.state());
            return brand;
        }
        match brand {
            Some(brand) => {
                debug_if!(self.config.log, "{} The device brand is <{}>.", self.label, brand)
            }
            None => debug_if!(self.config.log, "{} The device brand is unknown.", self.label),
        }
        self.brand = brand;
        self.brand_probed = true;
        brand
    }

    /// Sends an empty line and waits for a prompt character.
    pub async fn check_alive(&mut self) -> bool {
        if self.state() == SessionState::Closed {
            return false;
        }
        if self.write_commands([""]).is_err() {
            return false;
        }
        let output = self
            .read_until_any_of(self.config.alive_idle(), PROMPT_MARKERS)
            .await;
        PROMPT_MARKERS.iter().any(|marker| output.contains(marker))
    }

    /// Disconnects the transport and closes both queues.
    ///
    /// Best effort: failures are logged, never returned. Closing a closed
    /// session only logs.
    pub async fn close(&mut self) {
        if self.health.close() == SessionState::Closed {
            error!("{} Close called on a closed session", self.label);
            return;
        }
        debug_if!(self.config.log, "{} Closing session...", self.label);

        if let Some(client) = self.client.take() {
            // A panic inside the SSH library surfaces as a JoinError here.
            match tokio::spawn(async move { client.disconnect().await }).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("{} Disconnect failed: {}", self.label, e),
                Err(e) => error!("{} Disconnect panicked: {}", self.label, e),
            }
        }
        self.mux.shutdown();
        debug!("{} Session closed", self.label);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.mux.shutdown();
    }
}
