use super::*;
use moka::notification::RemovalCause;
use std::collections::HashMap;
use std::sync::{Mutex as StdMutex, PoisonError};

/// A pool slot. The mutex is the per-identity lock; the option is empty until
/// the first session for the identity has been built.
type Slot = Arc<Mutex<Option<Session>>>;

/// Per-identity locks, independent of the cache.
///
/// A slot stays registered while anyone holds or waits on it, so callers for
/// one identity always contend on the same mutex even if the cache refused or
/// evicted the entry.
#[derive(Clone, Default)]
struct Slots(Arc<StdMutex<HashMap<String, Slot>>>);

impl Slots {
    fn get_or_insert(&self, key: &str) -> Slot {
        let mut slots = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.to_string()).or_default().clone()
    }

    fn get(&self, key: &str) -> Option<Slot> {
        let slots = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).cloned()
    }

    /// Unregisters `slot` if the caller's handle is the only one besides the
    /// registry's own.
    fn release(&self, key: &str, slot: &Slot) -> bool {
        let mut slots = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(key) {
            Some(registered) if Arc::ptr_eq(registered, slot) && Arc::strong_count(slot) == 2 => {
                slots.remove(key);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Future returned by a [`Connector`].
pub type ConnectFuture = Pin<Box<dyn Future<Output = Result<Session, SessionError>> + Send>>;

/// Builds a new session for an identity. The default connects over SSH.
pub type Connector = Arc<dyn Fn(Identity, SessionConfig) -> ConnectFuture + Send + Sync>;

/// Exclusive access to the session of one identity.
///
/// The identity stays locked until the lease is dropped.
pub type SessionLease = OwnedMappedMutexGuard<Option<Session>, Session>;

/// Connector that dials the device over SSH with the given security options.
pub fn ssh_connector(security: ConnectionSecurityOptions) -> Connector {
    Arc::new(move |identity: Identity, config: SessionConfig| -> ConnectFuture {
        let security = security.clone();
        Box::pin(async move { Session::connect(&identity, config, &security).await })
    })
}

/// Session pool keyed by identity.
///
/// Sessions are cached for 5 minutes of inactivity, up to 100 identities.
/// Access to one identity is serialized; different identities never wait on
/// each other.
#[derive(Clone)]
pub struct SessionManager {
    /// Idle tracking only; the sessions live in `slots`.
    cache: Cache<String, ()>,
    slots: Slots,
    connector: Connector,
    config: SessionConfig,
    sanitizers: SanitizerRegistry,
}

impl SessionManager {
    /// Creates a pool that connects over SSH with the default options.
    pub fn new() -> Self {
        Self::with_connector(ssh_connector(ConnectionSecurityOptions::default()))
    }

    /// Creates a pool that builds sessions with `connector`.
    pub fn with_connector(connector: Connector) -> Self {
        let slots = Slots::default();
        let evicted = slots.clone();
        let cache = Cache::builder()
            .max_capacity(100)
            .time_to_idle(Duration::from_secs(5 * 60)) // Evict after 5 minutes idle
            .eviction_listener(move |key, _, cause| close_evicted(evicted.clone(), key, cause))
            .build();

        Self {
            cache,
            slots,
            connector,
            config: SessionConfig::default(),
            sanitizers: SanitizerRegistry::default(),
        }
    }

    /// Creates an SSH pool with explicit security options.
    pub fn with_security(security: ConnectionSecurityOptions) -> Self {
        Self::with_connector(ssh_connector(security))
    }

    /// Configuration handed to every new session.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sanitizers used when filtering command output.
    pub fn sanitizers(mut self, sanitizers: SanitizerRegistry) -> Self {
        self.sanitizers = sanitizers;
        self
    }

    /// Locks the slot of `identity` without creating a session.
    ///
    /// The lock is released when the guard is dropped.
    pub async fn lock(&self, identity: &Identity) -> OwnedMutexGuard<Option<Session>> {
        let key = identity.cache_key();
        let slot = self.slots.get_or_insert(&key);
        // Only resets the idle timer. The cache may refuse the entry when full.
        self.cache.get_with(key, async {}).await;
        slot.lock_owned().await
    }

    /// Returns the cached session of `identity`, or builds a new one.
    ///
    /// A cached session is reused only if it is still open and answers a
    /// prompt probe. Otherwise it is closed and replaced. `brand_hint` pre-fills
    /// the brand of a session that has not been probed yet.
    pub async fn session(
        &self,
        identity: &Identity,
        brand_hint: Option<Brand>,
    ) -> Result<SessionLease, SessionError> {
        let label = identity.label();
        let mut slot = self.lock(identity).await;

        let reusable = match slot.as_mut() {
            Some(session) if session.is_usable() => session.check_alive().await,
            _ => false,
        };

        if reusable {
            debug!("Cache hit, reusing session: {}", label);
        } else {
            match slot.take() {
                Some(mut stale) => {
                    debug!("Cached session {} is not usable. Recreating.", label);
                    if stale.state() != SessionState::Closed {
                        stale.close().await;
                    }
                }
                None => debug!("Cache miss, creating new session for {}...", label),
            }
            let session = (self.connector)(identity.clone(), self.config.clone())
                .await
                .inspect_err(|e| error!("{} Create session failed: {}", label, e))?;
            *slot = Some(session);
            debug!("New session for {} has been cached.", label);
        }

        let mut lease =
            OwnedMutexGuard::try_map(slot, |slot| slot.as_mut()).map_err(|_| SessionError::Closed)?;
        if let Some(brand) = brand_hint
            && lease.cached_brand().is_none()
        {
            lease.set_brand(brand);
        }
        Ok(lease)
    }

    /// Runs `commands` on the device and returns the filtered output.
    ///
    /// Waits until the shell has been quiet for the configured command idle
    /// window, then drops everything before the echo of the first command.
    pub async fn run_commands(
        &self,
        identity: &Identity,
        commands: &[&str],
    ) -> Result<String, SessionError> {
        self.run_commands_with_brand(identity, None, commands).await
    }

    /// [`run_commands`](Self::run_commands) with a known device brand.
    pub async fn run_commands_with_brand(
        &self,
        identity: &Identity,
        brand: Option<Brand>,
        commands: &[&str],
    ) -> Result<String, SessionError> {
        let first = *commands.first().ok_or(SessionError::NoCommands)?;
        let mut session = self.session(identity, brand).await?;

        session.write_commands(commands.iter().copied())?;
        let raw = session.read_until_idle(self.config.command_idle()).await;
        if raw.is_empty() && !session.is_usable() {
            return Err(SessionError::ReadError(format!(
                "{} shell output stream closed",
                session.label()
            )));
        }

        let sanitizer = self.sanitizers.for_brand(session.cached_brand());
        let filtered = filter_output(&raw, first, sanitizer);
        if let Some(prompt) = filtered.prompt.as_deref() {
            debug_if!(self.config.log, "{} Prompt is '{}'", session.label(), prompt);
        }
        Ok(filtered.text)
    }

    /// Detects (or returns the cached) brand of the device.
    pub async fn brand(&self, identity: &Identity) -> Result<Option<Brand>, SessionError> {
        let mut session = self.session(identity, None).await?;
        Ok(session.brand().await)
    }

    /// Closes and forgets the session of `identity`, if any.
    pub async fn remove(&self, identity: &Identity) {
        let key = identity.cache_key();
        self.cache.invalidate(&key).await;
        let Some(slot) = self.slots.get(&key) else {
            return;
        };
        if let Some(mut session) = slot.lock().await.take() {
            session.close().await;
        }
        self.slots.release(&key, &slot);
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Closes the session of an evicted slot once its current user releases it,
/// then unregisters the slot unless another caller is waiting on it.
fn close_evicted(slots: Slots, key: Arc<String>, cause: RemovalCause) {
    if matches!(cause, RemovalCause::Explicit | RemovalCause::Replaced) {
        return;
    }
    let Some(slot) = slots.get(&key) else {
        return;
    };
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!("Evicted {} outside a runtime, dropping session", key);
        slots.release(&key, &slot);
        return;
    };
    runtime.spawn(async move {
        if let Some(mut session) = slot.lock().await.take() {
            debug!("Closing evicted session {} ({:?})", key, cause);
            session.close().await;
        }
        if slots.release(&key, &slot) {
            debug!("Released lock of {}", key);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_connector() -> Connector {
        Arc::new(|identity: Identity, _config: SessionConfig| -> ConnectFuture {
            Box::pin(async move { Err(SessionError::connect(&identity.address, "offline")) })
        })
    }

    async fn settle(slots: &Slots, expected: usize) {
        for _ in 0..50 {
            if slots.len() == expected {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn identity_lock_holds_when_cache_is_full() {
        let manager = SessionManager::with_connector(offline_connector());
        for _ in 0..5 {
            for n in 0..100 {
                let identity = Identity::new("admin", "pw", format!("10.0.0.{n}:22"));
                drop(manager.lock(&identity).await);
            }
        }
        manager.cache.run_pending_tasks().await;

        let hot = Identity::new("admin", "pw", "10.0.1.1:22");
        let held = manager.lock(&hot).await;
        manager.cache.run_pending_tasks().await;

        let second = tokio::time::timeout(Duration::from_millis(200), manager.lock(&hot)).await;
        assert!(second.is_err(), "second lock acquired while the first is held");

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(200), manager.lock(&hot)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn evicted_slot_stays_registered_while_held() {
        let slots = Slots::default();
        let slot = slots.get_or_insert("k");
        let held = slot.lock_owned().await;

        close_evicted(slots.clone(), Arc::new("k".to_string()), RemovalCause::Expired);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(slots.len(), 1);
        assert!(Arc::ptr_eq(
            &slots.get_or_insert("k"),
            &slots.get("k").expect("registered")
        ));

        drop(held);
        settle(&slots, 0).await;
        assert_eq!(slots.len(), 0);
    }

    #[tokio::test]
    async fn explicit_removal_is_left_to_remove() {
        let slots = Slots::default();
        drop(slots.get_or_insert("k"));
        close_evicted(slots.clone(), Arc::new("k".to_string()), RemovalCause::Explicit);
        tokio::task::yield_now().await;
        assert_eq!(slots.len(), 1);
    }

    #[tokio::test]
    async fn remove_unregisters_idle_slot() {
        let manager = SessionManager::with_connector(offline_connector());
        let identity = Identity::new("admin", "pw", "10.0.0.1:22");
        drop(manager.lock(&identity).await);
        assert_eq!(manager.slots.len(), 1);

        manager.remove(&identity).await;
        assert_eq!(manager.slots.len(), 0);

        manager.remove(&identity).await;
        assert_eq!(manager.slots.len(), 0);
    }
}
