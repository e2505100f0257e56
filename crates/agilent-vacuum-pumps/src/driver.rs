//! Connection state machine shared by all controller models.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agilent_vacuum_dispatch::{
    CommandDescriptor, DispatchConfig, DispatchError, Dispatcher, Operation, Request, Value,
};
use agilent_vacuum_transport::Connector;
use bitflags::Flags;

use crate::device::Device;
use crate::error::{DriverError, Result};
use crate::status::{flag_names, PressureUnit, PumpStatus};

/// Lifecycle state of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    Disconnected,
    /// Connected, pump not started by this driver.
    Idle,
    /// Connected, start acknowledged.
    Running,
    /// The link failed; `connect()` starts over.
    Faulted,
}

impl DriverState {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverState::Disconnected => "disconnected",
            DriverState::Idle => "idle",
            DriverState::Running => "running",
            DriverState::Faulted => "faulted",
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, DriverState::Idle | DriverState::Running)
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverConfig {
    /// Address, timeout and retry policy of each session.
    pub dispatch: DispatchConfig,
    /// Unit to apply on connect. `None` reads and caches the current one.
    pub pressure_unit: Option<PressureUnit>,
}

struct Inner {
    state: DriverState,
    session: Option<Arc<Dispatcher>>,
    unit: PressureUnit,
}

/// Future returned by a post-connect hook.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

type ConnectHook<D> = Box<dyn for<'a> Fn(&'a Driver<D>) -> HookFuture<'a> + Send + Sync>;

/// A controller of model `D` behind a [`Connector`].
///
/// All methods take `&self`. Queries run concurrently and are serialized by
/// the session's dispatcher; `connect`, `disconnect`, `start` and `stop`
/// additionally exclude each other.
pub struct Driver<D: Device> {
    connector: Box<dyn Connector>,
    config: DriverConfig,
    inner: Mutex<Inner>,
    lifecycle: tokio::sync::Mutex<()>,
    on_connect: Option<ConnectHook<D>>,
    _device: PhantomData<D>,
}

impl<D: Device> Driver<D> {
    pub fn new(connector: impl Connector + 'static, config: DriverConfig) -> Self {
        Self::from_boxed(Box::new(connector), config)
    }

    pub fn from_boxed(connector: Box<dyn Connector>, config: DriverConfig) -> Self {
        Self {
            connector,
            config,
            inner: Mutex::new(Inner {
                state: DriverState::Disconnected,
                session: None,
                unit: PressureUnit::Unknown,
            }),
            lifecycle: tokio::sync::Mutex::new(()),
            on_connect: None,
            _device: PhantomData,
        }
    }

    /// Run `hook` at the end of every successful `connect`, after the base
    /// configuration.
    ///
    /// The hook sees a connected, idle driver and may issue queries and
    /// writes. It must not call `connect`, `disconnect`, `start` or `stop`.
    /// A failing hook fails the connect and tears the session down.
    pub fn with_on_connect<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a Driver<D>) -> HookFuture<'a> + Send + Sync + 'static,
    {
        self.on_connect = Some(Box::new(hook));
        self
    }

    pub fn model(&self) -> &'static str {
        D::MODEL
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn state(&self) -> DriverState {
        self.lock().state
    }

    /// The last pressure unit read from or written to the controller.
    pub fn pressure_unit(&self) -> PressureUnit {
        self.lock().unit
    }

    /// Open the link, identify the controller and apply the base configuration.
    ///
    /// Allowed from `Disconnected` and `Faulted`. On failure the session is
    /// torn down and the driver is left `Disconnected`.
    pub async fn connect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let state = self.state();
        if state.is_connected() {
            return Err(DriverError::InvalidState {
                operation: "connect",
                state,
            });
        }

        let identify = self.descriptor(D::IDENTIFY)?;
        let transport = match self.connector.open().await {
            Ok(transport) => transport,
            Err(err) => {
                tracing::warn!(
                    model = D::MODEL,
                    link = %self.connector.describe(),
                    error = %err,
                    "failed to open link"
                );
                self.set_disconnected();
                return Err(DispatchError::open_failed(err).into());
            }
        };
        let session = Arc::new(Dispatcher::new(transport, self.config.dispatch.clone()));

        match session.dispatch(identify, Request::Read).await {
            Ok(identity) => {
                tracing::info!(
                    model = D::MODEL,
                    link = %session.endpoint(),
                    %identity,
                    "controller answered"
                );
            }
            Err(err) => {
                tracing::warn!(
                    model = D::MODEL,
                    link = %session.endpoint(),
                    error = %err,
                    "controller did not answer identification"
                );
                self.abandon(&session).await;
                return Err(err.into());
            }
        }

        {
            let mut inner = self.lock();
            inner.state = DriverState::Idle;
            inner.session = Some(Arc::clone(&session));
        }

        if let Err(err) = self.configure(&session).await {
            self.abandon(&session).await;
            return Err(err);
        }

        if let Some(hook) = &self.on_connect {
            if let Err(err) = hook(self).await {
                tracing::warn!(model = D::MODEL, error = %err, "post-connect hook failed");
                self.abandon(&session).await;
                return Err(err);
            }
        }
        Ok(())
    }

    async fn configure(&self, session: &Dispatcher) -> Result<()> {
        let errors = self.descriptor(Operation::ErrorCode)?;
        match session.dispatch(errors, Request::Read).await {
            Ok(value) => {
                let errors = self.error_flags(errors, &value)?;
                tracing::info!(
                    model = D::MODEL,
                    errors = ?flag_names(&errors),
                    "error register"
                );
            }
            Err(DispatchError::WindowDisabled { window }) => {
                tracing::debug!(window, "error register not available")
            }
            Err(err) => return Err(err.into()),
        }

        let descriptor = self.descriptor(Operation::PressureUnit)?;
        let outcome = match self.config.pressure_unit {
            Some(unit) => {
                let code = self.unit_code(descriptor, unit)?;
                session
                    .dispatch(descriptor, Request::Write(Value::Integer(code)))
                    .await
                    .map(|_| unit)
            }
            None => match session.dispatch(descriptor, Request::Read).await {
                Ok(value) => self.unit_from_value(descriptor, &value),
                Err(err) => Err(err),
            },
        };

        match outcome {
            Ok(unit) => {
                self.lock().unit = unit;
                tracing::info!(model = D::MODEL, unit = %unit, "pressure unit");
                Ok(())
            }
            Err(DispatchError::WindowDisabled { window }) => {
                tracing::warn!(window, "pressure unit window disabled, unit left unknown");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Close the session from any state. Idempotent.
    pub async fn disconnect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let session = {
            let mut inner = self.lock();
            inner.state = DriverState::Disconnected;
            inner.session.take()
        };
        if let Some(session) = session {
            session.close().await?;
            tracing::info!(model = D::MODEL, "disconnected");
        }
        Ok(())
    }

    /// Start the pump. A no-op while already running.
    pub async fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let (state, session) = self.snapshot();
        let session = match (state, session) {
            (DriverState::Running, _) => return Ok(()),
            (DriverState::Idle, Some(session)) => session,
            (state, _) => {
                return Err(DriverError::InvalidState {
                    operation: "start",
                    state,
                })
            }
        };

        let descriptor = self.descriptor(Operation::StartStop)?;
        self.run(&session, descriptor, Request::Write(Value::Logic(true)))
            .await?;
        self.advance(&session, DriverState::Running);
        Ok(())
    }

    /// Stop the pump.
    pub async fn stop(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let (state, session) = self.snapshot();
        let session = match (state, session) {
            (DriverState::Running, Some(session)) => session,
            (state, _) => {
                return Err(DriverError::InvalidState {
                    operation: "stop",
                    state,
                })
            }
        };

        let descriptor = self.descriptor(Operation::StartStop)?;
        self.run(&session, descriptor, Request::Write(Value::Logic(false)))
            .await?;
        self.advance(&session, DriverState::Idle);
        Ok(())
    }

    pub async fn get_status(&self) -> Result<PumpStatus> {
        let (descriptor, value) = self.query(Operation::Status).await?;
        let code = integer(descriptor, &value)?;
        D::status_from_code(code).ok_or_else(|| {
            protocol(descriptor, format!("unknown status code {code}")).into()
        })
    }

    pub async fn get_error(&self) -> Result<D::Errors> {
        let (descriptor, value) = self.query(Operation::ErrorCode).await?;
        self.error_flags(descriptor, &value)
    }

    /// Pressure in the controller's configured unit.
    pub async fn read_pressure(&self) -> Result<f64> {
        let (descriptor, value) = self.query(Operation::Pressure).await?;
        value
            .as_float()
            .ok_or_else(|| protocol(descriptor, format!("expected a number, got {value:?}")).into())
    }

    pub async fn get_pressure_unit(&self) -> Result<PressureUnit> {
        let (descriptor, value) = self.query(Operation::PressureUnit).await?;
        let unit = self.unit_from_value(descriptor, &value)?;
        self.lock().unit = unit;
        Ok(unit)
    }

    pub async fn set_pressure_unit(&self, unit: PressureUnit) -> Result<PressureUnit> {
        let descriptor = self.descriptor(Operation::PressureUnit)?;
        let code = self.unit_code(descriptor, unit)?;
        let session = self.session("set pressure unit")?;
        self.run(&session, descriptor, Request::Write(Value::Integer(code)))
            .await?;
        self.lock().unit = unit;
        Ok(unit)
    }

    /// Send a raw catalog request.
    pub async fn send(&self, operation: Operation, request: Request) -> Result<Value> {
        let descriptor = self.descriptor(operation)?;
        let session = self.session(operation.as_str())?;
        self.run(&session, descriptor, request).await
    }

    pub(crate) async fn query(
        &self,
        operation: Operation,
    ) -> Result<(&'static CommandDescriptor, Value)> {
        let descriptor = self.descriptor(operation)?;
        let session = self.session(operation.as_str())?;
        let value = self.run(&session, descriptor, Request::Read).await?;
        Ok((descriptor, value))
    }

    pub(crate) async fn read_integer(&self, operation: Operation) -> Result<i64> {
        let (descriptor, value) = self.query(operation).await?;
        integer(descriptor, &value)
    }

    pub(crate) async fn read_text(&self, operation: Operation) -> Result<String> {
        let (descriptor, value) = self.query(operation).await?;
        match value {
            Value::Text(text) => Ok(text),
            other => Err(protocol(descriptor, format!("expected text, got {other:?}")).into()),
        }
    }

    pub(crate) async fn read_float(&self, operation: Operation) -> Result<f64> {
        let (descriptor, value) = self.query(operation).await?;
        value
            .as_float()
            .ok_or_else(|| protocol(descriptor, format!("expected a number, got {value:?}")).into())
    }

    pub(crate) async fn read_logic(&self, operation: Operation) -> Result<bool> {
        let (descriptor, value) = self.query(operation).await?;
        value
            .as_bool()
            .ok_or_else(|| protocol(descriptor, format!("expected 0 or 1, got {value:?}")).into())
    }

    async fn run(
        &self,
        session: &Arc<Dispatcher>,
        descriptor: &CommandDescriptor,
        request: Request,
    ) -> Result<Value> {
        match session.dispatch(descriptor, request).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_link_failure() {
                    self.fault(session, &err).await;
                }
                Err(err.into())
            }
        }
    }

    fn descriptor(&self, operation: Operation) -> Result<&'static CommandDescriptor> {
        D::CATALOG
            .lookup(operation)
            .ok_or(DriverError::Unsupported {
                model: D::MODEL,
                operation,
            })
    }

    fn session(&self, operation: &'static str) -> Result<Arc<Dispatcher>> {
        match self.snapshot() {
            (state, Some(session)) if state.is_connected() => Ok(session),
            (state, _) => Err(DriverError::InvalidState { operation, state }),
        }
    }

    fn error_flags(&self, descriptor: &CommandDescriptor, value: &Value) -> Result<D::Errors> {
        let code = integer(descriptor, value)?;
        u16::try_from(code)
            .map(<D::Errors as Flags>::from_bits_retain)
            .map_err(|_| protocol(descriptor, format!("error register {code} out of range")).into())
    }

    fn unit_from_value(
        &self,
        descriptor: &CommandDescriptor,
        value: &Value,
    ) -> std::result::Result<PressureUnit, DispatchError> {
        let code = value
            .as_integer()
            .ok_or_else(|| protocol(descriptor, format!("expected an integer, got {value:?}")))?;
        D::unit_from_code(code)
            .ok_or_else(|| protocol(descriptor, format!("unknown pressure unit code {code}")))
    }

    fn unit_code(&self, descriptor: &CommandDescriptor, unit: PressureUnit) -> Result<i64> {
        D::unit_code(unit).ok_or_else(|| {
            DispatchError::InvalidValue {
                name: descriptor.name,
                reason: format!("{} cannot be selected on the {}", unit, D::MODEL),
            }
            .into()
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> (DriverState, Option<Arc<Dispatcher>>) {
        let inner = self.lock();
        (inner.state, inner.session.clone())
    }

    fn set_disconnected(&self) {
        let mut inner = self.lock();
        inner.state = DriverState::Disconnected;
        inner.session = None;
    }

    /// Move to `next` if `session` is still the current one.
    fn advance(&self, session: &Arc<Dispatcher>, next: DriverState) {
        let mut inner = self.lock();
        if inner
            .session
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            tracing::debug!(model = D::MODEL, from = %inner.state, to = %next, "state change");
            inner.state = next;
        }
    }

    async fn fault(&self, session: &Arc<Dispatcher>, err: &DispatchError) {
        let faulted = {
            let mut inner = self.lock();
            let current = inner
                .session
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, session));
            if current {
                inner.state = DriverState::Faulted;
                inner.session.take()
            } else {
                None
            }
        };

        if let Some(session) = faulted {
            tracing::error!(
                model = D::MODEL,
                link = %session.endpoint(),
                error = %err,
                "link failed, driver faulted"
            );
            if let Err(close_err) = session.close().await {
                tracing::debug!(error = %close_err, "closing faulted session failed");
            }
        }
    }

    async fn abandon(&self, session: &Dispatcher) {
        self.set_disconnected();
        if let Err(err) = session.close().await {
            tracing::debug!(error = %err, "closing abandoned session failed");
        }
    }
}

impl<D: Device> fmt::Debug for Driver<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("model", &D::MODEL)
            .field("link", &self.connector.describe())
            .field("state", &self.state())
            .field("on_connect", &self.on_connect.is_some())
            .finish()
    }
}

fn integer(descriptor: &CommandDescriptor, value: &Value) -> Result<i64> {
    value
        .as_integer()
        .ok_or_else(|| protocol(descriptor, format!("expected an integer, got {value:?}")).into())
}

fn protocol(descriptor: &CommandDescriptor, message: String) -> DispatchError {
    DispatchError::Protocol {
        window: descriptor.window,
        message,
    }
}
