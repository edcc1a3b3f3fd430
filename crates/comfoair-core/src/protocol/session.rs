//! Request queue
//!
//! The unit answers without any request identifier, so only one command may
//! be outstanding at a time. [`Session`] queues commands, runs them strictly
//! one after another on a single worker task and matches each decoded
//! message to the command at the head of the queue.
//!
//! Two timers bound every command: a short per-command timeout for the
//! reply, and a longer watchdog covering the whole time the command occupies
//! the queue. When the watchdog fires the transport is torn down and
//! reopened and every queued command is dropped.

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::codec::{framed, ComfoairCodec, Message};
use super::commands::{self, CommandDescriptor, CommandInfo};
use super::frame::{self, Frame};
use super::params::{Level, ParamValue, Params};
use super::serial::{Connector, SerialConnector};
use super::{
    ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_JOB_TIMEOUT_MS, DEFAULT_RECONNECT_DELAY_MS,
    DEFAULT_WATCHDOG_TIMEOUT_MS, MAX_QUEUE_SIZE,
};

/// Outcome of one queued command
pub type JobResult = Result<Message, ProtocolError>;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Report bare acknowledgements from the decoder
    pub pass_acks: bool,
    /// Time a command may wait for its reply
    pub job_timeout_ms: u64,
    /// Time a command may occupy the head of the queue
    pub watchdog_timeout_ms: u64,
    /// Settle time after a forced reconnect
    pub reconnect_delay_ms: u64,
    /// Maximum number of waiting commands
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            pass_acks: true,
            job_timeout_ms: DEFAULT_JOB_TIMEOUT_MS,
            watchdog_timeout_ms: DEFAULT_WATCHDOG_TIMEOUT_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            queue_capacity: MAX_QUEUE_SIZE,
        }
    }
}

impl SessionConfig {
    /// Default configuration for `port_name`
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Check that the watchdog backs up the per-command timeout
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.job_timeout_ms == 0 || self.job_timeout_ms >= self.watchdog_timeout_ms {
            return Err(ProtocolError::InvalidParameter {
                param: "job_timeout_ms".to_string(),
                message: format!(
                    "must be non-zero and below the watchdog timeout ({}ms)",
                    self.watchdog_timeout_ms
                ),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ProtocolError::InvalidParameter {
                param: "queue_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Per-command reply timeout
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    /// Queue watchdog timeout
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    /// Grace period after a forced reconnect
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Accepting commands
    Open,
    /// Transport torn down after a stall, waiting to reopen
    Draining,
    /// Closed by the caller
    Closed,
}

/// Notifications broadcast by a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Transport opened
    Open,
    /// Transport closed
    Close,
    /// Transport or session level failure, or the result of a command
    /// submitted without its own completion
    Error(Arc<ProtocolError>),
    /// Reply to a command submitted without its own completion
    Data(Message),
}

/// How the result of a queued command is delivered
pub enum Completion {
    /// Broadcast as [`SessionEvent::Data`] or [`SessionEvent::Error`]
    Event,
    /// Invoke a callback on the worker task
    Callback(Box<dyn FnOnce(JobResult) + Send + 'static>),
    /// Send through a oneshot channel
    Channel(oneshot::Sender<JobResult>),
}

impl Completion {
    /// Invoke `f` with the result
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(JobResult) + Send + 'static,
    {
        Completion::Callback(Box::new(f))
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Event => f.write_str("Event"),
            Completion::Callback(_) => f.write_str("Callback"),
            Completion::Channel(_) => f.write_str("Channel"),
        }
    }
}

/// Fan levels for `setVentilationLevel`, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VentilationLevels {
    /// Exhaust fan, away
    pub exhaust_away: u8,
    /// Exhaust fan, low
    pub exhaust_low: u8,
    /// Exhaust fan, middle
    pub exhaust_middle: u8,
    /// Exhaust fan, high
    pub exhaust_high: u8,
    /// Supply fan, away
    pub supply_away: u8,
    /// Supply fan, low
    pub supply_low: u8,
    /// Supply fan, middle
    pub supply_middle: u8,
    /// Supply fan, high
    pub supply_high: u8,
}

impl VentilationLevels {
    /// Arguments for `setVentilationLevel`
    pub fn to_params(&self) -> Params {
        [
            ("exhaustAway", self.exhaust_away),
            ("exhaustLow", self.exhaust_low),
            ("exhaustMiddle", self.exhaust_middle),
            ("exhaustHigh", self.exhaust_high),
            ("supplyAway", self.supply_away),
            ("supplyLow", self.supply_low),
            ("supplyMiddle", self.supply_middle),
            ("supplyHigh", self.supply_high),
        ]
        .into_iter()
        .map(|(name, level)| (name.to_string(), ParamValue::from(level)))
        .collect()
    }
}

/// Flags for the `reset` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResetOptions {
    /// Clear stored faults
    pub reset_faults: bool,
    /// Restore factory settings
    pub reset_settings: bool,
    /// Start the self test
    pub run_self_test: bool,
    /// Reset the filter operating hours
    pub reset_filter_timer: bool,
}

impl ResetOptions {
    /// Arguments for `reset`
    pub fn to_params(&self) -> Params {
        [
            ("resetFaults", self.reset_faults),
            ("resetSettings", self.reset_settings),
            ("runSelfTest", self.run_self_test),
            ("resetFilterTimer", self.reset_filter_timer),
        ]
        .into_iter()
        .map(|(name, flag)| (name.to_string(), ParamValue::from(flag)))
        .collect()
    }
}

/// One queued command
struct Job {
    command: &'static CommandDescriptor,
    frame: Frame,
    completion: Completion,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the session handle and its worker
struct Shared {
    config: SessionConfig,
    // Lock order: state before queue
    state: Mutex<SessionState>,
    queue: Mutex<VecDeque<Job>>,
    wake: Notify,
    events: broadcast::Sender<SessionEvent>,
}

impl Shared {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn pop_job(&self) -> Option<Job> {
        lock(&self.queue).pop_front()
    }

    /// Drop every waiting job without completing it
    fn discard_queue(&self) -> usize {
        let discarded: Vec<Job> = lock(&self.queue).drain(..).collect();
        discarded.len()
    }

    fn deliver(&self, completion: Completion, result: JobResult) {
        match completion {
            Completion::Event => match result {
                Ok(message) => self.emit(SessionEvent::Data(message)),
                Err(e) => self.emit(SessionEvent::Error(Arc::new(e))),
            },
            Completion::Callback(f) => f(result),
            Completion::Channel(tx) => {
                // The caller may have stopped waiting
                let _ = tx.send(result);
            }
        }
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Single-flight command channel to one ventilation unit
///
/// Must be created inside a tokio runtime.
pub struct Session<C: Connector = SerialConnector> {
    shared: Arc<Shared>,
    connector: Arc<C>,
    worker: Mutex<Option<Worker>>,
}

impl Session<SerialConnector> {
    /// Open a session on the configured serial port
    pub fn serial(config: SessionConfig) -> Result<Self, ProtocolError> {
        let connector = SerialConnector::new(config.port_name.clone(), Some(config.baud_rate));
        Self::new(config, connector)
    }
}

impl<C: Connector> Session<C> {
    /// Create a session and start its worker
    ///
    /// The transport is opened by the worker; success or failure is
    /// reported as [`SessionEvent::Open`] or [`SessionEvent::Error`].
    pub fn new(config: SessionConfig, connector: C) -> Result<Self, ProtocolError> {
        config.validate()?;
        let (events, _) = broadcast::channel(64);
        let session = Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(SessionState::Open),
                queue: Mutex::new(VecDeque::new()),
                wake: Notify::new(),
                events,
            }),
            connector: Arc::new(connector),
            worker: Mutex::new(None),
        };
        session.spawn_worker();
        Ok(session)
    }

    fn spawn_worker(&self) {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            self.shared.clone(),
            self.connector.clone(),
            cancel.clone(),
        ));
        *lock(&self.worker) = Some(Worker { cancel, handle });
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    /// Number of commands waiting behind the one in flight
    pub fn queue_len(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    /// Receive session events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Catalog of all commands the session understands
    pub fn list_available_commands(&self) -> Vec<CommandInfo> {
        commands::catalog()
    }

    /// Queue command `name`
    ///
    /// Never touches the transport. Fails immediately if the session is
    /// closed or reconnecting, the command is unknown, its parameters do
    /// not encode, or the queue is full.
    pub fn enqueue(
        &self,
        name: &str,
        params: Params,
        completion: Completion,
    ) -> Result<(), ProtocolError> {
        let state = lock(&self.shared.state);
        match *state {
            SessionState::Closed => return Err(ProtocolError::Closed),
            SessionState::Draining => return Err(ProtocolError::Reconnecting),
            SessionState::Open => {}
        }

        let command =
            commands::by_name(name).ok_or_else(|| ProtocolError::UnknownCommand(name.to_string()))?;
        let frame = frame::build(name, &params)?;

        let mut queue = lock(&self.shared.queue);
        let capacity = self.shared.config.queue_capacity;
        if queue.len() >= capacity {
            warn!(command = name, capacity, "queue full, rejecting command");
            return Err(ProtocolError::QueueFull {
                capacity,
                command: name.to_string(),
            });
        }
        queue.push_back(Job {
            command,
            frame,
            completion,
        });
        drop(queue);
        drop(state);

        trace!(command = name, "queued");
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Queue a command and wait for its result
    ///
    /// Resolves to [`ProtocolError::Abandoned`] if the command is dropped by
    /// a reconnect or by [`close`](Self::close).
    pub async fn request(&self, name: &str, params: Params) -> JobResult {
        let (tx, rx) = oneshot::channel();
        self.enqueue(name, params, Completion::Channel(tx))?;
        rx.await.unwrap_or(Err(ProtocolError::Abandoned))
    }

    /// Queue a command whose result is broadcast as an event
    pub fn submit(&self, name: &str, params: Params) -> Result<(), ProtocolError> {
        self.enqueue(name, params, Completion::Event)
    }

    /// Close the transport and stop the worker
    ///
    /// Waiting commands are dropped. Completes once the transport is
    /// released.
    pub async fn close(&self) {
        let worker = {
            let mut state = lock(&self.shared.state);
            *state = SessionState::Closed;
            let discarded = self.shared.discard_queue();
            if discarded > 0 {
                debug!(discarded, "dropping queued commands on close");
            }
            lock(&self.worker).take()
        };

        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                warn!("session worker ended abnormally: {}", e);
            }
        }
    }

    /// Reopen a closed session
    pub fn open(&self) {
        {
            let mut state = lock(&self.shared.state);
            if *state != SessionState::Closed {
                return;
            }
            *state = SessionState::Open;
        }
        self.spawn_worker();
    }

    /// Run command `name` and wait for its result
    pub async fn run_command(&self, name: &str, params: Params) -> JobResult {
        self.request(name, params).await
    }

    /// Query the bootloader version
    pub async fn get_bootloader_version(&self) -> JobResult {
        self.request("getBootloaderVersion", Params::new()).await
    }

    /// Query the firmware version
    pub async fn get_firmware_version(&self) -> JobResult {
        self.request("getFirmwareVersion", Params::new()).await
    }

    /// Query bypass and preheat flaps
    pub async fn get_flap_state(&self) -> JobResult {
        self.request("getFlapState", Params::new()).await
    }

    /// Query fan speeds
    pub async fn get_fan_state(&self) -> JobResult {
        self.request("getFanState", Params::new()).await
    }

    /// Query the bypass controller
    pub async fn get_bypass_controller_state(&self) -> JobResult {
        self.request("getBypassControllerState", Params::new()).await
    }

    /// Query operating hours
    pub async fn get_operating_hours(&self) -> JobResult {
        self.request("getOperatingHours", Params::new()).await
    }

    /// Query configured and current fan levels
    pub async fn get_ventilation_level(&self) -> JobResult {
        self.request("getVentilationLevel", Params::new()).await
    }

    /// Query temperatures
    pub async fn get_temperatures(&self) -> JobResult {
        self.request("getTemperatures", Params::new()).await
    }

    /// Query temperature sensor states
    pub async fn get_temperature_states(&self) -> JobResult {
        self.request("getTemperatureStates", Params::new()).await
    }

    /// Query operating faults
    pub async fn get_faults(&self) -> JobResult {
        self.request("getFaults", Params::new()).await
    }

    /// Select the ventilation level
    pub async fn set_level(&self, level: Level) -> JobResult {
        let params = [("level".to_string(), ParamValue::from(level))].into();
        self.request("setLevel", params).await
    }

    /// Set the comfort temperature in °C
    pub async fn set_comfort_temperature(&self, temperature: f64) -> JobResult {
        let params = [("temperature".to_string(), ParamValue::from(temperature))].into();
        self.request("setComfortTemperature", params).await
    }

    /// Configure the fan percentages per level
    pub async fn set_ventilation_level(&self, levels: VentilationLevels) -> JobResult {
        self.request("setVentilationLevel", levels.to_params()).await
    }

    /// Reset faults or settings, or run the self test
    pub async fn reset(&self, options: ResetOptions) -> JobResult {
        self.request("reset", options.to_params()).await
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        if let Some(worker) = lock(&self.worker).take() {
            worker.cancel.cancel();
        }
    }
}

type Link<C> = Framed<<C as Connector>::Stream, ComfoairCodec>;

fn connect<C: Connector>(shared: &Shared, connector: &C) -> Option<Link<C>> {
    match connector.connect() {
        Ok(stream) => {
            info!("transport open");
            shared.emit(SessionEvent::Open);
            Some(framed(stream, shared.config.pass_acks))
        }
        Err(e) => {
            warn!("failed to open transport: {}", e);
            shared.emit(SessionEvent::Error(Arc::new(e)));
            None
        }
    }
}

fn disconnect<C: Connector>(shared: &Shared, link: &mut Option<Link<C>>) {
    if link.take().is_some() {
        info!("transport closed");
        shared.emit(SessionEvent::Close);
    }
}

/// Worker task: owns the transport and runs queued jobs one at a time
async fn run<C: Connector>(shared: Arc<Shared>, connector: Arc<C>, cancel: CancellationToken) {
    let mut link = connect(&shared, &*connector);

    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = next_job::<C>(&shared, &mut link) => job,
        };

        let name = job.command.name;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = tokio::time::timeout(
                shared.config.watchdog_timeout(),
                execute(&shared, &*connector, &mut link, job),
            ) => outcome,
        };

        if outcome.is_err() {
            warn!(command = name, "watchdog expired, reconnecting");
            if !recover(&shared, &*connector, &mut link, &cancel).await {
                break;
            }
        }
    }

    disconnect::<C>(&shared, &mut link);
    debug!("session worker stopped");
}

/// Wait for the next job, discarding anything the unit sends meanwhile
async fn next_job<C: Connector>(shared: &Shared, link: &mut Option<Link<C>>) -> Job {
    loop {
        if let Some(job) = shared.pop_job() {
            return job;
        }

        let received = match link.as_mut() {
            Some(framed) => tokio::select! {
                _ = shared.wake.notified() => None,
                message = framed.next() => Some(message),
            },
            None => {
                shared.wake.notified().await;
                None
            }
        };

        match received {
            None => {}
            Some(Some(Ok(message))) => debug!(?message, "discarding unsolicited message"),
            Some(Some(Err(e))) => {
                warn!("transport error: {}", e);
                shared.emit(SessionEvent::Error(Arc::new(e)));
                disconnect::<C>(shared, link);
            }
            Some(None) => disconnect::<C>(shared, link),
        }
    }
}

/// Run one job to completion and deliver its result
async fn execute<C: Connector>(
    shared: &Shared,
    connector: &C,
    link: &mut Option<Link<C>>,
    job: Job,
) {
    let Job {
        command,
        frame,
        completion,
    } = job;

    if link.is_none() {
        *link = connect(shared, connector);
    }

    let result = match link.as_mut() {
        Some(framed) => exchange(framed, command, frame, shared.config.job_timeout()).await,
        None => Err(ProtocolError::NotConnected),
    };

    match &result {
        Ok(message) => debug!(command = command.name, ack = message.is_ack(), "command complete"),
        Err(ProtocolError::Timeout { .. }) => warn!(command = command.name, "command timed out"),
        Err(ProtocolError::IoError(e)) => {
            warn!(command = command.name, "transport error: {}", e);
            disconnect::<C>(shared, link);
        }
        Err(ProtocolError::NotConnected) => disconnect::<C>(shared, link),
        Err(e) => debug!(command = command.name, "command failed: {}", e),
    }

    shared.deliver(completion, result);
}

/// Send one frame and wait for the message that completes it
async fn exchange<S>(
    framed: &mut Framed<S, ComfoairCodec>,
    command: &CommandDescriptor,
    frame: Frame,
    timeout: Duration,
) -> JobResult
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    framed.send(frame).await?;

    let reply = async {
        loop {
            match framed.next().await {
                // A query is only answered by its data frame
                Some(Ok(Message::Ack)) if command.expects_response() => {
                    trace!(command = command.name, "ack received, waiting for data");
                }
                Some(Ok(message)) => return Ok(message),
                Some(Err(e)) => return Err(e),
                None => return Err(ProtocolError::NotConnected),
            }
        }
    };

    tokio::time::timeout(timeout, reply)
        .await
        .unwrap_or_else(|_| {
            Err(ProtocolError::Timeout {
                command: command.name.to_string(),
            })
        })
}

/// Tear down and replace the transport after a stall
///
/// Returns `false` if the session was closed meanwhile.
async fn recover<C: Connector>(
    shared: &Shared,
    connector: &C,
    link: &mut Option<Link<C>>,
    cancel: &CancellationToken,
) -> bool {
    {
        let mut state = lock(&shared.state);
        if *state == SessionState::Closed {
            return false;
        }
        *state = SessionState::Draining;
    }

    shared.emit(SessionEvent::Error(Arc::new(ProtocolError::QueueStall {
        timeout_ms: shared.config.watchdog_timeout_ms,
    })));
    disconnect::<C>(shared, link);

    let discarded = shared.discard_queue();
    if discarded > 0 {
        warn!(discarded, "dropping queued commands after stall");
    }

    *link = connect(shared, connector);

    tokio::select! {
        _ = cancel.cancelled() => return false,
        _ = tokio::time::sleep(shared.config.reconnect_delay()) => {}
    }

    let mut state = lock(&shared.state);
    if *state == SessionState::Draining {
        *state = SessionState::Open;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.queue_capacity, 30);
        assert!(config.pass_acks);
        assert!(config.job_timeout() < config.watchdog_timeout());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_config_validation() {
        let config = SessionConfig {
            job_timeout_ms: 5000,
            watchdog_timeout_ms: 5000,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ProtocolError::InvalidParameter { .. })
        ));

        let config = SessionConfig {
            queue_capacity: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_config_from_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "port_name": "/dev/ttyUSB0", "pass_acks": false }"#)
                .unwrap();
        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert!(!config.pass_acks);
        assert_eq!(config.job_timeout_ms, DEFAULT_JOB_TIMEOUT_MS);
    }

    #[test]
    fn test_ventilation_levels_params() {
        let levels = VentilationLevels {
            exhaust_high: 90,
            supply_away: 15,
            ..VentilationLevels::default()
        };
        let params = levels.to_params();
        assert_eq!(params.len(), 8);
        assert_eq!(params["exhaustHigh"], ParamValue::Int(90));
        assert_eq!(params["supplyAway"], ParamValue::Int(15));
        let frame = frame::build("setVentilationLevel", &params).unwrap();
        assert_eq!(frame.data(), &[0, 0, 0, 90, 15, 0, 0, 0]);
    }

    #[test]
    fn test_reset_options_params() {
        let options = ResetOptions {
            run_self_test: true,
            ..ResetOptions::default()
        };
        let frame = frame::build("reset", &options.to_params()).unwrap();
        assert_eq!(frame.data(), &[0, 0, 1, 0]);
    }

    #[test]
    fn test_deliver_event_mode() {
        let (events, mut rx) = broadcast::channel(4);
        let shared = Shared {
            config: SessionConfig::default(),
            state: Mutex::new(SessionState::Open),
            queue: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            events,
        };

        shared.deliver(Completion::Event, Ok(Message::Ack));
        shared.deliver(Completion::Event, Err(ProtocolError::Closed));

        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Data(Message::Ack))));
        match rx.try_recv() {
            Ok(SessionEvent::Error(e)) => assert!(matches!(*e, ProtocolError::Closed)),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
