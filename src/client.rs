//! One monitoring client session.
//!
//! [`MonitorClient`] wires the stream connection, the dispatcher pump, the
//! four stores, the subscriber registry and the command services together.
//! Everything it owns lives exactly as long as the client.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{HttpApi, MonitorApi};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::service::{AlertService, ChatService, PatientService};
use crate::store::Stores;
use crate::stream::{Connection, Dispatcher, SubscriberRegistry, Transport, WsTransport};

/// Client over the production transport and API.
pub type WsMonitorClient = MonitorClient<WsTransport, HttpApi>;

/// A client session: live stream plus stores plus commands.
#[derive(Debug)]
pub struct MonitorClient<T: Transport, A> {
    connection: Connection<T>,
    stores: Stores,
    registry: SubscriberRegistry,
    alerts: AlertService<A>,
    patients: PatientService<A>,
    chat: ChatService<A>,
    dispatcher: Dispatcher,
    frames: Mutex<Option<mpsc::Receiver<String>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorClient<WsTransport, HttpApi> {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the configuration is invalid, or
    /// the error of building the HTTP client.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = WsTransport::from_config(config);
        let api = HttpApi::from_config(config)?;
        Ok(Self::new(transport, api, config))
    }
}

impl<T: Transport, A: MonitorApi> MonitorClient<T, A> {
    /// Assembles a client over `transport` and `api`. Nothing connects until
    /// [`MonitorClient::start`].
    #[must_use]
    pub fn new(transport: T, api: A, config: &ClientConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.frame_buffer.max(1));
        let stores = Stores::new(config.vitals_history_limit);
        let registry = SubscriberRegistry::new();
        let api = Arc::new(api);

        Self {
            connection: Connection::new(transport, tx, config.reconnect_delay),
            alerts: AlertService::new(Arc::clone(&api), Arc::clone(&stores.alerts)),
            patients: PatientService::new(
                Arc::clone(&api),
                Arc::clone(&stores.patients),
                Arc::clone(&stores.vitals),
                config.vitals_history_limit,
            ),
            chat: ChatService::new(api, Arc::clone(&stores.chat)),
            dispatcher: Dispatcher::new(stores.clone(), registry.clone()),
            stores,
            registry,
            frames: Mutex::new(Some(rx)),
            pump: Mutex::new(None),
        }
    }

    /// Starts the dispatcher pump (once) and connects the stream. Calling it
    /// again after [`MonitorClient::shutdown`] reconnects.
    pub fn start(&self) {
        if let Some(frames) = self.frames.lock().take() {
            let pump = tokio::spawn(self.dispatcher.clone().run(frames));
            *self.pump.lock() = Some(pump);
        }
        self.connection.connect();
    }

    /// Disconnects the stream. Stores keep their contents.
    pub async fn shutdown(&self) {
        self.connection.disconnect().await;
    }

    /// Stream connection.
    #[must_use]
    pub fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    /// Domain stores.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Subscriber registry.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Alert commands.
    #[must_use]
    pub fn alerts(&self) -> &AlertService<A> {
        &self.alerts
    }

    /// Patient, vitals and risk-score commands.
    #[must_use]
    pub fn patients(&self) -> &PatientService<A> {
        &self.patients
    }

    /// Chat commands.
    #[must_use]
    pub fn chat(&self) -> &ChatService<A> {
        &self.chat
    }
}

impl<T: Transport, A> Drop for MonitorClient<T, A> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}
