/// Chat session - owns the transport, store, composer and uploader for one
/// logged-in user and drives the room lifecycle.
///
/// Room entry order: open a store epoch, subscribe the live handler, join, then
/// fetch history. Live events arriving during the fetch are held by the store
/// until the history page lands.
///
/// Once the transport comes back from an interruption the session fetches the
/// room history again and merges what it missed.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{Message, User, RECEIVE_MESSAGE};
use crate::services::upload_service::{MediaAsset, UploadResult, UploadService};
use crate::services::{ConnectionState, MessageComposer, MessageStore, ServerClient, WebSocketManager};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct ChatSession {
    config: ClientConfig,
    server_client: Arc<ServerClient>,
    transport: WebSocketManager,
    store: MessageStore,
    composer: MessageComposer,
    uploader: UploadService,
    resync: Option<JoinHandle<()>>,
}

impl ChatSession {
    /// Log in and start a session in the configured room
    pub async fn login(config: ClientConfig, username: &str, password: &str) -> Result<Self> {
        let server_client = Arc::new(ServerClient::new(&config)?);
        let user = server_client.login(username, password).await?;
        Self::start_with(config, user, server_client).await
    }

    /// Connect the transport for an already authenticated user and enter the configured room
    pub async fn start(config: ClientConfig, user: User) -> Result<Self> {
        let server_client = Arc::new(ServerClient::new(&config)?);
        Self::start_with(config, user, server_client).await
    }

    async fn start_with(
        config: ClientConfig,
        user: User,
        server_client: Arc<ServerClient>,
    ) -> Result<Self> {
        let transport = WebSocketManager::new(config.ws_url()?, config.reconnect.clone());

        let mut session = ChatSession {
            composer: MessageComposer::new(user, transport.clone()),
            uploader: UploadService::new(server_client.clone()),
            store: MessageStore::new(),
            server_client,
            transport,
            config,
            resync: None,
        };

        session.transport.connect().await?;
        let room = session.config.room.clone();
        if let Err(e) = session.enter_room(&room).await {
            session.transport.disconnect().await;
            return Err(e);
        }

        session.resync = Some(session.spawn_resync());
        Ok(session)
    }

    /// Watch the transport and fill the gap left by each interruption
    fn spawn_resync(&self) -> JoinHandle<()> {
        let mut states = self.transport.watch_state();
        let store = self.store.clone();
        let server_client = self.server_client.clone();

        tokio::spawn(async move {
            let mut interrupted = false;
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                match state {
                    ConnectionState::Reconnecting { .. } | ConnectionState::Disconnected => {
                        interrupted = true;
                    }
                    ConnectionState::Connected { room: Some(room) } if interrupted => {
                        interrupted = false;
                        Self::resync(&store, &server_client, &room).await;
                    }
                    _ => {}
                }
            }
        })
    }

    async fn resync(store: &MessageStore, server_client: &ServerClient, room: &str) {
        let epoch = store.current_epoch();
        if store.room().as_deref() != Some(room) || !store.begin_resync(epoch) {
            return;
        }

        let history = match server_client.fetch_history(room).await {
            Ok(history) => history.into_iter().filter(Message::is_well_formed).collect(),
            Err(e) => {
                log::warn!("History refetch for {} after reconnect failed: {}", room, e);
                Vec::new()
            }
        };
        store.merge_history_for(epoch, history);
    }

    /// Enter `room`, replacing whatever room the session was in
    pub async fn enter_room(&self, room: &str) -> Result<()> {
        let epoch = self.store.begin_room(room);

        let store = self.store.clone();
        self.transport.subscribe(RECEIVE_MESSAGE, move |message: Message| {
            if !message.is_well_formed() {
                log::warn!("Dropping malformed {} message from {}", message.kind, message.sender_name);
                return;
            }
            store.apply_incoming_for(epoch, message);
        });

        self.transport.join_room(room).await?;

        match self.server_client.fetch_history(room).await {
            Ok(history) => {
                let history = history.into_iter().filter(Message::is_well_formed).collect();
                self.store.load_history_for(epoch, history);
                log::info!("Entered room {} with {} messages", room, self.store.len());
                Ok(())
            }
            Err(e) => {
                // Keep live delivery flowing even without a backlog
                log::error!("History fetch for {} failed: {}", room, e);
                self.store.load_history_for(epoch, Vec::new());
                Err(e)
            }
        }
    }

    /// Send a text message; blank input is ignored
    pub async fn submit_text(&self, text: &str) -> Result<()> {
        match self.composer.submit_text(text).await {
            Err(ClientError::EmptySubmission) => {
                log::debug!("Ignoring empty submission");
                Ok(())
            }
            other => other,
        }
    }

    /// Upload a picked asset, then send it as a media message.
    /// Nothing is sent when the upload fails.
    pub async fn submit_asset(&self, asset: &MediaAsset) -> Result<UploadResult> {
        let upload = self.uploader.upload(asset).await?;
        self.composer.submit_media(&upload).await?;
        Ok(upload)
    }

    /// Leave the room and release the connection
    pub async fn logout(&self) {
        if let Some(task) = &self.resync {
            task.abort();
        }
        self.transport.disconnect().await;
        self.store.clear();
        log::info!("Logged out {}", self.user().username);
    }

    pub fn user(&self) -> &User {
        self.composer.user()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current ordered message list
    pub fn messages(&self) -> Vec<Message> {
        self.store.snapshot()
    }

    /// Ordered message list after every change
    pub fn watch_messages(&self) -> watch::Receiver<Vec<Message>> {
        self.store.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.transport.watch_state()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn transport(&self) -> &WebSocketManager {
        &self.transport
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(task) = self.resync.take() {
            task.abort();
        }
        // The transport's I/O tasks keep their own handles, so close it explicitly
        if self.transport.state() == ConnectionState::Disconnected {
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let transport = self.transport.clone();
            runtime.spawn(async move { transport.disconnect().await });
        }
    }
}
