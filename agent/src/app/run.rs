//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::SyncError;
use crate::workers::{deployer, listener};

/// Run the site synchronizer until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SyncError> {
    info!("Initializing site synchronizer in {} mode...", options.mode.event_key());

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start synchronizer: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), SyncError> {
    let app_state = Arc::new(AppState::init(options).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_deployer_worker(
        options.deployer.clone(),
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    init_listener_worker(
        options.listener.clone(),
        app_state,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    Ok(())
}

fn init_listener_worker(
    options: listener::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SyncError> {
    info!("Initializing listener worker for {}...", app_state.pubsub.url());

    let listener_handle = tokio::spawn(async move {
        listener::run(
            &options,
            app_state.pubsub.as_ref(),
            app_state.normalizer.as_ref(),
            app_state.queue.as_ref(),
            app_state.stats.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_listener_worker_handle(listener_handle)
}

fn init_deployer_worker(
    options: deployer::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SyncError> {
    info!("Initializing deployer worker (every {:?})...", options.interval);

    let deployer_handle = tokio::spawn(async move {
        deployer::run(
            &options,
            app_state.queue.as_ref(),
            app_state.reconciler.as_ref(),
            app_state.notifier.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_deployer_worker_handle(deployer_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    listener_worker_handle: Option<JoinHandle<()>>,
    deployer_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            listener_worker_handle: None,
            deployer_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), SyncError> {
        if self.app_state.is_some() {
            return Err(SyncError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_listener_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), SyncError> {
        if self.listener_worker_handle.is_some() {
            return Err(SyncError::ShutdownError("listener_handle already set".to_string()));
        }
        self.listener_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_deployer_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), SyncError> {
        if self.deployer_worker_handle.is_some() {
            return Err(SyncError::ShutdownError("deployer_handle already set".to_string()));
        }
        self.deployer_worker_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), SyncError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), SyncError> {
        info!("Shutting down site synchronizer...");

        // 1. Stop accepting events
        if let Some(handle) = self.listener_worker_handle.take() {
            handle.await.map_err(|e| SyncError::ShutdownError(e.to_string()))?;
        }

        // 2. Let an in-flight drain finish
        if let Some(handle) = self.deployer_worker_handle.take() {
            handle.await.map_err(|e| SyncError::ShutdownError(e.to_string()))?;
        }

        // 3. App state
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
