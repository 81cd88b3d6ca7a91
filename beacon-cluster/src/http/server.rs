//! HTTP server setup and connection handling.

use super::ClusterHandle;
use super::router;
use crate::error::ClusterResult;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// HTTP control plane for one node.
pub struct ControlPlaneServer<H: ?Sized> {
    /// Bound listener.
    listener: TcpListener,
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    /// Cluster capabilities exposed over HTTP.
    handle: Arc<H>,
}

impl<H: ClusterHandle + ?Sized> ControlPlaneServer<H> {
    /// Bind the listener.
    ///
    /// An address that cannot be bound is reported here, before any request
    /// is served.
    pub async fn bind(addr: &str, handle: Arc<H>) -> ClusterResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            handle,
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> ClusterResult<()> {
        tokio::pin!(shutdown);

        tracing::info!(addr = %self.local_addr, "HTTP control plane started");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, remote_addr) = result?;

                    let io = TokioIo::new(stream);
                    let handle = Arc::clone(&self.handle);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let handle = Arc::clone(&handle);
                            async move { router::route(req, handle).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            if !e.is_incomplete_message() {
                                tracing::warn!(
                                    remote = %remote_addr,
                                    error = %e,
                                    "HTTP connection error"
                                );
                            }
                        }
                    });
                }
                _ = &mut shutdown => {
                    tracing::info!(addr = %self.local_addr, "HTTP control plane shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run the server on a background task.
    pub fn spawn(self) -> RunningControlPlane {
        let local_addr = self.local_addr;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = self.run(shutdown).await {
                tracing::error!(error = %e, "HTTP control plane failed");
            }
        });

        RunningControlPlane {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

/// A control plane serving on a background task.
pub struct RunningControlPlane {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RunningControlPlane {
    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "HTTP control plane task ended abnormally");
        }
    }
}

impl Drop for RunningControlPlane {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
