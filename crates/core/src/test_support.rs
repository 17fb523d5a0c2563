//! Helpers shared by unit tests that talk HTTP to an in-process server.

use axum::Router;
use std::net::SocketAddr;

/// Serve `router` on an ephemeral local port and return its address.
pub(crate) async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server should run");
    });
    addr
}
