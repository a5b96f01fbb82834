//! Shared utilities for integration testing.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use url::Url;

use rewriting_proxy::config::ProxyConfig;
use rewriting_proxy::http::HttpServer;
use rewriting_proxy::lifecycle::Shutdown;
use rewriting_proxy::UrlRewriter;

/// Serve `app` as a pretend target site on an ephemeral port.
pub async fn start_upstream(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start the proxy on an ephemeral port after applying `configure`.
pub async fn start_proxy<F>(configure: F) -> (SocketAddr, Shutdown)
where
    F: FnOnce(&mut ProxyConfig),
{
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.static_files.enabled = false;
    config.upstream.use_system_proxy = false;
    configure(&mut config);

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// A port nothing is listening on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Absolute proxy URL that fetches `target` through the proxy at `proxy`.
pub fn via_proxy(proxy: SocketAddr, target: &str) -> String {
    let rewriter = UrlRewriter::new("/proxy");
    format!("http://{}{}", proxy, rewriter.proxied(&Url::parse(target).unwrap()))
}

/// Client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
