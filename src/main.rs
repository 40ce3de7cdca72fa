use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::bail;
use ice_server::{Config, Handler, Method, Response, RouteOptions, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let addr = cfg.server.listen_addr.clone();
    let mut server = Server::new(cfg);

    server.route(
        "/hello",
        RouteOptions::new(),
        Handler::sync(|_, resp| {
            resp.set_body("Hello world!");
            Ok(())
        }),
    )?;

    server.route(
        "/hello/:name",
        RouteOptions::new(),
        Handler::sync(|req, resp| {
            let name = req.param("name").unwrap_or("stranger");
            resp.set_body(format!("Hello {name}!"));
            Ok(())
        }),
    )?;

    server.route(
        "/boom",
        RouteOptions::new(),
        Handler::sync(|_, _| bail!("something went wrong")),
    )?;

    server.route(
        "/current_time",
        RouteOptions::new().methods(&[Method::GET, Method::POST]),
        Handler::suspendable(|_, mut resp| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
            resp.set_body(format!("{}\n", now.as_millis()));
            Ok::<_, anyhow::Error>(resp)
        }),
    )?;

    server.route(
        "/redirect",
        RouteOptions::new().blocking(),
        Handler::sync(|_, resp| {
            *resp = Response::redirect("/hello", 302)?;
            Ok(())
        }),
    )?;

    server.route(
        "/counter",
        RouteOptions::new().init_session(),
        Handler::sync(|req, resp| {
            let count = req
                .session_item("count")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
                + 1;
            req.set_session_item("count", &count.to_string());
            resp.set_body(format!("{count}\n"));
            Ok(())
        }),
    )?;

    tokio::select! {
        res = server.listen(&addr) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
