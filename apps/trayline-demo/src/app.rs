//! Wires a host, an item publisher and an indicator menu onto one bus.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use trayline_host::{Host, HostError};
use trayline_menu::{Indicator, ItemId, MenuItem};
use trayline_notifier::SniBackend;
use trayline_protocol::Status;
use trayline_protocol::proxy::StatusNotifierItemProxy;
use trayline_protocol::constants::{MENU_INTERFACE, MENU_PATH, member};
use zbus::{Connection, connection, zvariant};

use crate::config::Config;

/// Each participant gets its own connection, as separate processes would.
async fn connect(address: Option<&str>) -> zbus::Result<Connection> {
    match address {
        Some(address) => connection::Builder::address(address)?.build().await,
        None => Connection::session().await,
    }
}

/// Runs the demo until quit is clicked or SIGINT arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let address = config.bus_address.as_deref();

    // -- Host --
    // A desktop shell usually owns the watcher already; the item registers
    // with that one instead.
    let host = match Host::start(connect(address).await?, config.host.clone()).await {
        Ok(host) => Some(host),
        Err(HostError::Bus(zbus::Error::NameTaken)) => {
            tracing::info!("another watcher is running, not starting the host");
            None
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(mut events) = host.as_ref().and_then(Host::take_events) {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tracing::info!(?event, "host event");
            }
        });
    }

    // -- Item and menu --
    let backend = SniBackend::start(connect(address).await?, &config.notifier).await?;
    let indicator = Indicator::new(backend.clone());

    if let Some(path) = &config.icon_path {
        match std::fs::read(path) {
            Ok(bytes) => {
                if let Err(e) = indicator.set_icon(&bytes) {
                    tracing::warn!(path = %path.display(), "icon not usable: {e}");
                }
            }
            Err(e) => tracing::warn!(path = %path.display(), "failed to read icon: {e}"),
        }
    }
    indicator.set_tooltip(&config.notifier.title);

    backend.publisher().on_activate(|x, y| {
        tracing::info!(x, y, "tray icon activated");
    });

    let pause = indicator.add_checkbox_item("Pause", "Pause background work", false);
    let status = indicator.add_item("Status", "");
    status.disable();
    indicator.add_separator();
    let quit = indicator.add_item("Quit", "Quit the demo");

    indicator.register(
        || tracing::info!("indicator ready"),
        || tracing::info!("indicator exiting"),
    )?;
    indicator.mark_ready();

    tokio::spawn(toggle_pause(pause.clone(), status, backend.clone()));

    let quit_clicked = quit.clicked();
    let quit_cancel = cancel.clone();
    tokio::spawn(async move {
        if quit_clicked.await {
            tracing::info!("quit clicked");
            quit_cancel.cancel();
        }
    });

    if config.simulate_clicks {
        let shell = connect(address).await?;
        let service = backend.publisher().service_name().to_string();
        tokio::spawn(simulate_shell(shell, service, vec![pause.id(), pause.id(), quit.id()]));
    }

    tracing::info!("demo ready");

    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
    }

    // -- Graceful shutdown --
    indicator.quit();
    // Let the host observe the item going away.
    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Some(host) = host {
        host.shutdown();
    }
    Ok(())
}

async fn toggle_pause(pause: MenuItem, status: MenuItem, backend: Arc<SniBackend>) {
    while pause.clicked().await {
        if pause.checked() {
            pause.uncheck();
            status.set_title("Status: running");
            backend.publisher().set_status(Status::Active);
        } else {
            pause.check();
            status.set_title("Status: paused");
            backend.publisher().set_status(Status::Passive);
        }
    }
}

/// Acts as the shell: activates the icon, then clicks menu entries.
async fn simulate_shell(shell: Connection, service: String, clicks: Vec<ItemId>) {
    let activated = async {
        StatusNotifierItemProxy::builder(&shell)
            .destination(service.as_str())?
            .build()
            .await?
            .activate(0, 0)
            .await
    };
    if let Err(e) = activated.await {
        tracing::warn!("activate failed: {e}");
    }

    for id in clicks {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let Ok(raw) = i32::try_from(id.get()) else {
            continue;
        };
        let event = (raw, "clicked", zvariant::Value::from(""), 0u32);
        if let Err(e) = shell
            .call_method(
                Some(service.as_str()),
                MENU_PATH,
                Some(MENU_INTERFACE),
                member::EVENT,
                &event,
            )
            .await
        {
            tracing::warn!(id = %id, "menu click failed: {e}");
        }
    }
}
