fn main() {
    println!("Run `cargo test -p trayline-e2e` to execute the end-to-end scenarios.");
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use trayline_host::{Host, HostConfig, HostEvent};
    use trayline_menu::{ClickSlot, IdAllocator, Indicator};
    use trayline_notifier::{NotifierConfig, Publisher, SniBackend};
    use trayline_protocol::constants::{MENU_INTERFACE, MENU_PATH, member, prop};
    use trayline_protocol::proxy::StatusNotifierItemProxy;
    use trayline_protocol::testing::PrivateBus;
    use trayline_protocol::wire::error_name;
    use trayline_protocol::{ScrollDirection, Value};
    use zbus::{Connection, zvariant};

    fn notifier_config(title: &str) -> NotifierConfig {
        NotifierConfig {
            title: title.into(),
            ..NotifierConfig::default()
        }
    }

    async fn next(rx: &mut mpsc::Receiver<HostEvent>) -> HostEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for host event")
            .expect("event channel closed")
    }

    async fn item<'a>(shell: &Connection, publisher: &'a Publisher) -> StatusNotifierItemProxy<'a> {
        StatusNotifierItemProxy::builder(shell)
            .destination(publisher.service_name())
            .unwrap()
            .build()
            .await
            .unwrap()
    }

    async fn start_host(bus: &PrivateBus) -> Host {
        Host::start(bus.connect().await.unwrap(), HostConfig::default())
            .await
            .unwrap()
    }

    async fn start_backend(bus: &PrivateBus) -> Arc<SniBackend> {
        SniBackend::start(bus.connect().await.unwrap(), &notifier_config("App"))
            .await
            .unwrap()
    }

    fn unique(conn: &Connection) -> String {
        conn.unique_name().unwrap().to_string()
    }

    async fn menu_call(
        shell: &Connection,
        service: &str,
        method: &str,
        body: &(impl serde::Serialize + zvariant::Type),
    ) -> zbus::Message {
        shell
            .call_method(Some(service), MENU_PATH, Some(MENU_INTERFACE), method, body)
            .await
            .unwrap()
    }

    fn click(id: u32) -> (i32, &'static str, zvariant::Value<'static>, u32) {
        (id as i32, "clicked", zvariant::Value::from(""), 0)
    }

    #[tokio::test]
    async fn title_change_reaches_host_and_keeps_status() {
        let Some(bus) = PrivateBus::start().await else { return };
        let host = start_host(&bus).await;
        let mut events = host.take_events().unwrap();

        let publisher = Publisher::start(bus.connect().await.unwrap(), &notifier_config("App"))
            .await
            .unwrap();
        let sender = unique(publisher.connection());
        assert_eq!(
            next(&mut events).await,
            HostEvent::ItemRegistered {
                sender: sender.clone(),
                service: publisher.service_name().to_string(),
            }
        );

        let tracked = host.item(&sender).unwrap();
        assert_eq!(tracked.properties().title.get(), "App");
        assert_eq!(tracked.properties().status.get(), "Active");
        assert_eq!(tracked.properties().id.get(), publisher.service_name());

        publisher.set_title("App2");
        // Local write is visible before any round trip.
        assert_eq!(publisher.properties().title.get(), "App2");

        assert_eq!(
            next(&mut events).await,
            HostEvent::PropertiesUpdated {
                sender,
                changed: vec![prop::TITLE.to_string()],
            }
        );
        assert_eq!(tracked.properties().title.get(), "App2");
        assert_eq!(tracked.properties().status.get(), "Active");
    }

    #[tokio::test]
    async fn scroll_unsupported_until_handler_is_set() {
        let Some(bus) = PrivateBus::start().await else { return };
        let _host = start_host(&bus).await;
        let publisher = Publisher::start(bus.connect().await.unwrap(), &notifier_config("App"))
            .await
            .unwrap();
        let shell = bus.connect().await.unwrap();
        let item = item(&shell, &publisher).await;

        let err = item.scroll(5, "horizontal").await.unwrap_err();
        assert_eq!(
            error_name(&err).as_deref(),
            Some("org.freedesktop.DBus.Error.UnknownMethod")
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        publisher.on_scroll(move |direction| s.lock().unwrap().push(direction));

        item.scroll(5, "horizontal").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![ScrollDirection::Right]);
    }

    #[tokio::test]
    async fn second_activate_is_dropped_without_waiter() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = Publisher::start(bus.connect().await.unwrap(), &notifier_config("App"))
            .await
            .unwrap();
        let shell = bus.connect().await.unwrap();
        let item = item(&shell, &publisher).await;

        let slot = Arc::new(ClickSlot::new());
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let (s, o) = (Arc::clone(&slot), Arc::clone(&outcomes));
        publisher.on_activate(move |_, _| o.lock().unwrap().push(s.offer()));

        // The consumer reads exactly once, and is waiting before the first
        // activation fires.
        let consumer = slot.clicked();
        item.activate(0, 0).await.unwrap();
        item.activate(0, 0).await.unwrap();

        assert!(consumer.await);
        assert_eq!(*outcomes.lock().unwrap(), vec![true, false]);
        assert_eq!(slot.waiting(), 0);
    }

    #[test]
    fn concurrent_ids_are_unique() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;

        let ids = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..PER_THREAD).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            let batch = h.join().unwrap();
            // Increasing within each thread.
            assert!(batch.windows(2).all(|w| w[0] < w[1]));
            all.extend(batch);
        }
        assert_eq!(all.len(), THREADS * PER_THREAD);
    }

    #[tokio::test]
    async fn quit_unregisters_item_once() {
        let Some(bus) = PrivateBus::start().await else { return };
        let host = start_host(&bus).await;
        let mut events = host.take_events().unwrap();

        let backend = start_backend(&bus).await;
        let sender = unique(backend.publisher().connection());
        let service = backend.publisher().service_name().to_string();
        assert!(matches!(next(&mut events).await, HostEvent::ItemRegistered { .. }));

        let indicator = Indicator::new(backend.clone());
        let exits = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&exits);
        indicator
            .register(|| {}, move || {
                e.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let quitters: Vec<_> = (0..4)
            .map(|_| {
                let indicator = indicator.clone();
                thread::spawn(move || indicator.quit())
            })
            .collect();
        for q in quitters {
            q.join().unwrap();
        }
        assert_eq!(exits.load(Ordering::SeqCst), 1);

        assert_eq!(
            next(&mut events).await,
            HostEvent::ItemRemoved { sender: sender.clone(), service }
        );
        assert!(host.item(&sender).is_none());
    }

    #[tokio::test]
    async fn menu_click_from_shell_reaches_item() {
        let Some(bus) = PrivateBus::start().await else { return };
        let host = start_host(&bus).await;
        let mut events = host.take_events().unwrap();
        let backend = start_backend(&bus).await;
        let sender = unique(backend.publisher().connection());
        next(&mut events).await;

        let indicator = Indicator::new(backend.clone());
        let open = indicator.add_item("Open", "");
        assert_eq!(
            next(&mut events).await,
            HostEvent::MenuChanged {
                sender: sender.clone(),
                member: member::LAYOUT_UPDATED.to_string(),
            }
        );

        let shell = bus.connect().await.unwrap();
        let service = backend.publisher().service_name();
        let layout_args = (0i32, -1i32, Vec::<String>::new());
        let reply = menu_call(&shell, service, member::GET_LAYOUT, &layout_args).await;
        let body = reply.body();
        let fields: zvariant::Structure<'_> = body.deserialize().unwrap();
        let layout = Value::from_zvariant(&fields.fields()[1]);
        let children = layout.as_struct().unwrap()[2].as_array().unwrap();
        assert_eq!(children.len(), 1);

        let clicked = open.clicked();
        menu_call(&shell, service, member::EVENT, &click(open.id().get())).await;
        let delivered = tokio::time::timeout(Duration::from_secs(1), clicked)
            .await
            .unwrap();
        assert!(delivered);

        // Nobody waiting now: the click is dropped but the call succeeds.
        menu_call(&shell, service, member::EVENT, &click(open.id().get())).await;
    }

    #[tokio::test]
    async fn icon_reaches_host_as_argb() {
        let Some(bus) = PrivateBus::start().await else { return };
        let host = start_host(&bus).await;
        let mut events = host.take_events().unwrap();
        let backend = start_backend(&bus).await;
        let sender = unique(backend.publisher().connection());
        next(&mut events).await;

        let img = image::RgbaImage::from_raw(
            2,
            2,
            vec![
                255, 0, 0, 255, // red
                0, 255, 0, 128, // half-transparent green
                0, 0, 255, 255, // blue
                10, 20, 30, 0, // transparent
            ],
        )
        .unwrap();
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let indicator = Indicator::new(backend.clone());
        indicator.set_icon(&png.into_inner()).unwrap();
        assert_eq!(
            next(&mut events).await,
            HostEvent::PropertiesUpdated {
                sender: sender.clone(),
                changed: vec![prop::ICON_PIXMAP.to_string()],
            }
        );

        let pixmaps = host.item(&sender).unwrap().properties().icon_pixmap.get();
        assert_eq!(pixmaps.len(), 1);
        assert_eq!((pixmaps[0].width, pixmaps[0].height), (2, 2));
        assert_eq!(
            pixmaps[0].data,
            vec![
                255, 255, 0, 0, //
                128, 0, 255, 0, //
                255, 0, 0, 255, //
                0, 10, 20, 30,
            ]
        );
    }
}
