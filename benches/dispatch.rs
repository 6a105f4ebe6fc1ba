//! Performance benchmarks for a3s-trackify
//!
//! Run with: cargo bench

use a3s_trackify::event::{Item, PageViewConfig, ViewCartConfig};
use a3s_trackify::{
    Dispatcher, DispatcherConfig, EnvironmentMode, Event, EventData, HostGlobals, NegotiatedEvent,
};
use criterion::{criterion_group, criterion_main, Criterion};

fn page_view() -> Event {
    Event::page_view(PageViewConfig {
        page_path: "home".to_string(),
        page_title: "Home".to_string(),
        currency: Some("USD".to_string()),
        ..Default::default()
    })
    .unwrap()
}

fn bench_event_creation(c: &mut Criterion) {
    c.bench_function("Event::page_view", |b| {
        b.iter(page_view);
    });

    c.bench_function("Event::standard (view_cart, 10 items)", |b| {
        b.iter(|| {
            Event::standard(EventData::ViewCart(ViewCartConfig {
                currency: "EUR".to_string(),
                value: 99.5,
                total_quantity: 10,
                items: (0..10).map(|i| Item::new(format!("sku-{}", i))).collect(),
                event_id: None,
            }))
            .unwrap()
        });
    });
}

fn bench_negotiation(c: &mut Criterion) {
    let event = Event::custom("promo_click", |driver| {
        (driver == "DebugServerDriver").then(|| {
            serde_json::json!({
                "event_name": "promo_click",
                "event_payload": {"id": "42"},
                "event_type": "form"
            })
        })
    })
    .unwrap();
    let custom = event.as_custom().unwrap().clone();

    c.bench_function("CustomEvent::negotiate", |b| {
        b.iter(|| custom.negotiate("DebugServerDriver").unwrap());
    });

    c.bench_function("NegotiatedEvent::parse", |b| {
        b.iter(|| {
            NegotiatedEvent::parse(
                "custom.promo_click",
                "DebugServerDriver",
                serde_json::json!({"event_name": "promo_click", "label": "Banner"}),
            )
            .unwrap()
        });
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let config = DispatcherConfig::with_drivers(["debug", "synerise"])
        .environment(EnvironmentMode::Server);
    let dispatcher = Dispatcher::from_config(config, HostGlobals::new()).unwrap();
    rt.block_on(dispatcher.preload());

    let event = page_view();
    c.bench_function("dispatch (loaded drivers)", |b| {
        b.to_async(&rt).iter(|| dispatcher.dispatch(&event));
    });

    c.bench_function("dispatch (cold dispatcher)", |b| {
        b.to_async(&rt).iter(|| async {
            let config = DispatcherConfig::with_drivers(["debug", "synerise"])
                .environment(EnvironmentMode::Server);
            let dispatcher = Dispatcher::from_config(config, HostGlobals::new()).unwrap();
            dispatcher.dispatch(&event).await
        });
    });
}

criterion_group!(benches, bench_event_creation, bench_negotiation, bench_dispatch);
criterion_main!(benches);
