mod common;

use std::sync::Arc;

use common::{card_ids, fields, landlord, listings, tenant, FlakyGateway, Shell, LANDLORD, TENANT};
use dorm_core::{
    ActorId, CoreConfig, Destination, Event, InMemoryGateway, Listing, ListingFilter, ListingId,
    Model, SyncGateway, ToastKind, UnixTimeMs,
};

#[tokio::test]
async fn failed_delete_restores_order_and_shows_notice() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A", "B", "C"])));
    let mut shell = Shell::mounted(landlord(), gateway.clone()).await;

    gateway.set_fail_writes(true);
    shell
        .send(Event::DeleteRequested {
            id: ListingId::new("B"),
        })
        .await;

    let view = shell.view();
    assert_eq!(card_ids(&view), ["A", "B", "C"]);
    let error = view.error.as_ref().expect("delete failure is surfaced");
    assert_eq!(error.error_code, "NETWORK_ERROR");
    assert!(error.is_transient);
    assert!(view.listings.iter().all(|c| !c.is_busy));

    shell.send(Event::NoticeDismissed).await;
    assert!(shell.view().error.is_none());
    assert_eq!(gateway.inner.len().await, 3);
}

#[tokio::test]
async fn successful_delete_removes_card_on_both_sides() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A", "B", "C"])));
    let mut shell = Shell::mounted(landlord(), gateway.clone()).await;

    shell
        .send(Event::DeleteRequested {
            id: ListingId::new("A"),
        })
        .await;

    let view = shell.view();
    assert_eq!(card_ids(&view), ["B", "C"]);
    assert_eq!(view.toast.as_ref().map(|t| t.kind), Some(ToastKind::ListingDeleted));
    assert_eq!(gateway.inner.len().await, 2);

    let metrics = shell.model.mutator().metrics();
    assert_eq!(metrics.committed, 1);
    assert_eq!(metrics.rolled_back, 0);
}

#[tokio::test]
async fn pending_delete_hides_the_card_and_blocks_a_second_action() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A", "B"])));
    let mut shell = Shell::mounted(landlord(), gateway.clone()).await;
    let a = ListingId::new("A");

    shell.send_held(Event::DeleteRequested { id: a.clone() }).await;
    assert_eq!(card_ids(&shell.view()), ["B"]);

    shell.send(Event::DeleteRequested { id: a }).await;
    let view = shell.view();
    assert_eq!(
        view.error.as_ref().unwrap().error_code,
        "CONCURRENT_MUTATION_REJECTED"
    );
    assert_eq!(shell.held.len(), 1);

    shell.release().await;
    assert_eq!(card_ids(&shell.view()), ["B"]);
    assert_eq!(gateway.writes(), 1);
}

#[tokio::test]
async fn refresh_during_failed_delete_keeps_the_favorite() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A", "B"])));
    let mut shell = Shell::mounted(landlord(), gateway.clone()).await;
    let a = ListingId::new("A");

    shell.send(Event::FavoriteToggled { id: a.clone() }).await;
    assert!(shell.view().listings[0].is_favorite);

    gateway.set_fail_writes(true);
    shell.send_held(Event::DeleteRequested { id: a.clone() }).await;
    shell.send(Event::RefreshRequested).await;
    assert_eq!(card_ids(&shell.view()), ["B"]);

    shell.release().await;
    let view = shell.view();
    assert_eq!(card_ids(&view), ["A", "B"]);
    assert!(view.listings[0].is_favorite);
    assert!(shell.model.mutator().store().is_favorite(&a));
    assert_eq!(view.error.as_ref().unwrap().error_code, "NETWORK_ERROR");
}

#[tokio::test]
async fn tenant_cannot_delete_landlord_listing() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A"])));
    let mut shell = Shell::mounted(tenant(), gateway.clone()).await;

    shell
        .send(Event::DeleteRequested {
            id: ListingId::new("A"),
        })
        .await;

    let view = shell.view();
    assert_eq!(view.error.as_ref().unwrap().error_code, "FORBIDDEN");
    assert_eq!(card_ids(&view), ["A"]);
    assert_eq!(gateway.writes(), 0);
}

#[tokio::test]
async fn tenant_toggles_favorite_and_back() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A", "B"])));
    let mut shell = Shell::mounted(tenant(), gateway.clone()).await;
    let a = ListingId::new("A");
    let actor = ActorId::new(TENANT);

    shell.send(Event::FavoriteToggled { id: a.clone() }).await;
    let view = shell.view();
    assert!(view.listings[0].is_favorite);
    assert!(!view.listings[1].is_favorite);
    assert_eq!(gateway.inner.fetch_relations(&actor).await.unwrap().len(), 1);

    shell.send(Event::FavoriteToggled { id: a }).await;
    assert!(!shell.view().listings[0].is_favorite);
    assert!(gateway.inner.fetch_relations(&actor).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_favorite_toggle_rolls_back() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A"])));
    let mut shell = Shell::mounted(tenant(), gateway.clone()).await;

    gateway.set_fail_writes(true);
    shell
        .send(Event::FavoriteToggled {
            id: ListingId::new("A"),
        })
        .await;

    let view = shell.view();
    assert!(!view.listings[0].is_favorite);
    assert_eq!(view.error.as_ref().unwrap().error_code, "NETWORK_ERROR");
}

#[tokio::test]
async fn favorites_are_seeded_on_mount() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A", "B"])));
    gateway
        .inner
        .toggle_relation(&ActorId::new(TENANT), &ListingId::new("B"), true)
        .await
        .unwrap();

    let shell = Shell::mounted(tenant(), gateway).await;

    let view = shell.view();
    let favorites: Vec<_> = view
        .listings
        .iter()
        .filter(|c| c.is_favorite)
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(favorites, ["B"]);
}

#[tokio::test]
async fn landlord_create_reaches_subscribed_tenant() {
    let shared = Arc::new(InMemoryGateway::with_listings(listings(&["A"])));
    let mut tenant_shell = Shell::mounted(tenant(), shared.clone()).await;
    assert!(tenant_shell.is_subscribed());
    assert!(tenant_shell.model.is_subscribed());

    shared
        .create(&ActorId::new(LANDLORD), &fields("Fresh Listing"))
        .await
        .unwrap();
    assert_eq!(tenant_shell.view().listings.len(), 1);

    assert_eq!(tenant_shell.pump_feed().await, 1);

    let view = tenant_shell.view();
    assert_eq!(view.listings.len(), 2);
    assert_eq!(view.listings[0].name, "Fresh Listing");
    assert!(!view.listings[0].is_owned);
}

#[tokio::test]
async fn remounting_keeps_the_existing_subscription() {
    let shared = Arc::new(InMemoryGateway::with_listings(listings(&["A"])));
    let mut shell = Shell::mounted(tenant(), shared.clone()).await;

    shared.delete(&ListingId::new("A")).await.unwrap();
    shell.send(Event::Mounted).await;

    // A fresh receiver would have missed the delete notice.
    assert_eq!(shell.pump_feed().await, 1);
    assert!(shell.view().listings.is_empty());
}

#[tokio::test]
async fn unmounted_screen_ignores_change_feed() {
    let shared = Arc::new(InMemoryGateway::with_listings(listings(&["A"])));
    let mut shell = Shell::mounted(tenant(), shared.clone()).await;
    shell.send(Event::Unmounted).await;
    assert!(!shell.is_subscribed());
    assert!(!shell.model.is_subscribed());

    shared
        .create(&ActorId::new("landlord-2"), &fields("Elsewhere"))
        .await
        .unwrap();

    assert_eq!(shell.pump_feed().await, 0);
    // A notice the shell forwards late is dropped too.
    shell
        .send(Event::RemoteChanged {
            notice: dorm_core::ChangeNotice::Deleted {
                listing_id: ListingId::new("A"),
            },
        })
        .await;
    assert_eq!(shell.view().listings.len(), 1);
}

#[tokio::test]
async fn landlord_sees_only_own_listings() {
    let mut rows = listings(&["A", "B"]);
    rows.push(Listing {
        id: ListingId::new("X"),
        owner_id: ActorId::new("landlord-2"),
        created_at: UnixTimeMs(1_600_000_000_000),
        fields: fields("Not Mine"),
    });
    let shared = Arc::new(InMemoryGateway::with_listings(rows));

    let own = Shell::mounted(landlord(), shared.clone()).await;
    assert_eq!(card_ids(&own.view()), ["A", "B"]);

    let everyone = Shell::mounted(tenant(), shared.clone()).await;
    assert_eq!(card_ids(&everyone.view()), ["A", "B", "X"]);

    let model = Model::new(landlord(), CoreConfig::default()).with_filter(ListingFilter::All);
    let mut browsing = Shell::with_model(model, shared);
    browsing.send(Event::Mounted).await;
    let view = browsing.view();
    assert_eq!(view.listings.len(), 3);
    assert!(!view.listings[2].is_owned);
}

#[tokio::test]
async fn search_narrows_visible_cards() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A", "B", "C"])));
    let mut shell = Shell::mounted(tenant(), gateway).await;

    shell
        .send(Event::SearchChanged {
            query: "dorm b".into(),
        })
        .await;
    assert_eq!(card_ids(&shell.view()), ["B"]);

    shell
        .send(Event::SearchChanged {
            query: "nowhere city".into(),
        })
        .await;
    assert!(shell.view().listings.is_empty());

    shell
        .send(Event::SearchChanged {
            query: String::new(),
        })
        .await;
    let view = shell.view();
    assert_eq!(view.listings.len(), 3);
    assert!(view.query.is_empty());
}

#[tokio::test]
async fn taps_become_navigation_effects() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A"])));
    let mut shell = Shell::mounted(tenant(), gateway).await;

    shell
        .send(Event::ListingTapped {
            id: ListingId::new("A"),
        })
        .await;
    shell
        .send(Event::OwnerTapped {
            owner_id: ActorId::new(LANDLORD),
        })
        .await;

    assert_eq!(
        shell.visited,
        vec![
            Destination::ListingDetails {
                id: ListingId::new("A")
            },
            Destination::OwnerProfile {
                owner_id: ActorId::new(LANDLORD)
            },
        ]
    );
}

#[tokio::test]
async fn every_event_requests_a_render() {
    let gateway = Arc::new(FlakyGateway::new(listings(&["A"])));
    let mut shell = Shell::new(tenant(), gateway);
    shell.send(Event::Mounted).await;
    // mount, listings fetched, relations fetched
    assert_eq!(shell.renders, 3);
}
