use chrono::Duration;
use kardboard::config::Config;
use kardboard::db::{self, CardFilter};
use kardboard::domain::Card;

use super::{at, setup};

#[tokio::test]
async fn card_moves_across_the_board() {
    let (tracker, _dir) = setup(Config::default()).await;
    let t0 = at(1, 2, 9);

    let mut card = Card::new("LIFE-1", t0).with_state("Todo").with_team("Web");
    tracker.save_at(&mut card, t0).await.unwrap();

    card.state = "Doing".into();
    card.start_date = Some(t0 + Duration::hours(48));
    tracker.save_at(&mut card, t0 + Duration::hours(48)).await.unwrap();

    // a done date wins over whatever state the caller set
    card.done_date = Some(t0 + Duration::hours(120));
    tracker.save_at(&mut card, t0 + Duration::hours(120)).await.unwrap();

    let stored = tracker.get("life-1").await.unwrap();
    assert_eq!(stored.state, "Done");
    assert_eq!(stored.cycle_time, Some(3));
    assert_eq!(stored.lead_time, Some(5));

    let entries = db::list_entries(tracker.pool(), &stored.id).await.unwrap();
    let summary: Vec<(&str, Option<i64>)> = entries
        .iter()
        .map(|e| (e.state.as_str(), e.duration))
        .collect();
    assert_eq!(
        summary,
        vec![("Todo", Some(48)), ("Doing", Some(72)), ("Done", None)]
    );
    assert!(entries.iter().all(|e| e.service_class.as_deref() == Some("default")));
}

#[tokio::test]
async fn historical_membership() {
    let (tracker, _dir) = setup(Config::default()).await;

    let mut card = Card::new("HIST-1", at(1, 1, 12)).with_state("Todo");
    tracker.save_at(&mut card, at(1, 1, 12)).await.unwrap();
    card.state = "Doing".into();
    card.start_date = Some(at(1, 10, 12));
    tracker.save_at(&mut card, at(1, 10, 12)).await.unwrap();

    let pool = tracker.pool();
    let all = CardFilter::all();

    let jan5 = at(1, 5, 12);
    let backlog = db::backlogged_cards(pool, &all, Some(&jan5)).await.unwrap();
    assert_eq!(backlog.len(), 1);
    assert!(db::in_progress_cards(pool, &all, Some(&jan5)).await.unwrap().is_empty());

    let jan15 = at(1, 15, 12);
    assert!(db::backlogged_cards(pool, &all, Some(&jan15)).await.unwrap().is_empty());
    let wip = db::in_progress_cards(pool, &all, Some(&jan15)).await.unwrap();
    assert_eq!(wip.len(), 1);
    assert_eq!(wip[0].key, "HIST-1");

    let now = chrono::Utc::now();
    assert_eq!(
        db::count_in_progress(pool, &all, None).await.unwrap(),
        db::count_in_progress(pool, &all, Some(&now)).await.unwrap()
    );
}

#[tokio::test]
async fn deleting_a_card_removes_its_history() {
    let (tracker, _dir) = setup(Config::default()).await;
    let mut card = Card::new("GONE-1", at(2, 1, 9)).with_state("Todo");
    tracker.save_at(&mut card, at(2, 1, 9)).await.unwrap();
    let id = card.id;

    tracker.delete("GONE-1").await.unwrap();

    assert!(tracker.get("GONE-1").await.is_err());
    assert!(db::list_entries(tracker.pool(), &id).await.unwrap().is_empty());
}
