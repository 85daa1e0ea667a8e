use std::sync::Arc;

use chrono::{Duration, Utc};
use kardboard::config::{Config, ServiceClassConfig};
use kardboard::domain::Card;
use kardboard::jobs::JobRunner;
use kardboard::reports::{DailyRecord, FlowReport, ReportError, WeeklyFlowSummary};
use kardboard::tickets::DummyAdapter;

use super::setup;

fn config() -> Config {
    let mut config = Config::default();
    config.report_groups.insert("web".into(), vec!["Web".into()]);
    config.defect_types = vec!["Defect".into()];
    config.service_classes.insert(
        "default".into(),
        ServiceClassConfig {
            lower: Some(1),
            upper: Some(5),
            wip: None,
        },
    );
    config
}

#[tokio::test]
async fn jobs_build_every_snapshot() {
    let (tracker, _dir) = setup(config()).await;
    let now = Utc::now();

    let mut web = Card::new("WEB-1", now - Duration::days(4))
        .with_state("Doing")
        .with_team("Web");
    web.start_date = Some(now - Duration::days(2));
    tracker.save(&mut web).await.unwrap();

    let mut mobile = Card::new("MOB-1", now - Duration::days(6))
        .with_state("Done")
        .with_team("Mobile")
        .with_type("Defect");
    let done_at = now - Duration::hours(1);
    mobile.start_date = Some(done_at - Duration::days(5));
    mobile.done_date = Some(done_at);
    tracker.save(&mut mobile).await.unwrap();

    let runner = JobRunner::new(tracker.clone(), Arc::new(DummyAdapter));
    let refreshed = runner.queue_updates().await.unwrap();
    assert_eq!(refreshed.succeeded, 2);
    assert!(runner.update_daily_records(1).await.is_clean());
    assert!(runner.update_flow_reports().await.is_clean());

    let pool = tracker.pool();
    let today = now.date_naive();

    let all = DailyRecord::get(pool, today, "all").await.unwrap();
    assert_eq!(all.in_progress, 1);
    assert_eq!(all.done, 1);
    assert_eq!(all.moving_cycle_time, 5);

    let web_record = DailyRecord::get(pool, today, "web").await.unwrap();
    assert_eq!(web_record.in_progress, 1);
    assert_eq!(web_record.done, 0);

    let flow = FlowReport::get(pool, today, "all").await.unwrap();
    assert_eq!(flow.count_for("Done"), 1);
    let done = flow.state_counts.iter().find(|c| c.state == "Done").unwrap();
    assert_eq!(done.card_count, 0);

    let snapshot = kardboard::db::get_service_class_snapshot(pool, "web")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.data["default"].wip, 1);
    assert_eq!(snapshot.data["default"].cards_hit_goal, 1);
}

#[tokio::test]
async fn summary_needs_captured_snapshots() {
    let (tracker, _dir) = setup(config()).await;
    let result =
        WeeklyFlowSummary::calculate(tracker.pool(), tracker.config(), "all", Utc::now()).await;

    assert!(matches!(result, Err(ReportError::RecordNotFound { .. })));
}
