// tests/broadcast_test.rs — Broadcaster semantics across subscribers

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use roundtable::broadcast::MoodBroadcaster;
use roundtable::core::types::{AgentActivity, Mood, MoodState};

fn update(agent: &str, mood: Mood, intensity: f32) -> MoodState {
    MoodState {
        agent_id: agent.into(),
        mood,
        intensity,
        status: AgentActivity::Spoke,
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_late_joiner_hydrates_without_replay() {
    let b = MoodBroadcaster::new(32, Duration::from_secs(15));
    b.init_meeting("m1", &["agent-1".into(), "agent-2".into()])
        .await;

    // Five publishes per agent before anyone subscribes
    for i in 1..=5 {
        b.publish("m1", update("agent-1", Mood::Curious, i as f32 / 10.0))
            .await;
        b.publish("m1", update("agent-2", Mood::Skeptical, i as f32 / 5.0))
            .await;
    }

    // The snapshot holds exactly one entry per agent, the latest value
    let mut sub = b.subscribe("m1").await;
    let first = sub.next().await.unwrap();
    let second = sub.next().await.unwrap();
    assert_eq!(first.agent_id, "agent-1");
    assert_eq!(first.intensity, 0.5);
    assert_eq!(second.agent_id, "agent-2");
    assert_eq!(second.intensity, 1.0);

    // No replayed history follows the snapshot
    let pending = tokio::time::timeout(Duration::from_millis(20), sub.next()).await;
    assert!(pending.is_err());
}

#[tokio::test]
async fn test_multiple_subscribers_each_get_live_updates() {
    let b = MoodBroadcaster::new(32, Duration::from_secs(15));
    b.init_meeting("m1", &[]).await;

    let mut a = b.subscribe("m1").await;
    let mut c = b.subscribe("m1").await;

    b.publish("m1", update("agent-1", Mood::Excited, 0.8)).await;

    let got_a = a.next().await.unwrap();
    let got_c = c.next().await.unwrap();
    assert_eq!(got_a.mood, Mood::Excited);
    assert_eq!(got_c.mood, Mood::Excited);
}

#[tokio::test]
async fn test_slow_subscriber_never_stalls_publisher_or_peers() {
    let b = MoodBroadcaster::new(4, Duration::from_secs(15));
    b.init_meeting("m1", &[]).await;

    // One subscriber never reads while publishes overflow its queue
    let stalled = b.subscribe("m1").await;
    for i in 0..50 {
        b.publish("m1", update("agent-1", Mood::Confident, i as f32 / 50.0))
            .await;
    }

    // A fresh subscriber still hydrates from the latest snapshot
    let mut fresh = b.subscribe("m1").await;
    let state = fresh.next().await.unwrap();
    assert_eq!(state.intensity, 49.0 / 50.0);

    // The stalled handle reports its losses once it finally reads
    let mut stalled = stalled;
    stalled.next().await.unwrap();
    assert!(stalled.dropped() > 0);
}

#[tokio::test]
async fn test_heartbeat_travels_on_the_handle() {
    let b = MoodBroadcaster::new(8, Duration::from_secs(7));
    b.init_meeting("m1", &[]).await;
    let sub = b.subscribe("m1").await;
    assert_eq!(sub.heartbeat(), Duration::from_secs(7));

    let (snapshot, _rx, heartbeat, _guard) = sub.into_parts();
    assert!(snapshot.is_empty());
    assert_eq!(heartbeat, Duration::from_secs(7));
}

#[tokio::test]
async fn test_subscribing_to_garbage_ids_leaves_no_entries() {
    let b = MoodBroadcaster::new(8, Duration::from_secs(15));
    b.init_meeting("real", &["agent-1".into()]).await;

    for i in 0..20 {
        let mut sub = b.subscribe(&format!("garbage-{i}")).await;
        assert!(sub.next().await.is_none());
    }
    assert_eq!(b.meeting_count().await, 1);
}

#[tokio::test]
async fn test_observer_outliving_the_run_cleans_up_on_disconnect() {
    let b = MoodBroadcaster::new(8, Duration::from_secs(15));
    b.init_meeting("m1", &["agent-1".into()]).await;
    let mut sub = b.subscribe("m1").await;

    b.publish("m1", update("agent-1", Mood::Excited, 0.8)).await;
    b.retire("m1").await;

    // The attached observer can still drain snapshot and updates
    assert!(sub.next().await.is_some());
    assert!(sub.next().await.is_some());
    assert_eq!(b.meeting_count().await, 1);

    // Its disconnect is what finally frees the meeting
    drop(sub);
    for _ in 0..100 {
        if b.meeting_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(b.meeting_count().await, 0);
}

#[tokio::test]
async fn test_concurrent_publishes_across_meetings() {
    let b = Arc::new(MoodBroadcaster::new(32, Duration::from_secs(15)));
    for m in 0..8 {
        b.init_meeting(&format!("m{m}"), &["agent-1".into()]).await;
    }

    let mut tasks = Vec::new();
    for m in 0..8 {
        let b = Arc::clone(&b);
        tasks.push(tokio::spawn(async move {
            let id = format!("m{m}");
            for i in 0..50 {
                b.publish(&id, update("agent-1", Mood::Curious, i as f32 / 50.0))
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for m in 0..8 {
        let current = b.current(&format!("m{m}")).await;
        assert_eq!(current["agent-1"].intensity, 49.0 / 50.0);
    }
}

#[tokio::test]
async fn test_retired_meeting_frees_its_channel() {
    let b = MoodBroadcaster::new(8, Duration::from_secs(15));
    b.init_meeting("m1", &["agent-1".into()]).await;
    b.init_meeting("m2", &["agent-1".into()]).await;
    assert_eq!(b.meeting_count().await, 2);

    b.retire("m1").await;
    assert_eq!(b.meeting_count().await, 1);
    assert!(b.current("m1").await.is_empty());
    assert_eq!(b.current("m2").await.len(), 1);
}
