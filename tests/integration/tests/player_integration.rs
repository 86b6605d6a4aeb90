//! Integration tests for the playcore player
//!
//! These tests verify the complete control flow including:
//! - Command sequencing against the state machine
//! - Engine events turning into transitions and messages
//! - Error recovery through reset
//! - Option snapshots and configuration seeding

use anyhow::Result;
use playcore::engine::{DataSourceType, SimulatedEngineFactory, SimulatedProfile};
use playcore::message::{Message, MessagePoll};
use playcore::player::{PlayerHandle, PlayerState, FORMAT_CONTROL_OPEN};
use playcore::utils::Config;
use playcore::PlayerError;
use playcore_integration_tests::{read_until, wait_for, EngineCall, Script, TestFixture};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::time::sleep;

const TIMEOUT: Duration = Duration::from_secs(5);

fn simulated(duration_ms: i64) -> PlayerHandle {
    let profile = SimulatedProfile {
        duration_ms,
        prepare_delay_ms: 10,
        tick_ms: 2,
        ..Default::default()
    };
    PlayerHandle::create(Arc::new(SimulatedEngineFactory::new(profile)))
}

#[tokio::test]
async fn test_player_initialization() -> Result<()> {
    let player = simulated(1000);

    assert_eq!(player.state(), PlayerState::Idle);
    assert!(!player.is_playing());
    assert_eq!(player.current_position(), 0);
    assert_eq!(player.duration(), 0);
    assert!(player.meta().is_none());
    assert_eq!(player.get_message(false), MessagePoll::Empty);

    Ok(())
}

#[tokio::test]
async fn test_full_playback() -> Result<()> {
    let player = simulated(300);
    player.set_data_source("https://cdn.example.com/clip.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;

    let reader = player.clone();
    let before_prepared = tokio::task::spawn_blocking(move || read_until(&reader, &Message::Prepared, TIMEOUT)).await??;
    assert_eq!(before_prepared.first(), Some(&Message::BufferingStart));
    assert!(before_prepared.contains(&Message::VideoSizeChanged { width: 1280, height: 720 }));
    assert_eq!(player.state(), PlayerState::Prepared);
    assert_eq!(player.duration(), 300);
    assert_eq!(player.video_codec_info().as_deref(), Some("h264, High"));
    assert_eq!(player.audio_codec_info().as_deref(), Some("aac, LC"));

    player.start()?;
    assert!(player.is_playing());

    // Let it play for a short time, then pause
    sleep(Duration::from_millis(50)).await;
    player.pause()?;
    // the engine applies commands asynchronously; give it a tick to settle
    sleep(Duration::from_millis(20)).await;
    let position_at_pause = player.current_position();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(player.current_position(), position_at_pause);

    player.start()?;
    let reader = player.clone();
    let rest = tokio::task::spawn_blocking(move || read_until(&reader, &Message::PlaybackCompleted, TIMEOUT)).await??;
    assert!(rest.iter().any(|msg| matches!(msg, Message::IoStat { .. })));
    assert_eq!(player.state(), PlayerState::Completed);
    assert_eq!(player.current_position(), 300);

    // Start after completion restarts from the beginning
    player.start()?;
    assert_eq!(player.state(), PlayerState::Started);
    player.stop()?;
    assert_eq!(player.state(), PlayerState::Stopped);

    Ok(())
}

#[tokio::test]
async fn test_seek_operation() -> Result<()> {
    let player = simulated(10_000);
    player.set_data_source("file:///media/clip.mkv", DataSourceType::Vod)?;
    player.prepare_async()?;
    read_until(&player, &Message::Prepared, TIMEOUT)?;

    player.seek_to(4_000)?;
    let seen = read_until(&player, &Message::SeekComplete { position_ms: 4_000 }, TIMEOUT)?;
    assert_eq!(seen.last(), Some(&Message::SeekComplete { position_ms: 4_000 }));
    assert_eq!(player.state(), PlayerState::Prepared);
    assert!(player.current_position() >= 4_000);
    // local files carry no peer address
    assert_eq!(player.ip_address(), None);

    Ok(())
}

#[test]
fn test_seek_while_started_stays_started() -> Result<()> {
    let player = simulated(60_000);
    player.set_data_source("http://example.com/long.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;
    read_until(&player, &Message::Prepared, TIMEOUT)?;
    player.start()?;

    player.seek_to(5_000)?;
    assert_eq!(player.state(), PlayerState::Started);
    let seen = read_until(&player, &Message::SeekComplete { position_ms: 5_000 }, TIMEOUT)?;
    assert!(!seen.contains(&Message::PlaybackCompleted));
    assert_eq!(player.state(), PlayerState::Started);
    assert!(player.is_playing());
    assert!(player.current_position() >= 5_000);

    Ok(())
}

#[test]
fn test_live_source_has_no_duration() -> Result<()> {
    let player = simulated(100);
    player.set_data_source("rtmp://live.example.com/app/stream", DataSourceType::LowDelayLive)?;
    player.prepare_async()?;
    read_until(&player, &Message::Prepared, TIMEOUT)?;
    player.start()?;

    assert!(wait_for(TIMEOUT, || player.current_position() > 150));
    assert_eq!(player.duration(), 0);
    assert_eq!(player.state(), PlayerState::Started);
    assert_eq!(player.ip_address().as_deref(), Some("127.0.0.1"));

    Ok(())
}

#[test]
fn test_unsupported_source_reports_error() -> Result<()> {
    let player = simulated(1000);
    player.set_data_source("gopher://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;

    let seen = read_until(&player, &Message::Error { code: playcore::engine::ERROR_UNSUPPORTED }, TIMEOUT)?;
    assert!(!seen.contains(&Message::Prepared));
    assert_eq!(player.state(), PlayerState::Error);

    // recovery: reset, then the whole sequence again
    player.reset()?;
    assert_eq!(player.state(), PlayerState::Idle);
    assert!(player.data_source().is_none());
    player.set_data_source("http://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;
    read_until(&player, &Message::Prepared, TIMEOUT)?;

    Ok(())
}

#[test]
fn test_empty_url_rejected() {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());

    let err = player.set_data_source("", DataSourceType::Vod).unwrap_err();
    assert!(matches!(err, PlayerError::InvalidArgument(_)));
    assert_eq!(err.code(), -4);
    assert_eq!(player.state(), PlayerState::Idle);
}

#[test]
fn test_illegal_commands_rejected_without_side_effects() {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());

    for result in [player.start(), player.pause(), player.stop(), player.seek_to(0), player.prepare_async()] {
        let err = result.unwrap_err();
        assert!(err.is_illegal_state());
        assert_eq!(err.code(), -3);
    }
    assert_eq!(player.state(), PlayerState::Idle);
    assert_eq!(script.sessions(), 0);
    assert!(script.calls().is_empty());
    assert_eq!(player.get_message(false), MessagePoll::Empty);
}

#[test]
fn test_engine_commands_forwarded_in_order() -> Result<()> {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());

    player.set_data_source("http://example.com/a.m3u8", DataSourceType::HighDelayLive)?;
    player.prepare_async()?;
    assert!(script.sink().prepared());
    player.start()?;
    player.seek_to(1_000)?;
    player.pause()?;
    player.stop()?;

    assert_eq!(
        script.calls(),
        vec![
            EngineCall::Open("http://example.com/a.m3u8".to_string()),
            EngineCall::Start,
            EngineCall::Seek(1_000),
            EngineCall::Pause,
            EngineCall::Stop,
        ]
    );
    Ok(())
}

#[test]
fn test_messages_delivered_in_post_order() -> Result<()> {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());
    player.set_data_source("http://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;

    let sink = script.sink();
    let producer = thread::spawn(move || {
        for percent in 0..100 {
            sink.post(Message::BufferingUpdate { position_ms: percent as i64 * 10, percent });
        }
        sink.prepared();
    });

    let seen = read_until(&player, &Message::Prepared, TIMEOUT)?;
    producer.join().unwrap();

    let percents: Vec<i32> = seen
        .iter()
        .filter_map(|msg| match msg {
            Message::BufferingUpdate { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, (0..100).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_completion_only_from_started() -> Result<()> {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());
    player.set_data_source("http://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;
    let sink = script.sink();
    sink.prepared();

    // PREPARED has no completion transition: the message is dropped
    assert!(!sink.completed());
    assert_eq!(player.state(), PlayerState::Prepared);

    player.start()?;
    player.pause()?;
    assert!(!sink.completed());
    assert_eq!(player.state(), PlayerState::Paused);

    let seen: Vec<Message> = std::iter::from_fn(|| player.get_message(false).into_message()).collect();
    assert_eq!(seen, vec![Message::Prepared]);
    Ok(())
}

#[test]
fn test_error_after_stop_is_dropped() -> Result<()> {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());
    player.set_data_source("http://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;
    script.sink().prepared();
    player.start()?;
    player.stop()?;

    assert!(!script.sink().error(-5));
    assert_eq!(player.state(), PlayerState::Stopped);
    Ok(())
}

#[test]
fn test_reset_discards_old_session() -> Result<()> {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());
    player.set_data_source("http://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;
    let old = script.sink();
    old.post(Message::BufferingStart);

    player.reset()?;
    assert_eq!(script.shutdowns(), 1);
    assert_eq!(player.get_message(false), MessagePoll::Empty);

    // late callbacks from the retired engine change nothing
    assert!(!old.prepared());
    assert!(!old.error(-1));
    assert_eq!(player.state(), PlayerState::Idle);
    assert_eq!(player.get_message(false), MessagePoll::Empty);
    Ok(())
}

#[test]
fn test_options_snapshot_taken_at_prepare() -> Result<()> {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());
    player.set_format_option("timeout", "5000000");
    player.set_codec_option("skip_frame", "8");
    player.set_picture_queue_capacity(1);
    player.set_max_fps(60);

    player.set_data_source("http://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;
    player.set_format_option("timeout", "1");

    let options = script.open_options().expect("engine was opened");
    assert_eq!(options.format["timeout"], "5000000");
    assert_eq!(options.codec["skip_frame"], "8");
    assert_eq!(options.frame_queue_capacity, 3);
    assert_eq!(options.max_fps, 60);
    assert_eq!(player.options().format["timeout"], "1");
    Ok(())
}

#[test]
fn test_format_callback_handed_to_engine_at_prepare() -> Result<()> {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());
    let calls = Arc::new(AtomicUsize::new(0));
    player.set_format_callback({
        let calls = Arc::clone(&calls);
        move |kind, data| {
            calls.fetch_add(1, Ordering::SeqCst);
            kind * 100 + data.len() as i32
        }
    });
    assert!(player.options().format_callback.is_some());

    player.set_data_source("http://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;

    let callback = script
        .open_options()
        .and_then(|options| options.format_callback)
        .expect("engine received the format callback");
    assert_eq!(callback.call(FORMAT_CONTROL_OPEN, b"url"), 103);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_format_callback_vetoes_simulated_open() -> Result<()> {
    let player = simulated(1_000);
    player.set_format_callback(|_, data| if data.starts_with(b"http://blocked") { -13 } else { 0 });
    player.set_data_source("http://blocked.example.com/a.mp4", DataSourceType::Vod)?;

    let err = player.prepare_async().unwrap_err();
    assert_eq!(err.code(), -13);
    assert_eq!(player.state(), PlayerState::Error);
    assert_eq!(player.get_message(false), MessagePoll::Message(Message::Error { code: -13 }));
    Ok(())
}

#[test]
fn test_config_seeds_player_options() -> Result<()> {
    let fixture = TestFixture::new()?;
    let path = fixture.write_config(
        "config.toml",
        r#"
        [player]
        framedrop = 1
        overlay_format = "YV12"

        [player.format]
        user_agent = "playcore-test"

        [logging]
        level = "debug"
        "#,
    )?;
    let config = Config::load_from(&path)?;

    let script = Script::new();
    let player = PlayerHandle::builder(script.factory())
        .with_options(config.player.clone())
        .build();
    player.set_data_source("http://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;

    let options = script.open_options().expect("engine was opened");
    assert_eq!(options.format["user_agent"], "playcore-test");
    assert_eq!(options.framedrop, 1);
    assert_eq!(options.overlay_format.to_string(), "YV12");
    Ok(())
}

#[test]
fn test_concurrent_commands_keep_state_consistent() -> Result<()> {
    let script = Script::new();
    let player = PlayerHandle::create(script.factory());
    player.set_data_source("http://example.com/a.mp4", DataSourceType::Vod)?;
    player.prepare_async()?;
    script.sink().prepared();

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let player = player.clone();
            thread::spawn(move || {
                for n in 0..200 {
                    let _ = match (i + n) % 4 {
                        0 => player.start(),
                        1 => player.pause(),
                        2 => player.seek_to(n as i64),
                        _ => player.start(),
                    };
                    let state = player.state();
                    assert!(matches!(
                        state,
                        PlayerState::Prepared | PlayerState::Started | PlayerState::Paused
                    ));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(player.ref_count(), 1);
    assert!(script.calls().len() > 1);
    Ok(())
}
