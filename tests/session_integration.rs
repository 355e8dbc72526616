//! Integration tests for the ingest/tick workflow
//!
//! These tests drive a session end to end:
//! - Variable lines (single, batch, text, xy)
//! - Window eviction
//! - Pause semantics
//! - 3D shape inheritance
//! - Device line normalization, logs and commands

mod common;

use common::builders::{batch_line, SessionBuilder, START_MS};
use common::{numbers, texts, times, xy_pairs};
use lasecplot::protocol::shape::{ShapeKind, ShapeState, Vec3};
use lasecplot::registry::SurfaceKind;
use lasecplot::{CurrentValue, Origin, Series, TelemetryKind};
use proptest::prelude::*;

const ARRIVAL: f64 = START_MS / 1000.0;

// ==================== Variable lines ====================

#[test]
fn test_single_value_line() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("key:42", None, Origin::Local);

    let channel = session.channel("key").unwrap();
    assert_eq!(channel.kind(), TelemetryKind::Number);
    assert_eq!(times(channel.staging()), vec![ARRIVAL]);
    assert_eq!(numbers(channel.staging()), vec![42.0]);
}

#[test]
fn test_batch_line_converts_milliseconds() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("key:1000:1.0;2000:2.0", None, Origin::Local);

    let staging = session.channel("key").unwrap().staging();
    assert_eq!(times(staging), vec![1.0, 2.0]);
    assert_eq!(numbers(staging), vec![1.0, 2.0]);
}

#[test]
fn test_malformed_batch_item_is_skipped() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("key:1000:1.0;2000;3000:3.0|g", None, Origin::Local);

    let staging = session.channel("key").unwrap().staging();
    assert_eq!(times(staging), vec![1.0, 3.0]);
    assert_eq!(numbers(staging), vec![1.0, 3.0]);
    assert_eq!(session.stats().item_errors, 1);
    assert_eq!(session.stats().line_errors, 0);
}

#[test]
fn test_all_items_invalid_is_silent_noop() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("key:1;2;3", None, Origin::Local);

    assert!(session.channel("key").is_none());
    assert_eq!(session.stats().item_errors, 3);
    assert_eq!(session.stats().line_errors, 0);
}

#[test]
fn test_text_flag_keeps_string() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("key:5|t", None, Origin::Local);

    let channel = session.channel("key").unwrap();
    assert_eq!(channel.kind(), TelemetryKind::Text);
    assert_eq!(times(channel.staging()), vec![ARRIVAL]);
    assert_eq!(texts(channel.staging()), vec!["5".to_string()]);
}

#[test]
fn test_xy_line() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("key:0:0;1:1;2:4|xy", None, Origin::Local);

    let channel = session.channel("key").unwrap();
    assert_eq!(channel.kind(), TelemetryKind::Xy);
    assert_eq!(
        xy_pairs(channel.staging()),
        vec![(0.0, 0.0), (1.0, 1.0), (2.0, 4.0)]
    );
    assert_eq!(times(channel.staging()), vec![ARRIVAL; 3]);
}

#[test]
fn test_unit_is_sticky_and_overridable() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("temp:21§°C", None, Origin::Local);
    session.ingest("temp:22", None, Origin::Local);
    session.tick();
    assert_eq!(session.channel("temp").unwrap().unit(), "°C");
    assert_eq!(session.channel("temp").unwrap().formatted_value(), "22 °C");

    session.ingest("temp:300§K", None, Origin::Local);
    session.tick();
    assert_eq!(session.channel("temp").unwrap().formatted_value(), "300 K");
}

// ==================== Tick ====================

#[test]
fn test_eviction_window() {
    let (mut session, _clock) = SessionBuilder::new().view_duration("2").build();
    session.ingest(
        "key:0:0;1000:1;2000:2;3000:3;4000:4;5000:5",
        None,
        Origin::Local,
    );

    let report = session.tick();
    assert_eq!(report.points_flushed, 6);
    assert_eq!(report.evicted, 3);
    assert_eq!(times(session.channel("key").unwrap().retained()), vec![3.0, 4.0, 5.0]);

    let report = session.tick();
    assert_eq!(report.evicted, 0);
    assert_eq!(times(session.channel("key").unwrap().retained()), vec![3.0, 4.0, 5.0]);
}

#[test]
fn test_xy_eviction_keeps_sequences_aligned() {
    let (mut session, _clock) = SessionBuilder::new().view_duration("1").build();
    session.ingest("path:5:50:1000;6:60:2000;7:70:3000|xy", None, Origin::Local);
    session.tick();

    let retained = session.channel("path").unwrap().retained();
    assert_eq!(xy_pairs(retained), vec![(6.0, 60.0), (7.0, 70.0)]);
    assert_eq!(times(retained), vec![2.0, 3.0]);
}

#[test]
fn test_tick_reports_updated_channels() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("a:1\nb:2", None, Origin::Local);
    let report = session.tick();
    assert_eq!(report.updated, vec!["a", "b"]);

    session.ingest("b:3", None, Origin::Local);
    let report = session.tick();
    assert_eq!(report.updated, vec!["b"]);
    assert!(session.channel("a").unwrap().last_tick_points().is_empty());
    assert_eq!(session.channel("b").unwrap().last_tick_points().len(), 1);
}

#[test]
fn test_current_value_published_on_tick() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("pos:1:2;3:4|xy", None, Origin::Local);

    let channel = session.channel("pos").unwrap();
    assert_eq!(channel.latest_value(), Some(&CurrentValue::Xy { x: 3.0, y: 4.0 }));
    assert_eq!(channel.current_value(), None);

    session.tick();
    let channel = session.channel("pos").unwrap();
    assert_eq!(channel.current_value(), Some(&CurrentValue::Xy { x: 3.0, y: 4.0 }));
    assert_eq!(channel.formatted_value(), "(3, 4)");
}

// ==================== Pause ====================

#[test]
fn test_paused_payloads_are_dropped_not_deferred() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.set_paused(true);
    session.ingest("key:1000:1;2000:2", None, Origin::Local);
    session.tick();

    session.set_paused(false);
    session.tick();
    assert!(session.channel("key").is_none());

    session.ingest("key:3000:3", None, Origin::Local);
    session.tick();
    assert_eq!(times(session.channel("key").unwrap().retained()), vec![3.0]);
}

#[test]
fn test_staging_flushed_while_paused() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("key:1000:1", None, Origin::Local);
    session.set_paused(true);

    let report = session.tick();
    assert_eq!(report.points_flushed, 1);
    let channel = session.channel("key").unwrap();
    assert!(channel.staging().is_empty());
    assert_eq!(channel.retained().len(), 1);
}

// ==================== 3D ====================

#[test]
fn test_shape_inherits_previous_snapshot() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("3D|obj:S:cube:P:0:0:0:C:blue", None, Origin::Local);
    session.tick();
    session.ingest("3D|obj:C:red", None, Origin::Local);
    session.tick();

    let channel = session.channel("obj").unwrap();
    assert_eq!(channel.kind(), TelemetryKind::Shape3d);
    let Series::Shape { shapes, .. } = channel.retained() else {
        panic!("expected a 3D series");
    };
    assert_eq!(shapes.len(), 2);
    assert_eq!(shapes[0].color, "blue");

    let mut expected = ShapeState::defaults(ShapeKind::Cube);
    expected.position = Vec3::new(0.0, 0.0, 0.0);
    expected.color = "red".to_string();
    assert_eq!(shapes[1], expected);
}

#[test]
fn test_shape_clear_starts_from_defaults() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("3D|obj:S:cube:C:blue", None, Origin::Local);
    session.tick();

    session.ingest("3D|obj:C:red|clr", None, Origin::Local);
    session.tick();
    assert_eq!(session.stats().line_errors, 1);
    assert!(session.channel("obj").unwrap().retained().is_empty());

    session.ingest("3D|obj:S:sphere;C:red|clr", None, Origin::Local);
    session.tick();
    let Series::Shape { shapes, .. } = session.channel("obj").unwrap().retained() else {
        panic!("expected a 3D series");
    };
    let mut expected = ShapeState::defaults(ShapeKind::Sphere);
    assert_eq!(shapes[0], expected);
    expected.color = "red".to_string();
    assert_eq!(shapes[1], expected);
}

#[test]
fn test_shape_values_in_one_line_chain() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("3D|ball:S:sphere:RA:2;1500:P:1:1:1;2500:C:green", None, Origin::Local);

    let channel = session.channel("ball").unwrap();
    let Series::Shape { times, shapes } = channel.staging() else {
        panic!("expected a 3D series");
    };
    assert_eq!(times.iter().copied().collect::<Vec<_>>(), vec![ARRIVAL, 1.5, 2.5]);
    assert_eq!(shapes[2].radius, 2.0);
    assert_eq!(shapes[2].position, Vec3::new(1.0, 1.0, 1.0));
    assert_eq!(shapes[2].color, "green");
}

#[test]
fn test_shape_without_type_is_rejected() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("3D|ghost:C:red\nkey:1", None, Origin::Local);

    assert!(session.channel("ghost").is_none());
    assert!(session.channel("key").is_some());
    assert_eq!(session.stats().line_errors, 1);
}

#[test]
fn test_shape_error_keeps_earlier_values() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("3D|obj:S:cube;C:red;S:pyramid;C:blue", None, Origin::Local);

    let channel = session.channel("obj").unwrap();
    assert_eq!(channel.staging().len(), 2);
    assert_eq!(session.stats().line_errors, 1);
}

#[test]
fn test_scene_surfaces_shared_by_label() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest(
        "3D|a,world:S:cube\n3D|b,world:S:sphere\nspeed,world:1",
        None,
        Origin::Local,
    );

    let a = session.channel("a").unwrap().surface().unwrap();
    let b = session.channel("b").unwrap().surface().unwrap();
    let speed = session.channel("speed").unwrap().surface().unwrap();
    assert_eq!(a, b);
    assert_ne!(a, speed);

    let layout = session.registry().layout();
    assert_eq!(layout.get(a).unwrap().kind, SurfaceKind::Scene3d);
    assert_eq!(layout.get(speed).unwrap().kind, SurfaceKind::Chart { xy: false });
}

#[test]
fn test_no_plot_flag() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("hidden:1|np", None, Origin::Local);
    assert_eq!(session.channel("hidden").unwrap().surface(), None);
    assert!(session.registry().layout().is_empty());
}

// ==================== Device lines, logs, commands ====================

#[test]
fn test_device_payload() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest(
        ">temp:1000:21;2000:22\nBoot complete\n>state:IDLE|t\n|calibrate|_ping|reset|\n",
        Some(5_000.0),
        Origin::Udp,
    );
    session.tick();

    assert_eq!(numbers(session.channel("temp").unwrap().retained()), vec![21.0, 22.0]);
    assert_eq!(texts(session.channel("state").unwrap().retained()), vec!["IDLE"]);
    assert_eq!(session.commands().names(), &["calibrate", "reset"]);
    assert!(session.command_available());

    let logs = session.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].text, "Boot complete");
    assert_eq!(logs[0].timestamp, 5.0);
    assert!(session.log_available());
}

#[test]
fn test_device_variable_without_prefix_is_a_log() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest("key:42", None, Origin::Serial);
    session.tick();

    assert!(session.channel("key").is_none());
    assert_eq!(session.logs()[0].text, "key:42");
}

#[test]
fn test_host_log_line_with_timestamp() {
    let (mut session, _clock) = SessionBuilder::new().build();
    session.ingest(">1234:motor: stalled", None, Origin::Local);
    session.tick();

    let logs = session.logs();
    assert_eq!(logs[0].timestamp, 1.234);
    assert_eq!(logs[0].text, "motor: stalled");
}

#[test]
fn test_log_rate() {
    let (mut session, clock) = SessionBuilder::new().build();
    session.tick();
    session.ingest(">:a\n>:b", None, Origin::Local);
    clock.advance(500.0);
    session.tick();
    // 2 logs in 0.5 s = 4/s, weighted 0.2
    common::assert_float_eq(session.log_rate(), 0.8, 1e-9);
}

// ==================== Properties ====================

proptest! {
    #[test]
    fn test_flush_moves_exactly_the_batch(values in prop::collection::vec(-1e6f64..1e6, 0..100)) {
        let (mut session, _clock) = SessionBuilder::new().build();
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| ((i as f64 + 1.0) * 1000.0, *v))
            .collect();
        session.ingest(&batch_line("key", &points), None, Origin::Local);

        let report = session.tick();
        prop_assert_eq!(report.points_flushed, values.len());

        match session.channel("key") {
            Some(channel) => {
                prop_assert!(channel.staging().is_empty());
                prop_assert_eq!(channel.retained().len(), values.len());
            }
            None => prop_assert!(values.is_empty()),
        }
    }

    #[test]
    fn test_arbitrary_payloads_never_panic(payload in "[ -~\n§]{0,200}") {
        let (mut session, _clock) = SessionBuilder::new().view_duration("1").build();
        session.ingest(&payload, None, Origin::Local);
        session.ingest(&payload, None, Origin::Serial);
        session.tick();

        for channel in session.registry().iter() {
            let retained = channel.retained();
            let len = retained.len();
            match retained {
                Series::Number { values, .. } => prop_assert_eq!(values.len(), len),
                Series::Text { values, .. } => prop_assert_eq!(values.len(), len),
                Series::Xy { xs, ys, .. } => {
                    prop_assert_eq!(xs.len(), len);
                    prop_assert_eq!(ys.len(), len);
                }
                Series::Shape { shapes, .. } => prop_assert_eq!(shapes.len(), len),
            }
        }
    }
}
