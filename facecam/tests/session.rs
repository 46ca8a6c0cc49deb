use std::cell::Cell;

use facecam::camera::{i420_plane_sizes, Snapshot, Surface};
use facecam::command::Command;
use facecam::encoder::FrameEncoder;
use facecam::messages::{Outbound, TrainingMode};
use facecam::pacer::{Pacer, PacerState};
use facecam::palette::palette;
use facecam::roster::{Patch, RosterError};
use facecam::view::{RosterView, Table};
use facecam::{Received, Session};

/// Uniform gray surface that can be switched off to simulate a camera
/// that never became ready.
struct GraySurface {
    ready: Cell<bool>,
}

impl GraySurface {
    fn ready() -> Self {
        Self {
            ready: Cell::new(true),
        }
    }
}

impl Surface for GraySurface {
    fn snapshot(&self) -> Option<Snapshot> {
        if !self.ready.get() {
            return None;
        }
        let total = i420_plane_sizes(64, 48).iter().sum();
        Some(Snapshot::new(64, 48, vec![128; total]))
    }
}

#[derive(Default)]
struct RecordingView {
    table: Table,
    patches: Vec<Patch>,
    statuses: Vec<String>,
}

impl RosterView for RecordingView {
    fn apply(&mut self, patch: &Patch) {
        self.table.apply(patch);
        self.patches.push(patch.clone());
    }

    fn status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }
}

fn session(surface: GraySurface) -> Session<GraySurface, RecordingView> {
    Session::new(
        surface,
        FrameEncoder::new(32, 24, 60).unwrap(),
        Pacer::default(),
        palette("Paired", 10).unwrap(),
        RecordingView::default(),
    )
}

const ANNOTATED_A: &str = r##"{"type":"ANNOTATED","content":"data:image/jpeg;base64,AA","processing_time":"20.00",
    "frame_faces":[{"uuid":"a","name":"Unknown","color":"#a6cee3","thumbnail":"data:thumb-a","samples":0}]}"##;

const ANNOTATED_A_NO_THUMB: &str = r##"{"type":"ANNOTATED","content":"data:image/jpeg;base64,BB","processing_time":"18.00",
    "frame_faces":[{"uuid":"a","name":"Unknown","color":"#a6cee3","samples":0}]}"##;

const ANNOTATED_AB: &str = r##"{"type":"ANNOTATED","content":"data:image/jpeg;base64,CC","processing_time":"25.00",
    "frame_faces":[{"uuid":"a","name":"Unknown","color":"#a6cee3","samples":0},
                   {"uuid":"b","name":"Unknown","color":"#1f78b4","thumbnail":"data:thumb-b","samples":0}]}"##;

#[test]
fn palette_then_paced_frames() {
    let mut session = session(GraySurface::ready());

    assert_eq!(session.tick(), None, "nothing is sent before the channel opens");

    match session.opened("ws://backend") {
        Outbound::Palette { colors, colors_hex } => {
            assert_eq!(colors.len(), 10);
            assert_eq!(colors_hex.len(), 10);
            assert_eq!(colors[0], [0xa6, 0xce, 0xe3]);
            assert_eq!(colors_hex[0], "#a6cee3");
        }
        other => panic!("expected PALETTE, got {other:?}"),
    }

    let frame = session.tick().expect("first tick sends");
    match frame {
        Outbound::Frame { data_url } => assert!(data_url.starts_with("data:image/jpeg;base64,")),
        other => panic!("expected FRAME, got {other:?}"),
    }
    assert_eq!(session.pacer().credit(), 0);
    assert_eq!(session.pacer().state(), PacerState::Throttled);

    for _ in 0..5 {
        assert_eq!(session.tick(), None);
    }

    assert_eq!(session.receive(r#"{"type":"PROCESSED"}"#), Received::Credit(1));
    assert!(session.tick().is_some());
    assert_eq!(session.pacer().sent(), 2);
    assert_eq!(session.pacer().acknowledged(), 1);
}

#[test]
fn frames_never_exceed_acknowledgements_plus_one() {
    let mut session = session(GraySurface::ready());
    session.opened("ws://backend");

    let mut sent = 0u64;
    let mut acks = 0u64;
    for round in 0..40 {
        if session.tick().is_some() {
            sent += 1;
        }
        if round % 3 == 0 {
            session.receive(r#"{"type":"PROCESSED"}"#);
            acks += 1;
        }
        assert!(sent <= 1 + acks);
    }
    assert_eq!(session.pacer().sent(), sent);
}

#[test]
fn not_ready_surface_sends_nothing_and_keeps_credit() {
    let surface = GraySurface::ready();
    surface.ready.set(false);
    let mut session = session(surface);
    session.opened("ws://backend");

    for _ in 0..3 {
        assert_eq!(session.tick(), None);
    }
    assert_eq!(session.pacer().credit(), 1);

    session.surface().ready.set(true);
    assert!(session.tick().is_some());
}

#[test]
fn roster_reconciliation_is_idempotent() {
    let mut session = session(GraySurface::ready());
    session.opened("ws://backend");

    assert_eq!(
        session.receive(ANNOTATED_A),
        Received::Annotated { new_rows: 1 }
    );
    let before = session.view().table.clone();

    assert_eq!(
        session.receive(ANNOTATED_A),
        Received::Annotated { new_rows: 0 }
    );
    assert_eq!(session.roster().len(), 1);
    assert_eq!(session.view().table, before);
}

#[test]
fn update_without_thumbnail_keeps_previous() {
    let mut session = session(GraySurface::ready());
    session.receive(ANNOTATED_A);
    session.receive(ANNOTATED_A_NO_THUMB);

    let table = &session.view().table;
    assert_eq!(table.rows[0].thumbnail.as_deref(), Some("data:thumb-a"));
    assert_eq!(table.composite.as_deref(), Some("data:image/jpeg;base64,BB"));
    assert_eq!(table.processing_time, Some(18.0));
}

#[test]
fn partial_update_changes_only_the_fields_it_carries() {
    let mut session = session(GraySurface::ready());
    session.receive(
        r##"{"type":"ANNOTATED","content":"c1","processing_time":"5.00",
        "frame_faces":[{"uuid":"a","name":"Unknown","color":"#a6cee3","thumbnail":"t1","samples":7}]}"##,
    );

    let received = session.receive(
        r#"{"type":"ANNOTATED","content":"c2","processing_time":"6.00",
        "frame_faces":[{"uuid":"a","thumbnail":"t2"}]}"#,
    );
    assert_eq!(received, Received::Annotated { new_rows: 0 });

    let table = &session.view().table;
    assert_eq!(table.composite.as_deref(), Some("c2"));
    assert_eq!(table.rows[0].samples, 7);
    assert_eq!(table.rows[0].thumbnail.as_deref(), Some("t2"));
    assert_eq!(session.roster().get("a").unwrap().samples, 7);
}

#[test]
fn training_toggles_are_mutually_exclusive() {
    let mut session = session(GraySurface::ready());
    session.receive(ANNOTATED_AB);

    let on_b = session
        .command(Command::Train {
            target: "b".into(),
            on: true,
        })
        .unwrap();
    assert_eq!(
        on_b,
        Some(Outbound::Training {
            id: "b".into(),
            mode: TrainingMode::On
        })
    );
    assert!(!session.view().table.rows[0].toggle_enabled);

    let blocked = session.command(Command::Train {
        target: "a".into(),
        on: true,
    });
    assert!(matches!(blocked, Err(RosterError::ToggleDisabled { .. })));

    session
        .command(Command::Train {
            target: "2".into(),
            on: false,
        })
        .unwrap();
    assert!(session.view().table.rows.iter().all(|row| row.toggle_enabled));

    assert!(session
        .command(Command::Train {
            target: "a".into(),
            on: true,
        })
        .unwrap()
        .is_some());
}

#[test]
fn label_command_sends_labeled_and_survives_updates() {
    let mut session = session(GraySurface::ready());
    session.receive(ANNOTATED_A);

    let sent = session
        .command(Command::Label {
            target: "1".into(),
            name: "Ada".into(),
        })
        .unwrap();
    assert_eq!(
        sent,
        Some(Outbound::Labeled {
            id: "a".into(),
            name: "Ada".into()
        })
    );

    session.receive(ANNOTATED_A);
    assert_eq!(session.view().table.rows[0].name, "Ada");
    assert_eq!(session.roster().get("a").unwrap().name, "Ada");
}

#[test]
fn unknown_and_malformed_messages_are_dropped() {
    let mut session = session(GraySurface::ready());
    session.opened("ws://backend");
    session.receive(ANNOTATED_A);
    let patches_before = session.view().patches.len();

    assert_eq!(session.receive(r#"{"type":"PING"}"#), Received::Ignored);
    assert_eq!(session.receive("{{{"), Received::Ignored);
    assert_eq!(session.receive(r#"{"no_type":true}"#), Received::Ignored);

    assert_eq!(session.view().patches.len(), patches_before);
    assert_eq!(session.roster().len(), 1);
    assert!(session.is_open());
    assert!(session.tick().is_some());
}

#[test]
fn close_reports_disconnect_and_stops_sending() {
    let mut session = session(GraySurface::ready());
    session.opened("ws://backend");
    session.errored("connection reset");
    session.closed("Abnormal");

    let statuses = &session.view().statuses;
    assert_eq!(statuses[0], "Connected to ws://backend");
    assert_eq!(statuses[1], "Error: connection reset");
    assert_eq!(statuses[2], "Disconnected.");
    assert!(!session.is_open());
    assert_eq!(session.tick(), None);
}
