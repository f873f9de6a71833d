//! Output sink integration tests.

mod common;

use std::fs;

use framepipe::{
    DisplaySink, FileSink, OutputSink, PipelineError, PresentationFormat, PresentationFrame,
};

use common::RecordingSurface;

fn rgb_frame(width: u32, height: u32, shade: u8) -> PresentationFrame {
    let mut frame = PresentationFrame::new(PresentationFormat::Rgb24, width, height);
    frame.data_mut().fill(shade);
    frame
}

// ── File sink ──────────────────────────────────────────────────────

#[test]
fn writes_a_binary_ppm() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let mut sink = FileSink::new(directory.path(), "ppm").expect("sink");

    let mut frame = PresentationFrame::new(PresentationFormat::Rgb24, 2, 2);
    frame
        .data_mut()
        .copy_from_slice(&[255, 0, 0, 0, 255, 0, 0, 0, 255, 10, 20, 30]);
    sink.present(&frame, 2, 2, 1).expect("present");

    let bytes = fs::read(directory.path().join("frame1.ppm")).expect("read frame");
    let mut expected = b"P6\n2 2\n255\n".to_vec();
    expected.extend_from_slice(frame.data());
    assert_eq!(bytes, expected);
    assert_eq!(sink.files_written(), 1);
}

#[test]
fn payload_follows_the_header_exactly() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let mut sink = FileSink::new(directory.path(), "ppm").expect("sink");
    sink.present(&rgb_frame(64, 48, 77), 64, 48, 3).expect("present");

    let bytes = fs::read(directory.path().join("frame3.ppm")).expect("read frame");
    let (width, height, max_value, payload) = common::parse_ppm(&bytes);
    assert_eq!((width, height, max_value), (64, 48, 255));
    assert_eq!(payload.len(), 64 * 48 * 3);
    assert!(payload.iter().all(|&byte| byte == 77));
}

#[test]
fn names_files_by_sequence_and_extension() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let sink = FileSink::new(directory.path(), ".pnm").expect("sink");
    assert_eq!(sink.frame_path(12), directory.path().join("frame12.pnm"));

    let sink = FileSink::new(directory.path(), "").expect("sink");
    assert_eq!(sink.frame_path(1), directory.path().join("frame1.ppm"));
}

#[test]
fn missing_directory_fails_initialisation() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let result = FileSink::new(directory.path().join("nope"), "ppm");
    assert!(matches!(result, Err(PipelineError::SinkInit(_))));
}

#[test]
fn refuses_frames_that_are_not_rgb24_and_writes_nothing() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let mut sink = FileSink::new(directory.path(), "ppm").expect("sink");

    let rgba = PresentationFrame::new(PresentationFormat::Rgba, 4, 4);
    assert!(matches!(
        sink.present(&rgba, 4, 4, 1),
        Err(PipelineError::Conversion(_))
    ));

    let rgb = rgb_frame(4, 4, 1);
    assert!(matches!(
        sink.present(&rgb, 4, 5, 2),
        Err(PipelineError::Conversion(_))
    ));

    let entries = fs::read_dir(directory.path()).expect("read dir").count();
    assert_eq!(entries, 0);
    assert_eq!(sink.files_written(), 0);
}

#[test]
fn write_failure_is_recoverable() {
    let parent = tempfile::tempdir().expect("Failed to create temp dir");
    let directory = parent.path().join("frames");
    fs::create_dir(&directory).expect("create dir");
    let mut sink = FileSink::new(&directory, "ppm").expect("sink");
    fs::remove_dir(&directory).expect("remove dir");

    let error = sink.present(&rgb_frame(4, 4, 1), 4, 4, 1).unwrap_err();
    match &error {
        PipelineError::FrameWrite { path, .. } => assert_eq!(path, &directory.join("frame1.ppm")),
        other => panic!("expected FrameWrite, got {other:?}"),
    }
    assert!(error.is_recoverable());
}

/// `/dev/full` accepts the open and fails every write with `ENOSPC`, so the
/// frame file is created but its payload never lands.
#[cfg(target_os = "linux")]
#[test]
fn write_failing_midway_leaves_no_file_behind() {
    let device = std::path::Path::new("/dev/full");
    if !device.exists() {
        return;
    }

    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let mut sink = FileSink::new(directory.path(), "ppm").expect("sink");
    let target = sink.frame_path(1);
    std::os::unix::fs::symlink(device, &target).expect("Failed to link frame path to /dev/full");

    let error = sink.present(&rgb_frame(64, 48, 3), 64, 48, 1).unwrap_err();
    assert!(matches!(error, PipelineError::FrameWrite { .. }));
    assert!(error.is_recoverable());
    assert!(
        fs::symlink_metadata(&target).is_err(),
        "a dropped frame must not leave {} behind",
        target.display()
    );
    assert_eq!(sink.files_written(), 0);

    sink.present(&rgb_frame(64, 48, 4), 64, 48, 2).expect("present");
    let entries: Vec<_> = fs::read_dir(directory.path())
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("frame2.ppm")]);
}

// ── Display sink ───────────────────────────────────────────────────

#[test]
fn display_sink_forwards_frames() {
    let (surface, shown) = RecordingSurface::new(8, 6, PresentationFormat::Rgba);
    let mut sink = DisplaySink::new(Box::new(surface), 8, 6).expect("sink");

    let mut frame = PresentationFrame::new(PresentationFormat::Rgba, 8, 6);
    frame.data_mut().fill(5);
    sink.present(&frame, 8, 6).expect("present");

    assert_eq!(sink.frames_shown(), 1);
    assert_eq!(*shown.borrow(), vec![(8 * 6 * 4, 5)]);
}

#[test]
fn display_surface_must_match_the_stream() {
    let (surface, _) = RecordingSurface::new(8, 6, PresentationFormat::Rgba);
    let result = DisplaySink::new(Box::new(surface), 16, 12);
    assert!(matches!(result, Err(PipelineError::SinkInit(_))));
}

#[test]
fn display_rejects_mismatched_frames() {
    let (surface, shown) = RecordingSurface::new(8, 6, PresentationFormat::Yuv420p);
    let mut sink = DisplaySink::new(Box::new(surface), 8, 6).expect("sink");

    let rgba = PresentationFrame::new(PresentationFormat::Rgba, 8, 6);
    let error = sink.present(&rgba, 8, 6).unwrap_err();
    assert!(matches!(error, PipelineError::Display(_)));
    assert!(!error.is_recoverable());
    assert!(shown.borrow().is_empty());
}

#[test]
fn surface_failures_are_display_errors() {
    let (mut surface, _) = RecordingSurface::new(4, 4, PresentationFormat::Rgba);
    surface.fail_on = Some(1);
    let mut sink = OutputSink::Display(DisplaySink::new(Box::new(surface), 4, 4).expect("sink"));

    let frame = PresentationFrame::new(PresentationFormat::Rgba, 4, 4);
    assert!(matches!(
        sink.present(&frame, 4, 4, 1),
        Err(PipelineError::Display(_))
    ));
    assert_eq!(sink.pixel_format(), PresentationFormat::Rgba);
}

#[test]
fn output_sink_routes_to_the_file_sink() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let mut sink = OutputSink::File(FileSink::new(directory.path(), "ppm").expect("sink"));
    assert_eq!(sink.pixel_format(), PresentationFormat::Rgb24);

    sink.present(&rgb_frame(2, 2, 9), 2, 2, 4).expect("present");
    assert!(directory.path().join("frame4.ppm").is_file());
}
