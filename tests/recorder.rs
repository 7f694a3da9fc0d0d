use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{fs, thread};

use pretty_assertions::assert_eq;
use temp_dir::TempDir;
use ticktrace::codec::{Decoder, Encoder};
use ticktrace::io::{LocalListener, LocalSocket};
use ticktrace::recorder::{self, Recorder};
use ticktrace::time::{process_start_time, NANOS_PER_SEC};
use ticktrace::Nanos;
use ticktrace_test_support::{encode, session, task_timestamps, ScriptedDevice};

use shared::{files_in, setup_tracing, MS};

const START: Nanos = 1_706_745_599 * NANOS_PER_SEC;
const FILE_NAME: &str = "20240131T235959Z_proc_task.tick";

fn stream(runs: usize) -> Vec<u8> {
    encode(
        session("proc", "task", START),
        &task_timestamps(0, START, runs, MS),
    )
}

fn run_until_done(recorder: &mut Recorder) {
    for _ in 0..10_000 {
        if recorder.clients() == 0 {
            return;
        }
        recorder.process();
    }
    panic!("clients never finished");
}

#[test]
fn records_into_named_file() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let mut recorder = Recorder::new(test_dir.path()).unwrap();
    let bytes = stream(100);
    recorder.add_client(ScriptedDevice::new().chunked(&bytes, 10).boxed());
    run_until_done(&mut recorder);

    assert_eq!(files_in(test_dir.path()), vec![test_dir.child(FILE_NAME)]);
    assert_eq!(fs::read(test_dir.child(FILE_NAME)).unwrap(), bytes);
}

#[test]
fn waits_for_complete_names() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let mut recorder = Recorder::new(test_dir.path()).unwrap();
    let process = "p".repeat(100);
    let bytes = encode(session(&process, "task", START), &[START]);
    recorder.add_client(
        ScriptedDevice::new()
            .data(&bytes[..64])
            .would_block()
            .data(&bytes[64..])
            .idle(1)
            .boxed(),
    );

    recorder.process();
    recorder.process();
    assert!(files_in(test_dir.path()).is_empty());

    recorder.process();
    let expected = test_dir.child(format!("20240131T235959Z_{process}_task.tick"));
    assert_eq!(files_in(test_dir.path()), vec![expected.clone()]);
    assert_eq!(fs::read(&expected).unwrap(), bytes);
}

#[test]
fn second_client_for_same_task_is_dropped() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let mut recorder = Recorder::new(test_dir.path()).unwrap();
    let first = encode(session("proc", "task", START), &[START, START + MS]);
    let second = encode(
        session("proc", "task", START),
        &[START + 5 * MS, START + 6 * MS, START + 7 * MS],
    );
    assert_ne!(first, second);

    recorder.add_client(ScriptedDevice::new().data(first.clone()).idle(2).boxed());
    recorder.add_client(ScriptedDevice::new().data(second).idle(2).boxed());
    run_until_done(&mut recorder);

    assert_eq!(files_in(test_dir.path()).len(), 1);
    assert_eq!(fs::read(test_dir.child(FILE_NAME)).unwrap(), first);
}

#[test]
fn finished_recording_is_not_overwritten() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let mut recorder = Recorder::new(test_dir.path()).unwrap();
    let first = encode(session("proc", "task", START), &[START, START + MS]);
    let later = |offset: Nanos| {
        encode(
            session("proc", "task", START),
            &[START + offset * MS, START + (offset + 1) * MS],
        )
    };

    // hangs up in the second pass
    recorder.add_client(ScriptedDevice::new().data(first.clone()).boxed());
    // resolves in that same pass
    recorder.add_client(
        ScriptedDevice::new()
            .would_block()
            .data(later(5))
            .idle(1)
            .boxed(),
    );
    // resolves after the first client was removed
    recorder.add_client(
        ScriptedDevice::new()
            .idle(2)
            .data(later(9))
            .idle(1)
            .boxed(),
    );
    for _ in 0..10 {
        recorder.process();
    }

    assert_eq!(recorder.clients(), 0);
    assert_eq!(files_in(test_dir.path()).len(), 1);
    assert_eq!(fs::read(test_dir.child(FILE_NAME)).unwrap(), first);
}

#[test]
fn flushes_past_threshold() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let path = test_dir.child(FILE_NAME);
    let mut recorder = Recorder::with_flush_threshold(test_dir.path(), 100).unwrap();
    let bytes = stream(100);
    recorder.add_client(
        ScriptedDevice::new()
            .data(&bytes[..70])
            .data(&bytes[70..120])
            .data(&bytes[120..180])
            .idle(1)
            .boxed(),
    );

    let file_len = |path: &Path| fs::metadata(path).unwrap().len();
    recorder.process();
    assert_eq!(file_len(&path), 70);
    recorder.process();
    assert_eq!(file_len(&path), 70);
    recorder.process();
    assert_eq!(file_len(&path), 180);
    recorder.process();
    assert_eq!(recorder.clients(), 1);

    run_until_done(&mut recorder);
    assert_eq!(fs::read(&path).unwrap(), &bytes[..180]);
}

#[test]
fn read_error_ends_client() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let mut recorder = Recorder::new(test_dir.path()).unwrap();
    let bytes = stream(100);
    recorder.add_client(
        ScriptedDevice::new()
            .data(&bytes[..100])
            .fail(ErrorKind::ConnectionReset)
            .data(&bytes[100..])
            .boxed(),
    );

    recorder.process();
    recorder.process();
    assert_eq!(recorder.clients(), 0);
    assert_eq!(fs::read(test_dir.child(FILE_NAME)).unwrap(), &bytes[..100]);
}

#[test]
fn idle_clients_are_kept() {
    let test_dir = TempDir::new().unwrap();
    let mut recorder = Recorder::new(test_dir.path()).unwrap();
    recorder.add_client(ScriptedDevice::new().idle(3).boxed());
    for _ in 0..3 {
        recorder.process();
        assert_eq!(recorder.clients(), 1);
    }
    recorder.process();
    assert_eq!(recorder.clients(), 0);
    assert!(files_in(test_dir.path()).is_empty());
}

#[test]
fn unopenable_sink_only_ends_that_client() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    // a directory where the tick file should go
    fs::create_dir(test_dir.child(FILE_NAME)).unwrap();

    let mut recorder = Recorder::new(test_dir.path()).unwrap();
    let other = encode(session("proc", "other", START), &[START]);
    recorder.add_client(ScriptedDevice::new().data(stream(10)).idle(5).boxed());
    recorder.add_client(ScriptedDevice::new().data(other.clone()).idle(5).boxed());

    recorder.process();
    assert_eq!(recorder.clients(), 1);

    run_until_done(&mut recorder);
    let other_path = test_dir.child("20240131T235959Z_proc_other.tick");
    assert_eq!(fs::read(other_path).unwrap(), other);
}

#[test]
fn creates_recording_root() {
    let test_dir = TempDir::new().unwrap();
    let root = test_dir.child("nested").join("recordings");
    let recorder = Recorder::new(&root).unwrap();
    assert!(root.is_dir());
    assert_eq!(recorder.root(), root.as_path());
}

#[test]
fn recording_over_socket() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let socket_path = test_dir.child("recorder.sock");
    let root = test_dir.child("ticks");

    let listener = LocalListener::bind(&socket_path).unwrap();
    let mut rec = Recorder::new(&root).unwrap();
    let shutdown = Arc::new(AtomicBool::new(false));
    let server = {
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            recorder::serve(
                &listener,
                &mut rec,
                &shutdown,
                Duration::from_millis(1),
            )
        })
    };

    let start = process_start_time();
    let timestamps = task_timestamps(2, start, 2000, MS / 10);
    {
        let socket = LocalSocket::connect(&socket_path).unwrap();
        let mut encoder = Encoder::open(session("probe", "fast", start), socket).unwrap();
        for ts in &timestamps {
            encoder.log(*ts).unwrap();
        }
    }

    let expected_len = encode(session("probe", "fast", start), &timestamps).len() as u64;
    let deadline = Instant::now() + Duration::from_secs(10);
    let path = loop {
        let done = files_in(&root)
            .into_iter()
            .find(|path| fs::metadata(path).unwrap().len() == expected_len);
        if let Some(path) = done {
            break path;
        }
        assert!(Instant::now() < deadline, "recording never completed");
        thread::sleep(Duration::from_millis(5));
    };

    shutdown.store(true, Ordering::Relaxed);
    server.join().unwrap().unwrap();
    assert!(!socket_path.exists());

    let file_name = path.file_name().unwrap().to_str().unwrap();
    assert!(file_name.ends_with("_probe_fast.tick"), "{file_name}");

    let mut decoder = Decoder::new(fs::File::open(&path).unwrap());
    let samples = decoder.load_samples().unwrap();
    assert_eq!(samples.len(), timestamps.len());
    assert_eq!(decoder.end(), Some(timestamps[timestamps.len() - 1] - start));
}
