use std::fs;

use pretty_assertions::assert_eq;
use rstest::rstest;
use temp_dir::TempDir;
use ticktrace::io::{CloseError, Device, File, LocalListener, LocalSocket, Mode, Null, OpenError};

use shared::setup_tracing;

#[test]
fn file_write_then_read() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let path = test_dir.child("data");

    let mut file = File::new(&path);
    assert!(!file.is_open());
    file.open(Mode::WRITE_ONLY | Mode::TRUNCATE).unwrap();
    Device::write_all(&mut file, b"hello world").unwrap();
    file.sync().unwrap();
    file.close().unwrap();

    let mut file = File::open_with(&path, Mode::READ_ONLY).unwrap();
    file.seek(6).unwrap();
    let mut buf = [0u8; 16];
    let n = Device::read(&mut file, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"world");
    assert_eq!(Device::read(&mut file, &mut buf).unwrap(), 0);
}

#[test]
fn new_only_refuses_existing() {
    let test_dir = TempDir::new().unwrap();
    let path = test_dir.child("exists");
    fs::write(&path, b"x").unwrap();

    let res = File::open_with(&path, Mode::WRITE_ONLY | Mode::NEW_ONLY);
    assert!(matches!(res, Err(OpenError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists));
}

#[test]
fn existing_only_refuses_missing() {
    let test_dir = TempDir::new().unwrap();
    let res = File::open_with(test_dir.child("missing"), Mode::WRITE_ONLY | Mode::EXISTING_ONLY);
    assert!(matches!(res, Err(OpenError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound));
}

#[test]
fn append_keeps_content() {
    let test_dir = TempDir::new().unwrap();
    let path = test_dir.child("log");
    fs::write(&path, b"ab").unwrap();

    let mut file = File::open_with(&path, Mode::WRITE_ONLY | Mode::APPEND).unwrap();
    Device::write_all(&mut file, b"cd").unwrap();
    file.close().unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"abcd");
}

#[test]
fn open_twice_and_close_twice() {
    let test_dir = TempDir::new().unwrap();
    let mut file = File::open_with(test_dir.child("f"), Mode::READ_WRITE).unwrap();
    assert!(matches!(
        file.open(Mode::READ_WRITE),
        Err(OpenError::AlreadyOpen)
    ));
    file.close().unwrap();
    assert!(matches!(file.close(), Err(CloseError::NotOpen)));
    assert_eq!(file.mode(), Mode::empty());
}

#[rstest]
#[case(Mode::READ_ONLY)]
#[case(Mode::WRITE_ONLY | Mode::TRUNCATE)]
#[case(Mode::APPEND)]
fn socket_refuses_unsupported_modes(#[case] mode: Mode) {
    let mut socket = LocalSocket::new("/nonexistent/socket");
    assert!(matches!(
        socket.open(mode),
        Err(OpenError::Unsupported { .. })
    ));
}

#[test]
fn null_device() {
    let mut null = Null::new();
    null.open(Mode::READ_WRITE).unwrap();
    assert_eq!(null.write(&[1, 2, 3]).unwrap(), 3);
    let mut buf = [0u8; 4];
    assert_eq!(null.read(&mut buf).unwrap(), 0);
    null.seek(1000).unwrap();
    null.close().unwrap();
    assert!(!null.is_open());
}

#[test]
fn socket_round_trip() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let path = test_dir.child("sock");
    let listener = LocalListener::bind(&path).unwrap();
    assert!(listener.accept().unwrap().is_none());

    let mut client = LocalSocket::connect(&path).unwrap();
    let mut server = loop {
        if let Some(socket) = listener.accept().unwrap() {
            break socket;
        }
    };
    assert_eq!(server.mode(), Mode::READ_WRITE | Mode::NON_BLOCKING);

    // nothing sent yet, an accepted socket must not block
    let mut buf = [0u8; 8];
    let err = Device::read(&mut server, &mut buf).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);

    Device::write_all(&mut client, b"tick").unwrap();
    client.close().unwrap();

    let mut received = Vec::new();
    loop {
        match Device::read(&mut server, &mut buf).unwrap() {
            0 => break,
            n => received.extend_from_slice(&buf[..n]),
        }
    }
    assert_eq!(received, b"tick");

    drop(listener);
    assert!(!path.exists());
}

#[test]
fn stale_socket_is_replaced() {
    let test_dir = TempDir::new().unwrap();
    let path = test_dir.child("sock");
    fs::write(&path, b"").unwrap();
    let _listener = LocalListener::bind(&path).unwrap();
    LocalSocket::connect(&path).unwrap();
}
