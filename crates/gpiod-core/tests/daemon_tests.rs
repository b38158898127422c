//! End-to-end tests: a real daemon on a temp socket, driven through the
//! client, with a scripted pin controller behind it.

use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use gpiod_core::DaemonError;
use gpiod_core::ipc::ServerError;
use gpiod_core::pin::{Direction, Level, PinNumbering, Pull, SetupOption};
use gpiod_core::protocol::Response;
use gpiod_test_utils::config::TestConfigBuilder;
use gpiod_test_utils::daemon::TestDaemon;
use gpiod_test_utils::mock::{PinCall, ScriptedController};
use gpiod_test_utils::tracing_setup::init_test_tracing;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

async fn read_reply(reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    line
}

#[test_log::test(tokio::test)]
async fn test_setup_then_output() {
    let pins = ScriptedController::new();
    let daemon = TestDaemon::start(pins.clone()).await;

    let mut conn = daemon.client().connect().await.unwrap();
    assert_eq!(conn.command("SETUP 16 OUT").await.unwrap(), Response::Ok);
    assert_eq!(conn.command("OUTPUT 16 HIGH").await.unwrap(), Response::Ok);
    drop(conn);

    daemon.stop().await.unwrap();
    assert_eq!(
        pins.calls(),
        vec![
            PinCall::Init(PinNumbering::Board),
            PinCall::Setup(16, Direction::Output, SetupOption::None),
            PinCall::Write(16, Level::High),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_output_to_input_pin_is_wrong_direction() {
    let daemon = TestDaemon::start(ScriptedController::new().with_input_pin(11)).await;

    let response = daemon.client().send("OUTPUT 11 HIGH").await.unwrap();
    assert_eq!(
        response,
        Response::Error("Wrong direction exception".to_string())
    );

    daemon.stop().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_input_from_output_pin_is_wrong_direction() {
    let daemon = TestDaemon::start(ScriptedController::new().with_output_pin(12)).await;

    let response = daemon.client().send("INPUT 12").await.unwrap();
    assert_eq!(response.to_string(), "error Wrong direction exception");

    daemon.stop().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_input_reports_true_and_false() {
    let pins = ScriptedController::new().with_read_value(16, true);
    let daemon = TestDaemon::start(pins.clone()).await;
    let client = daemon.client();

    assert_eq!(client.send("INPUT 16").await.unwrap(), Response::True);
    pins.set_read_value(16, false);
    assert_eq!(client.send("INPUT 16").await.unwrap(), Response::False);

    daemon.stop().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_commands_are_case_insensitive() {
    let pins = ScriptedController::new();
    let daemon = TestDaemon::start(pins.clone()).await;
    let client = daemon.client();

    let lower = client.send("setup 16 in pullup").await.unwrap();
    let upper = client.send("SETUP 16 IN PULLUP").await.unwrap();
    assert_eq!(lower, upper);
    assert_eq!(lower, Response::Ok);

    daemon.stop().await.unwrap();

    let setup = PinCall::Setup(16, Direction::Input, SetupOption::Pull(Pull::Up));
    assert_eq!(pins.calls()[1..], [setup.clone(), setup]);
}

#[test_log::test(tokio::test)]
async fn test_error_responses_over_the_socket() {
    let daemon = TestDaemon::start(ScriptedController::new()).await;
    let mut conn = daemon.client().connect().await.unwrap();

    let cases = [
        ("OUTPUT 11", "error Command syntax error: OUTPUT 11"),
        ("OUTPUT foo HIGH", "error Invalid port number"),
        ("OUTPUT", "error Port number not found"),
        ("abc 5 high", "error Command syntax error: abc 5 high"),
        ("SETUP 16 OUT PULLUP", "error Command syntax error: SETUP 16 OUT PULLUP"),
        ("SETUP 16 BOTH", "error Command syntax error: SETUP 16 BOTH"),
    ];
    for (command, expected) in cases {
        let response = conn.command(command).await.unwrap();
        assert_eq!(response.to_string(), expected, "for {command:?}");
    }

    drop(conn);
    daemon.stop().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_setup_out_high_passes_initial_level() {
    let pins = ScriptedController::new();
    let daemon = TestDaemon::start(pins.clone()).await;

    daemon.client().send("SETUP 12 OUT HIGH").await.unwrap();
    daemon.stop().await.unwrap();

    assert!(pins.calls().contains(&PinCall::Setup(
        12,
        Direction::Output,
        SetupOption::Initial(Level::High)
    )));
}

#[test_log::test(tokio::test)]
async fn test_init_file_runs_before_serving_and_skips_comments() {
    let pins = ScriptedController::new();
    let init = "# OUTPUT 99 HIGH\n\nSETUP 11 OUT LOW\nbogus line\nSETUP 16 IN PULLDOWN\n";
    let daemon = TestDaemon::start_with_init(pins.clone(), Some(init)).await;

    // Init commands were applied before the socket came up.
    assert_eq!(
        pins.calls(),
        vec![
            PinCall::Init(PinNumbering::Board),
            PinCall::Setup(11, Direction::Output, SetupOption::Initial(Level::Low)),
            PinCall::Setup(16, Direction::Input, SetupOption::Pull(Pull::Down)),
        ]
    );

    assert_eq!(daemon.client().send("OUTPUT 11 HIGH").await.unwrap(), Response::Ok);
    daemon.stop().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_partial_command_is_discarded_on_disconnect() {
    let pins = ScriptedController::new();
    let daemon = TestDaemon::start(pins.clone()).await;

    let mut stream = UnixStream::connect(&daemon.socket_path).await.unwrap();
    stream.write_all(b"SETUP 16 OU").await.unwrap();
    stream.shutdown().await.unwrap();
    let mut leftover = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut leftover)
        .await
        .unwrap();
    assert!(leftover.is_empty(), "no response for a partial command");
    drop(stream);

    // The daemon is still there and serving new clients.
    assert_eq!(daemon.client().send("SETUP 18 OUT").await.unwrap(), Response::Ok);
    assert!(!daemon.is_finished());

    daemon.stop().await.unwrap();
    assert_eq!(
        pins.calls(),
        vec![
            PinCall::Init(PinNumbering::Board),
            PinCall::Setup(18, Direction::Output, SetupOption::None),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_serves_a_sequence_of_reconnecting_clients() {
    let pins = ScriptedController::new().with_read_value(16, true);
    let daemon = TestDaemon::start(pins).await;

    for _ in 0..10 {
        assert_eq!(daemon.client().send("INPUT 16").await.unwrap(), Response::True);
    }

    daemon.stop().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_pipelined_commands_get_ordered_responses() {
    let daemon = TestDaemon::start(ScriptedController::new().with_read_value(7, true)).await;

    let stream = UnixStream::connect(&daemon.socket_path).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer
        .write_all(b"SETUP 7 IN\nINPUT 7\nINPUT x\nOUTPUT 7\n")
        .await
        .unwrap();

    assert_eq!(read_reply(&mut reader).await, "ok\n");
    assert_eq!(read_reply(&mut reader).await, "true\n");
    assert_eq!(read_reply(&mut reader).await, "error Invalid port number\n");
    assert_eq!(
        read_reply(&mut reader).await,
        "error Command syntax error: OUTPUT 7\n"
    );

    drop(writer);
    drop(reader);
    daemon.stop().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_second_client_waits_for_the_first() {
    let daemon = TestDaemon::start(ScriptedController::new()).await;

    let mut first = daemon.client().connect().await.unwrap();
    assert_eq!(first.command("SETUP 16 OUT").await.unwrap(), Response::Ok);

    let second = UnixStream::connect(&daemon.socket_path).await.unwrap();
    let (reader, mut writer) = second.into_split();
    let mut reader = BufReader::new(reader);
    writer.write_all(b"OUTPUT 16 LOW\n").await.unwrap();

    // Not served while the first client is connected.
    let pending = tokio::time::timeout(Duration::from_millis(200), read_reply(&mut reader)).await;
    assert!(pending.is_err(), "second client answered too early");

    drop(first);
    let reply = tokio::time::timeout(Duration::from_secs(5), read_reply(&mut reader))
        .await
        .expect("second client never served");
    assert_eq!(reply, "ok\n");

    drop(writer);
    drop(reader);
    daemon.stop().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_stop_closes_active_connection_and_removes_socket() {
    let daemon = TestDaemon::start(ScriptedController::new()).await;

    let stream = UnixStream::connect(&daemon.socket_path).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    writer.write_all(b"SETUP 16 OUT\n").await.unwrap();
    assert_eq!(read_reply(&mut reader).await, "ok\n");

    daemon.request_stop();
    daemon.wait_for_exit().await;

    // The daemon hung up on us and cleaned up its socket.
    assert_eq!(read_reply(&mut reader).await, "");
    assert!(!daemon.socket_path.exists());
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn test_hardware_fault_terminates_daemon() {
    init_test_tracing();
    let daemon = TestDaemon::start(ScriptedController::new().with_faulty_pin(13)).await;

    let mut conn = daemon.client().connect().await.unwrap();
    assert_eq!(conn.command("SETUP 12 OUT").await.unwrap(), Response::Ok);
    assert!(conn.command("SETUP 13 OUT").await.is_err());

    daemon.wait_for_exit().await;
    assert!(!daemon.socket_path.exists());
    let result = daemon.join().await;
    assert!(matches!(
        result,
        Err(DaemonError::Server(ServerError::Hardware { .. }))
    ));
}

#[test_log::test(tokio::test)]
async fn test_config_numbering_and_socket_mode() {
    let pins = ScriptedController::new();
    let builder = TestConfigBuilder::new().numbering("bcm").socket_mode(0o600);
    let daemon = TestDaemon::start_with_config(pins.clone(), builder, None).await;

    let mode = std::fs::metadata(&daemon.socket_path)
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);

    assert_eq!(daemon.client().send("SETUP 2 OUT").await.unwrap(), Response::Ok);
    daemon.stop().await.unwrap();

    assert_eq!(pins.calls()[0], PinCall::Init(PinNumbering::Bcm));
}
