use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use party_bench::{Listening, Request, Response, Server, ServerConfig};

#[allow(dead_code)]
mod support;

fn request_in_background(addr: SocketAddr, tx: mpsc::Sender<(Instant, String)>) {
    thread::spawn(move || {
        let content = support::send_raw(addr, "GET / HTTP/1.0\r\n\r\n");
        tx.send((Instant::now(), content)).unwrap();
    });
}

fn wait_for_connections(server: &Listening, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while server.num_connections() != expected {
        assert!(
            Instant::now() < deadline,
            "expected {} open connections, found {}",
            expected,
            server.num_connections()
        );
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn party_of_four_completes_together() {
    let server = support::new_party_server(4);
    let addr = server.server_addr();
    let (tx, rx) = mpsc::channel();

    for _ in 0..3 {
        request_in_background(addr, tx.clone());
    }

    // three guests are not a party
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

    request_in_background(addr, tx);

    let mut completions = Vec::new();
    for _ in 0..4 {
        let (at, content) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(content.starts_with("HTTP/1.0 200 OK\r\n"), "{}", content);
        assert!(content.contains("Connection: close\r\n"));
        completions.push(at);
    }

    let first = *completions.iter().min().unwrap();
    let last = *completions.iter().max().unwrap();
    assert!(last - first < Duration::from_millis(250));
}

#[test]
fn surplus_connections_wait_for_the_next_generation() {
    let server = support::new_party_server(2);
    let addr = server.server_addr();

    // two silent connections take both slots
    let mut first = TcpStream::connect(addr).unwrap();
    let mut second = TcpStream::connect(addr).unwrap();
    wait_for_connections(&server, 2);

    let (tx, rx) = mpsc::channel();
    for _ in 0..6 {
        request_in_background(addr, tx.clone());
    }

    let deadline = Instant::now() + Duration::from_millis(300);
    while Instant::now() < deadline {
        assert!(server.num_connections() <= 2);
        thread::sleep(Duration::from_millis(10));
    }
    // the surplus clients are still in the backlog
    assert!(rx.try_recv().is_err());

    for client in [&mut first, &mut second] {
        client.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        client.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
    }
    for client in [&mut first, &mut second] {
        let mut content = String::new();
        client.read_to_string(&mut content).unwrap();
        assert!(content.starts_with("HTTP/1.0 200 OK\r\n"), "{}", content);
    }

    for _ in 0..6 {
        let (_, content) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(content.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(server.num_connections() <= 2);
    }

    wait_for_connections(&server, 0);
}

#[test]
fn idle_server_has_no_open_connections() {
    let server = support::new_party_server(2);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(server.num_connections(), 0);
}

#[test]
fn warm_workers_match_the_party_size() {
    let server = support::new_party_server(5);
    assert_eq!(server.num_workers(), 5);
}

#[test]
fn keep_alive_serves_pipelined_requests() {
    let server = support::new_party_server(1);

    let content = support::send_raw(
        server.server_addr(),
        "GET / HTTP/1.1\r\nHost: localhost\r\n\r\nGET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );

    assert_eq!(content.matches("HTTP/1.1 200 OK\r\n").count(), 2);
    assert!(content.contains("Connection: keep-alive\r\n"));
    assert!(content.ends_with("Connection: close\r\n\r\n"));
}

#[test]
fn http_1_0_connection_close() {
    let server = support::new_party_server(1);

    let content = support::send_raw(server.server_addr(), "GET / HTTP/1.0\r\nHost: localhost\r\n\r\n");
    assert!(content.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(content.contains("Content-Length: 0\r\n"));
}

#[test]
fn wrong_request_line() {
    let server = support::new_party_server(1);

    let content = support::send_raw(server.server_addr(), "qsd qsd qsd\r\n\r\n");
    assert!(content.starts_with("HTTP/1.1 400"), "{}", content);
}

#[test]
fn newer_http_version_is_refused_and_closed() {
    let server = support::new_party_server(1);

    let content = support::send_raw(
        server.server_addr(),
        "GET / HTTP/2.0\r\nHost: localhost\r\n\r\nGET / HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    assert!(content.starts_with("HTTP/1.1 505"), "{}", content);
    assert!(content.contains("Connection: close\r\n"));
    assert_eq!(content.matches("HTTP/1.1 ").count(), 1, "{}", content);
}

#[test]
fn unsupported_expect_header() {
    let server = support::new_party_server(1);

    let content = support::send_raw(
        server.server_addr(),
        "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nExpect: 189-dummy\r\n\r\n",
    );
    assert!(content[9..].starts_with("417"), "{}", content);
}

#[test]
fn body_is_read_before_handling() {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = Server::new(ServerConfig::new(addr).with_min_spare_workers(1))
        .route("/echo", |rq: &Request| Response::from_data(rq.body().to_vec()))
        .start()
        .unwrap();

    let content = support::send_raw(
        server.server_addr(),
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: 5\r\n\r\nhello",
    );
    assert!(content.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(content.ends_with("\r\n\r\nhello"));

    let content = support::send_raw(
        server.server_addr(),
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
    );
    assert!(content.ends_with("\r\n\r\nhello"), "{}", content);

    let content = support::send_raw(server.server_addr(), "GET /missing HTTP/1.0\r\n\r\n");
    assert!(content.starts_with("HTTP/1.0 404"));
}

#[test]
fn expect_100_continue() {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = Server::new(ServerConfig::new(addr))
        .route("/", |rq: &Request| Response::from_data(rq.body().to_vec()))
        .start()
        .unwrap();

    let mut client = TcpStream::connect(server.server_addr()).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    write!(
        client,
        "POST / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nExpect: 100-continue\r\nContent-Length: 5\r\n\r\n"
    )
    .unwrap();
    client.flush().unwrap();

    let mut content = vec![0; 25];
    client.read_exact(&mut content).unwrap();
    assert_eq!(&content[..], b"HTTP/1.1 100 Continue\r\n\r\n");

    write!(client, "hello").unwrap();
    let mut rest = String::new();
    client.read_to_string(&mut rest).unwrap();
    assert!(rest.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(rest.ends_with("hello"));
}

#[test]
fn bind_failure_is_reported() {
    let taken = support::new_party_server(1);
    let addr = taken.server_addr();

    // SO_REUSEADDR doesn't allow two listeners on the same port
    match Server::new(ServerConfig::new(addr)).start() {
        Err(party_bench::Error::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("second listener bound to {}", addr),
    }
}
