use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use party_bench::{party, Listening, Server, ServerConfig};

/// What the stub servers answer with.
pub const STUB_RESPONSE: &[u8] = b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n";

/// Starts a server that reads a request head, waits `latency`, answers with
/// `STUB_RESPONSE` and closes. One thread per connection, so latency doesn't
/// serialize clients.
pub fn new_stub_server(latency: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(_) => continue,
            };
            thread::spawn(move || {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line) {
                        Ok(0) | Err(_) => break,
                        Ok(_) if line == "\r\n" => break,
                        Ok(_) => {}
                    }
                }
                if !latency.is_zero() {
                    thread::sleep(latency);
                }
                stream.write_all(STUB_RESPONSE).ok();
            });
        }
    });

    addr
}

/// Starts a barrier server for a party of `n` on a random loopback port.
pub fn new_party_server(n: usize) -> Listening {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let concurrency = NonZeroUsize::new(n).unwrap();
    party::serve(Server::new(ServerConfig::new(addr)), addr, concurrency).unwrap()
}

/// An address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Sends `raw` on a fresh connection and reads until the server closes it.
pub fn send_raw(addr: SocketAddr, raw: &str) -> String {
    let mut client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    client.write_all(raw.as_bytes()).unwrap();

    let mut content = String::new();
    client.read_to_string(&mut content).unwrap();
    content
}
