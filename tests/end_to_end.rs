// End-to-end tests over real sockets

use flate2::read::GzDecoder;
use reactor_httpd::{start, Config, ServerHandle};
use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

const INDEX: &[u8] = b"<h1>Hello world</h1>";

struct Response {
    head: String,
    body: Vec<u8>,
}

impl Response {
    fn status_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    fn content_length(&self) -> usize {
        self.header("Content-Length").unwrap().parse().unwrap()
    }
}

/// Client that keeps unread bytes between responses on one connection
struct Client {
    stream: TcpStream,
    pending: Vec<u8>,
}

impl Client {
    fn connect(server: &ServerHandle) -> Self {
        let stream = TcpStream::connect(server.local_addr()).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        Self {
            stream,
            pending: Vec::new(),
        }
    }

    fn send(&mut self, raw: &str) {
        self.stream.write_all(raw.as_bytes()).unwrap();
    }

    fn fill(&mut self) {
        let mut buf = [0u8; 4096];
        let n = self.stream.read(&mut buf).unwrap();
        assert!(n > 0, "server closed the connection");
        self.pending.extend_from_slice(&buf[..n]);
    }

    fn read_response(&mut self, expect_body: bool) -> Response {
        let head_end = loop {
            if let Some(pos) = self.pending.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            self.fill();
        };
        let head = String::from_utf8(self.pending.drain(..head_end).collect()).unwrap();
        let mut response = Response {
            head,
            body: Vec::new(),
        };

        if expect_body {
            let length = response.content_length();
            while self.pending.len() < length {
                self.fill();
            }
            response.body = self.pending.drain(..length).collect();
        }
        response
    }

    fn get(&mut self, path: &str, extra_headers: &str) -> Response {
        self.send(&format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n{extra_headers}\r\n"));
        self.read_response(true)
    }
}

struct Fixture {
    server: Option<ServerHandle>,
    root: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("reactor_httpd_e2e_{}_{name}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("index.html"), INDEX).unwrap();
        fs::write(root.join("docs/readme.txt"), b"read me").unwrap();

        let config = Config::from_toml_str(&format!(
            r#"
            [server]
            host = "127.0.0.1"
            port = 0
            root = "{}"
            workers = 2

            [logging]
            level = "warn"
            access_log = false
            "#,
            root.display()
        ))
        .unwrap();

        Self {
            server: Some(start(&config).unwrap()),
            root,
        }
    }

    fn client(&self) -> Client {
        Client::connect(self.server.as_ref().unwrap())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            let _ = server.shutdown();
        }
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[test]
fn test_plain_index() {
    let fixture = Fixture::new("plain");
    let mut client = fixture.client();

    let response = client.get("/", "");
    assert_eq!(response.status_line(), "HTTP/1.1 200 OK");
    assert_eq!(response.header("Content-Type"), Some("text/html"));
    assert_eq!(response.content_length(), 20);
    assert_eq!(response.header("Content-Encoding"), None);
    assert_eq!(response.header("Connection"), Some("keep-alive"));
    assert!(response.header("Last-Modified").unwrap().ends_with("GMT"));
    assert_eq!(response.body, INDEX);
}

#[test]
fn test_gzip_index() {
    let fixture = Fixture::new("gzip");
    let mut client = fixture.client();

    let response = client.get("/index.html", "Accept-Encoding: gzip, deflate\r\n");
    assert_eq!(response.status_line(), "HTTP/1.1 200 OK");
    assert_eq!(response.header("Content-Encoding"), Some("gzip"));
    assert_eq!(response.content_length(), response.body.len());

    let mut decoded = Vec::new();
    GzDecoder::new(&response.body[..]).read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, INDEX);
}

#[test]
fn test_keep_alive_repeats_identical_response() {
    let fixture = Fixture::new("keepalive");
    let mut client = fixture.client();

    let first = client.get("/", "");
    let second = client.get("/", "");
    assert_eq!(first.head, second.head);
    assert_eq!(first.body, second.body);
    assert_eq!(fixture.server.as_ref().unwrap().cache().stats().hits, 1);
}

#[test]
fn test_missing_file_is_404() {
    let fixture = Fixture::new("missing");
    let mut client = fixture.client();

    let response = client.get("/nope.html", "");
    assert_eq!(response.status_line(), "HTTP/1.1 404 Not Found");
    assert_eq!(response.content_length(), 0);

    let traversal = client.get("/../index.html", "");
    assert_eq!(traversal.status_line(), "HTTP/1.1 404 Not Found");

    let encoded_fragment = client.get("/index.html%23gzip", "");
    assert_eq!(encoded_fragment.status_line(), "HTTP/1.1 404 Not Found");
    let zipped = client.get("/index.html", "Accept-Encoding: gzip\r\n");
    assert_eq!(zipped.status_line(), "HTTP/1.1 200 OK");
    assert_eq!(zipped.header("Content-Encoding"), Some("gzip"));

    // Still usable afterwards
    let ok = client.get("/docs/readme.txt", "");
    assert_eq!(ok.status_line(), "HTTP/1.1 200 OK");
    assert_eq!(ok.body, b"read me");
}

#[test]
fn test_head_has_no_body() {
    let fixture = Fixture::new("head");
    let mut client = fixture.client();

    client.send("HEAD / HTTP/1.1\r\nHost: localhost\r\n\r\n");
    let head = client.read_response(false);
    assert_eq!(head.status_line(), "HTTP/1.1 200 OK");
    assert_eq!(head.content_length(), 20);

    // The next response starts right after the head
    let next = client.get("/docs/readme.txt", "");
    assert_eq!(next.status_line(), "HTTP/1.1 200 OK");
    assert_eq!(next.body, b"read me");
}

#[test]
fn test_split_request() {
    let fixture = Fixture::new("split");
    let mut client = fixture.client();

    client.send("GET /docs/readme.txt HTTP/1.1\r\n");
    std::thread::sleep(Duration::from_millis(50));
    client.send("Host: localhost\r\n\r\n");

    let response = client.read_response(true);
    assert_eq!(response.status_line(), "HTTP/1.1 200 OK");
    assert_eq!(response.body, b"read me");
}

#[test]
fn test_concurrent_clients_distinct_resources() {
    let fixture = Fixture::new("concurrent");
    let resources: [(&str, &[u8]); 4] = [
        ("/", INDEX),
        ("/docs/readme.txt", b"read me"),
        ("/index.html", INDEX),
        ("/docs/readme.txt", b"read me"),
    ];
    // Consecutive connections land on different workers
    let mut clients: Vec<Client> = resources.iter().map(|_| fixture.client()).collect();

    for (client, (path, _)) in clients.iter_mut().zip(&resources) {
        client.send(&format!("GET {path} HTTP/1.1\r\n\r\n"));
    }
    for (client, (_, expected)) in clients.iter_mut().zip(&resources) {
        let response = client.read_response(true);
        assert_eq!(response.status_line(), "HTTP/1.1 200 OK");
        assert_eq!(response.body, *expected);
    }

    let cache = fixture.server.as_ref().unwrap().cache();
    assert_eq!(cache.len(), 2);
}
