use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tiny_http::{Response, Server, StatusCode};

use crate::config::ExtractorConfig;

type Routes = Arc<Mutex<HashMap<String, (u16, Vec<u8>)>>>;

/// Plain-HTTP stand-in for a camera's HLS endpoint. Unknown paths get 404.
pub struct MockHlsServer {
    server: Arc<Server>,
    addr: SocketAddr,
    routes: Routes,
    hits: Arc<Mutex<Vec<String>>>,
}

impl MockHlsServer {
    pub fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind mock server"));
        let addr = server
            .server_addr()
            .to_ip()
            .expect("mock server listens on tcp");
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let hits = Arc::new(Mutex::new(Vec::new()));

        {
            let server = server.clone();
            let routes = routes.clone();
            let hits = hits.clone();
            thread::spawn(move || {
                for req in server.incoming_requests() {
                    let url = req.url().to_string();
                    hits.lock().expect("lock hits").push(url.clone());

                    let route = routes.lock().expect("lock routes").get(&url).cloned();
                    let response = match route {
                        Some((status, body)) => {
                            Response::from_data(body).with_status_code(StatusCode(status))
                        }
                        None => Response::from_data(Vec::new()).with_status_code(StatusCode(404)),
                    };
                    let _ = req.respond(response);
                }
            });
        }

        Self {
            server,
            addr,
            routes,
            hits,
        }
    }

    pub fn route(&self, path: &str, status: u16, body: &[u8]) {
        self.routes
            .lock()
            .expect("lock routes")
            .insert(path.to_string(), (status, body.to_vec()));
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().expect("lock hits").clone()
    }
}

impl Drop for MockHlsServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

/// Answers one request with a 200 announcing `total` body bytes, then sends
/// them one at a time every `every`. The receiver yields how many bytes went
/// out before the client hung up.
pub fn trickling_server(total: usize, every: Duration) -> (String, Receiver<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind trickling server");
    let addr = listener.local_addr().expect("trickling server addr");
    let (done_tx, done_rx) = mpsc::channel();

    thread::spawn(move || {
        let Ok((mut conn, _)) = listener.accept() else {
            return;
        };
        let mut request = [0u8; 2048];
        let _ = conn.read(&mut request);
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: video/mp2t\r\nContent-Length: {}\r\n\r\n",
            total
        );
        let _ = conn.write_all(head.as_bytes());

        let mut sent = 0;
        while sent < total {
            if conn.write_all(&[0x47]).and_then(|_| conn.flush()).is_err() {
                break;
            }
            sent += 1;
            thread::sleep(every);
        }
        let _ = done_tx.send(sent);
    });

    (format!("http://{}", addr), done_rx)
}

/// Extractor that drains stdin and prints `output`, via `sh`.
pub fn mock_extractor(output: &[u8]) -> ExtractorConfig {
    shell_extractor(&format!("cat > /dev/null; printf '{}'", printf_escape(output)))
}

/// Extractor that drains stdin and fails.
pub fn failing_extractor() -> ExtractorConfig {
    shell_extractor("cat > /dev/null; echo 'Invalid data found when processing input' >&2; exit 1")
}

pub fn shell_extractor(script: &str) -> ExtractorConfig {
    ExtractorConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
    }
}

fn printf_escape(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{:03o}", b)).collect()
}

/// Smallest byte sequence the extractor accepts as a JPEG.
pub const FAKE_JPEG: &[u8] = b"\xFF\xD8\xFF\xE0fake-jpeg\xFF\xD9";
