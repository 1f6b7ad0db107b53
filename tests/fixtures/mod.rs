//! Shared fixtures: a minimal webhook stub server and terraform stub
//! scripts for driving the engine without real infrastructure.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use driftwatch::config::{AlertChannel, ChannelKind, Project};

/// Bare-bones HTTP endpoint that counts requests and answers with a
/// scripted sequence of status lines (the last one repeats).
pub struct WebhookStub {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    hit_times: Arc<std::sync::Mutex<Vec<Instant>>>,
}

impl WebhookStub {
    pub async fn start(status_line: &'static str) -> Self {
        Self::start_sequence(vec![status_line]).await
    }

    pub async fn start_sequence(status_lines: Vec<&'static str>) -> Self {
        assert!(!status_lines.is_empty());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hit_times = Arc::new(std::sync::Mutex::new(Vec::new()));

        let counter = hits.clone();
        let times = hit_times.clone();
        let queue = Arc::new(Mutex::new(status_lines));
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                times.lock().unwrap().push(Instant::now());

                let status = {
                    let mut queue = queue.lock().await;
                    if queue.len() > 1 {
                        queue.remove(0)
                    } else {
                        queue[0]
                    }
                };

                read_request(&mut stream).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    status
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            addr,
            hits,
            hit_times,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Elapsed time between consecutive request arrivals, in order.
    pub fn hit_gaps(&self) -> Vec<Duration> {
        let times = self.hit_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

/// Consume the POST (headers plus content-length body) before replying so
/// the client never sees a reset mid-request.
async fn read_request(stream: &mut tokio::net::TcpStream) {
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0;

    loop {
        match stream.read(&mut buf[total..]).await {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                if request_complete(&buf[..total]) || total == buf.len() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

fn request_complete(data: &[u8]) -> bool {
    let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&data[..pos]);
    data.len() >= pos + 4 + content_length(&headers)
}

fn content_length(headers: &str) -> usize {
    for line in headers.lines() {
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            return value.trim().parse().unwrap_or(0);
        }
    }
    0
}

/// Executable standing in for terraform: `init`/`version` succeed, `plan`
/// prints a change-count line and exits with the given code.
#[cfg(unix)]
pub fn terraform_stub(dir: &Path, plan_exit: i32) -> PathBuf {
    let script = format!(
        "#!/bin/sh\n\
         case \"$1\" in\n\
           plan)\n\
             echo \"Plan: 1 to add, 0 to change, 0 to destroy.\"\n\
             exit {}\n\
             ;;\n\
           *)\n\
             exit 0\n\
             ;;\n\
         esac\n",
        plan_exit
    );
    write_stub(dir, &script)
}

/// Stub whose `init` fails with a backend configuration error.
#[cfg(unix)]
pub fn terraform_stub_failing_init(dir: &Path) -> PathBuf {
    let script = "#!/bin/sh\n\
                  case \"$1\" in\n\
                    init)\n\
                      echo \"Error loading backend config: bucket missing\" >&2\n\
                      exit 1\n\
                      ;;\n\
                    *)\n\
                      exit 0\n\
                      ;;\n\
                  esac\n";
    write_stub(dir, script)
}

#[cfg(unix)]
fn write_stub(dir: &Path, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("terraform-stub.sh");
    std::fs::write(&path, script).unwrap();

    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

pub fn project(name: &str, path: &Path, channels: &[&str]) -> Project {
    Project {
        name: name.to_string(),
        path: path.to_path_buf(),
        credential_profile: None,
        alert_channels: channels.iter().map(|c| c.to_string()).collect(),
        enabled: true,
    }
}

pub fn slack_channel(name: &str, webhook_url: &str) -> AlertChannel {
    AlertChannel {
        name: name.to_string(),
        kind: ChannelKind::Slack,
        config: HashMap::from([("webhook_url".to_string(), webhook_url.to_string())]),
        enabled: true,
    }
}
