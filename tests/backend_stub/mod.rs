use std::collections::HashMap;
use std::io::Read as _;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

pub const DOCUMENT: &str = "class7/json_output/ch1.json";
pub const VIDEO_BYTES: usize = 4096;
pub const PDF_BYTES: usize = 2048;

#[derive(Debug, Clone, Default)]
pub struct BackendStubConfig {
    /// Probes of a video that answer with the small "not found" JSON first.
    pub video_pending_probes: usize,
    pub fail_chat: bool,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[allow(dead_code)]
impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is json")
    }
}

pub struct BackendStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl BackendStub {
    pub fn spawn(config: BackendStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start backend stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let mut probes: HashMap<String, usize> = HashMap::new();
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let method = request.method().to_string();
                let path = request.url().to_string();
                let mut body = String::new();
                if !path.starts_with("/upload") {
                    let _ = request.as_reader().read_to_string(&mut body);
                } else {
                    let mut raw = Vec::new();
                    let _ = request.as_reader().read_to_end(&mut raw);
                    body = String::from_utf8_lossy(&raw).into_owned();
                }
                recorded.lock().expect("lock requests").push(RecordedRequest {
                    method: method.clone(),
                    path: path.clone(),
                    body: body.clone(),
                });

                let response = route(&config, &mut probes, &method, &path, &body);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock requests").clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|req| req.path == path)
            .collect()
    }
}

impl Drop for BackendStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

type Reply = tiny_http::Response<std::io::Cursor<Vec<u8>>>;

fn json_reply(status: u16, body: Value) -> Reply {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_data(body.to_string().into_bytes())
        .with_status_code(status)
        .with_header(header)
}

fn bytes_reply(len: usize) -> Reply {
    let header =
        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/octet-stream"[..])
            .expect("build header");
    tiny_http::Response::from_data(vec![b'x'; len]).with_header(header)
}

fn chapter_of(filename: &str) -> &str {
    filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .trim_end_matches(".json")
}

fn route(
    config: &BackendStubConfig,
    probes: &mut HashMap<String, usize>,
    method: &str,
    path: &str,
    body: &str,
) -> Reply {
    if method == "GET" {
        return match path {
            "/" => json_reply(
                200,
                json!({"status": "System Online", "message": "AI Teaching Assistant backend"}),
            ),
            "/files" => json_reply(
                200,
                json!([{
                    "folder": "class7",
                    "files": [{
                        "filename": DOCUMENT,
                        "display_name": "Class 7 Maths",
                        "topics": ["Fractions", "Geometry"],
                        "topic_count": 2
                    }]
                }]),
            ),
            "/dashboard/analytics" => json_reply(
                200,
                json!({
                    "spider_data": [
                        {"subject": "Fractions", "A": 80.0, "fullMark": 100},
                        {"subject": "Geometry", "A": 40.0, "fullMark": 100}
                    ],
                    "weakest_topics": [{"topic": "Geometry", "score": 40.0}],
                    "recent_activity": [{
                        "id": 1,
                        "topic": "Geometry",
                        "score": 2,
                        "total_questions": 5,
                        "date": "2026-03-01T10:00:00Z",
                        "weak_subtopics": ["Angles"]
                    }],
                    "recommendations": [{
                        "topic": "Geometry",
                        "suggestion": "Revisit angle properties.",
                        "sources": [{"topic": "Lines and Angles"}]
                    }]
                }),
            ),
            _ => match path.strip_prefix("/download/") {
                Some(name) => download(probes, config, name),
                None => json_reply(404, json!({"detail": "Not Found"})),
            },
        };
    }

    if method != "POST" {
        return json_reply(405, json!({"detail": "Method Not Allowed"}));
    }

    if path == "/upload" {
        return json_reply(
            200,
            json!({"status": "success", "message": "File processed successfully", "json_file": "ch1.json"}),
        );
    }
    if path == "/quiz/submit" {
        return json_reply(200, json!({"status": "success"}));
    }
    if path == "/chat" {
        if config.fail_chat {
            return json_reply(500, json!({"error": "LLM unavailable"}));
        }
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_default();
        return json_reply(
            200,
            json!({
                "answer": format!("You asked: **{message}**"),
                "sources": [{"topic": "Fractions"}],
                "chapter": "ch1",
                "relevance": 0.82
            }),
        );
    }

    let Some(kind) = path.strip_prefix("/generate/") else {
        return json_reply(404, json!({"detail": "Not Found"}));
    };
    let Ok(request) = serde_json::from_str::<Value>(body) else {
        return json_reply(422, json!({"detail": "invalid json"}));
    };
    let filename = request.get("filename").and_then(Value::as_str).unwrap_or("");
    let Some(topic_index) = request.get("topic_index").and_then(Value::as_u64) else {
        return json_reply(422, json!({"detail": "topic_index is required"}));
    };
    if filename != DOCUMENT {
        return json_reply(404, json!({"detail": "File not found"}));
    }
    let chapter = chapter_of(filename);

    match kind {
        "plan" | "practice" => {
            let prefix = if kind == "plan" { "Plan" } else { "Practice" };
            let name = format!("{prefix}_{chapter}_{topic_index}.pdf");
            json_reply(
                200,
                json!({"status": "success", "file_url": format!("/download/{name}"), "filename": name}),
            )
        }
        "video" => {
            let name = format!("Video_{chapter}_{topic_index}.mp4");
            json_reply(
                200,
                json!({"status": "processing", "filename": name, "check_url": format!("/download/{name}")}),
            )
        }
        "quiz" => json_reply(
            200,
            json!({
                "status": "success",
                "file_url": format!("/download/Quiz_{chapter}_{topic_index}.pdf"),
                "filename": format!("Quiz_{chapter}_{topic_index}.pdf"),
                "data": {
                    "topic": "Fractions",
                    "class_level": "7",
                    "difficulty": "medium",
                    "duration_minutes": 10,
                    "questions": [
                        {
                            "type": "mcq",
                            "question": "Which fraction equals one half?",
                            "options": ["2/4", "2/3", "3/4"],
                            "correct": "2/4",
                            "blooms_level": "Remember",
                            "learning_objective": "Equivalent fractions"
                        },
                        {
                            "type": "mcq",
                            "question": "Which is the largest?",
                            "options": ["1/2", "2/3", "3/4"],
                            "correct": "3/4",
                            "blooms_level": "Analyze",
                            "learning_objective": "Comparing fractions"
                        }
                    ]
                }
            }),
        ),
        "flashcards" => json_reply(
            200,
            json!({
                "status": "success",
                "data": [
                    {"front": "Numerator", "back": "The **top** number", "type": "definition"},
                    {"front": "Denominator", "back": "The bottom number", "type": "definition"}
                ]
            }),
        ),
        "youtube" | "resources" => json_reply(
            200,
            json!({
                "status": "success",
                "data": [{
                    "id": "abc123",
                    "title": "Fractions in 5 minutes",
                    "description": "A quick intro",
                    "thumbnail": "https://img.example.test/abc123.jpg",
                    "channel": "Maths Corner",
                    "url": "https://www.youtube.com/watch?v=abc123",
                    "embed_url": "https://www.youtube.com/embed/abc123"
                }]
            }),
        ),
        _ => json_reply(404, json!({"detail": "Not Found"})),
    }
}

fn download(
    probes: &mut HashMap<String, usize>,
    config: &BackendStubConfig,
    name: &str,
) -> Reply {
    if name.starts_with("Video_") {
        let seen = probes.entry(name.to_owned()).or_insert(0);
        *seen += 1;
        if *seen <= config.video_pending_probes {
            return missing_file();
        }
        return bytes_reply(VIDEO_BYTES);
    }
    if name.starts_with("Plan_") || name.starts_with("Practice_") || name.starts_with("Quiz_") {
        return bytes_reply(PDF_BYTES);
    }
    missing_file()
}

/// The backend returns (rather than raises) its 404, so it goes out as a 200.
fn missing_file() -> Reply {
    json_reply(
        200,
        json!({"status_code": 404, "detail": "File not found", "headers": null}),
    )
}
