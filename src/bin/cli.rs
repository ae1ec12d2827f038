// Attendance Server CLI
// Drives the REST API and the live attendance channel from a terminal

use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use std::io::{self, Write};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

#[derive(Parser)]
#[command(name = "attendance-cli")]
#[command(about = "Attendance Server CLI", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:8080)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Create an account
    Signup {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// teacher or student
        #[arg(short, long, default_value = "student")]
        role: String,
    },

    /// Log in and print an access token
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create a class (teacher)
    CreateClass {
        #[arg(short, long)]
        token: String,

        #[arg(short, long)]
        name: String,
    },

    /// Enroll a student in a class (teacher)
    AddStudent {
        #[arg(short, long)]
        token: String,

        #[arg(short, long)]
        class_id: String,

        #[arg(short = 'i', long)]
        student_id: String,
    },

    /// Start the live attendance session for a class (teacher)
    Start {
        #[arg(short, long)]
        token: String,

        #[arg(short, long)]
        class_id: String,
    },

    /// Open the live channel and send events interactively
    Live {
        #[arg(short, long)]
        token: String,
    },

    /// Run a full roll call against the server and check every step
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let api = ApiClient::new(&cli.server);

    match &cli.command {
        Commands::Health => check_health(&api).await,
        Commands::Signup {
            name,
            email,
            password,
            role,
        } => {
            let body = json!({ "name": name, "email": email, "password": password, "role": role });
            print_result("Signup", api.post("/auth/signup", None, body).await);
        }
        Commands::Login { email, password } => {
            let body = json!({ "email": email, "password": password });
            match api.post("/auth/login", None, body).await {
                Ok(data) => {
                    println!("{} Logged in", "✓".green());
                    println!("{}", data["token"].as_str().unwrap_or_default());
                }
                Err(e) => println!("{} Login failed: {}", "✗".red(), e),
            }
        }
        Commands::CreateClass { token, name } => {
            let body = json!({ "className": name });
            print_result("Create class", api.post("/class", Some(token.as_str()), body).await);
        }
        Commands::AddStudent {
            token,
            class_id,
            student_id,
        } => {
            let body = json!({ "studentId": student_id });
            let path = format!("/class/{}/add-student", class_id);
            print_result("Add student", api.post(&path, Some(token.as_str()), body).await);
        }
        Commands::Start { token, class_id } => {
            let body = json!({ "classId": class_id });
            print_result("Start session", api.post("/attendance/start", Some(token.as_str()), body).await);
        }
        Commands::Live { token } => interactive_mode(&cli.server, token).await,
        Commands::Validate => run_validation(&api, &cli.server).await,
    }
}

/// Thin wrapper over the `{success, data|error}` envelope
struct ApiClient {
    base: String,
    client: reqwest::Client,
}

impl ApiClient {
    fn new(server: &str) -> Self {
        Self {
            base: format!("http://{}", server),
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Result<Value, String> {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if let Some(token) = token {
            request = request.header("authorization", token);
        }
        Self::unwrap_envelope(request.send().await).await
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<Value, String> {
        let mut request = self.client.post(format!("{}{}", self.base, path)).json(&body);
        if let Some(token) = token {
            request = request.header("authorization", token);
        }
        Self::unwrap_envelope(request.send().await).await
    }

    async fn unwrap_envelope(
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<Value, String> {
        let response = response.map_err(|e| format!("cannot reach server: {}", e))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("invalid response ({}): {}", status, e))?;

        if body["success"] == true {
            Ok(body["data"].clone())
        } else {
            Err(format!(
                "{} {}",
                status,
                body["error"].as_str().unwrap_or("unknown error")
            ))
        }
    }
}

fn print_result(action: &str, result: Result<Value, String>) {
    match result {
        Ok(data) => {
            println!("{} {} succeeded", "✓".green(), action);
            println!("{}", serde_json::to_string_pretty(&data).unwrap_or_default());
        }
        Err(e) => println!("{} {} failed: {}", "✗".red(), action, e),
    }
}

async fn check_health(api: &ApiClient) {
    println!("{}", "Checking server health...".cyan());

    match api.get("/health", None).await {
        Ok(body) => {
            println!("{} Health check passed", "✓".green());
            println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("  Service: {}", body["service"].as_str().unwrap_or("unknown"));
            println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
            println!("  Live connections: {}", body["connections"]);
            match body["activeSession"].as_object() {
                Some(session) => println!(
                    "  Active session: class {}",
                    session.get("classId").and_then(Value::as_str).unwrap_or("?")
                ),
                None => println!("  Active session: none"),
            }
        }
        Err(e) => {
            println!("{} Health check failed: {}", "✗".red(), e);
        }
    }
}

async fn connect_live(server: &str, token: &str) -> Result<(WsWrite, WsRead), String> {
    let url = format!("ws://{}/ws?token={}", server, urlencoding::encode(token));
    let (stream, _) = connect_async(&url)
        .await
        .map_err(|e| format!("WebSocket connection failed: {}", e))?;
    Ok(stream.split())
}

/// Expand the console shortcuts into protocol frames
fn parse_command(input: &str) -> Option<Value> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    match parts.as_slice() {
        ["mark", student_id, status] => Some(json!({
            "event": "ATTENDANCE_MARKED",
            "data": { "studentId": student_id, "status": status }
        })),
        ["summary"] => Some(json!({ "event": "TODAY_SUMMARY" })),
        ["me"] => Some(json!({ "event": "MY_ATTENDANCE" })),
        ["done"] => Some(json!({ "event": "DONE" })),
        _ => serde_json::from_str(input).ok(),
    }
}

async fn interactive_mode(server: &str, token: &str) {
    println!("\n{}", "Live Attendance Console".bold().green());
    println!("{}", "═".repeat(60).green());
    println!("Type {} for help, {} to quit\n", "help".cyan(), "quit".cyan());

    let (mut write, mut read) = match connect_live(server, token).await {
        Ok(split) => split,
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            return;
        }
    };
    println!("{} Connected to live channel", "✓".green());

    let receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = read.next().await {
            if let Message::Text(text) = msg {
                println!("\n{} {}", "◀".green(), text.bright_white());
            }
        }
    });

    loop {
        print!("{} ", "►".cyan());
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            println!("Goodbye!");
            break;
        }
        if input == "help" {
            print_interactive_help();
            continue;
        }

        match parse_command(input) {
            Some(frame) => {
                if write.send(Message::Text(frame.to_string())).await.is_err() {
                    println!("{} Connection lost", "✗".red());
                    break;
                }
            }
            None => println!("{} Unrecognized input. Type 'help' for examples.", "✗".yellow()),
        }
    }

    let _ = write.close().await;
    receive_task.abort();
}

fn print_interactive_help() {
    println!("\n{}", "Live Console Commands".bold());
    println!("{}", "─".repeat(60));
    println!("  {}   mark a student (teacher)", "mark <studentId> present|absent".cyan());
    println!("  {}                          broadcast the running tally (teacher)", "summary".cyan());
    println!("  {}                               ask for your own status (student)", "me".cyan());
    println!("  {}                             close and persist the session (teacher)", "done".cyan());
    println!("\nRaw JSON frames are sent as-is:");
    println!(r#"  {{"event":"ATTENDANCE_MARKED","data":{{"studentId":"s100","status":"present"}}}}"#);
    println!("\n{}: quit, exit", "Commands".bold());
    println!();
}

async fn next_event(read: &mut WsRead) -> Result<Value, String> {
    loop {
        let msg = timeout(Duration::from_secs(3), read.next())
            .await
            .map_err(|_| "timed out waiting for message".to_string())?
            .ok_or_else(|| "connection closed".to_string())?
            .map_err(|e| format!("socket error: {}", e))?;

        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).map_err(|e| format!("invalid frame: {}", e));
        }
    }
}

async fn send_event(write: &mut WsWrite, frame: Value) -> Result<(), String> {
    write
        .send(Message::Text(frame.to_string()))
        .await
        .map_err(|e| format!("send failed: {}", e))
}

fn check(label: &str, ok: bool) -> bool {
    if ok {
        println!("  {} {}", "✓".green(), label);
    } else {
        println!("  {} {}", "✗".red(), label);
    }
    ok
}

struct Participant {
    id: String,
    token: String,
}

async fn provision(api: &ApiClient, name: &str, role: &str, tag: u32) -> Result<Participant, String> {
    let email = format!("{}.{}@validate.local", name.to_lowercase(), tag);
    let password = "validate-pass";

    let user = api
        .post(
            "/auth/signup",
            None,
            json!({ "name": name, "email": email, "password": password, "role": role }),
        )
        .await?;
    let login = api
        .post("/auth/login", None, json!({ "email": email, "password": password }))
        .await?;

    Ok(Participant {
        id: user["id"].as_str().unwrap_or_default().to_string(),
        token: login["token"].as_str().unwrap_or_default().to_string(),
    })
}

async fn run_validation(api: &ApiClient, server: &str) {
    println!("\n{}", "Roll Call Validation".bold().green());
    println!("{}", "═".repeat(60).green());

    match validate_roll_call(api, server).await {
        Ok(true) => println!("\n{} All checks passed", "✓".green().bold()),
        Ok(false) => println!("\n{} Some checks failed", "✗".red().bold()),
        Err(e) => println!("\n{} Validation aborted: {}", "✗".red().bold(), e),
    }
}

async fn validate_roll_call(api: &ApiClient, server: &str) -> Result<bool, String> {
    let tag: u32 = rand::thread_rng().gen_range(100000..999999);
    let mut passed = true;

    println!("{}", "Provisioning accounts...".cyan());
    let teacher = provision(api, "Teacher", "teacher", tag).await?;
    let present = provision(api, "Present", "student", tag).await?;
    let absent = provision(api, "Absent", "student", tag).await?;

    let class = api
        .post("/class", Some(teacher.token.as_str()), json!({ "className": format!("c{}", tag) }))
        .await?;
    let class_id = class["id"].as_str().unwrap_or_default().to_string();
    for student in [&present, &absent] {
        api.post(
            &format!("/class/{}/add-student", class_id),
            Some(teacher.token.as_str()),
            json!({ "studentId": student.id }),
        )
        .await?;
    }
    api.post("/attendance/start", Some(teacher.token.as_str()), json!({ "classId": class_id }))
        .await?;
    println!("  Class {} ready, session started", class_id);

    println!("{}", "Running live session...".cyan());
    let (mut teacher_tx, mut teacher_rx) = connect_live(server, &teacher.token).await?;
    let (mut student_tx, mut student_rx) = connect_live(server, &present.token).await?;

    // Round trip an unknown event so both connections are registered
    send_event(&mut teacher_tx, json!({ "event": "PING" })).await?;
    next_event(&mut teacher_rx).await?;
    send_event(&mut student_tx, json!({ "event": "PING" })).await?;
    next_event(&mut student_rx).await?;

    send_event(&mut teacher_tx, json!({ "event": "TODAY_SUMMARY" })).await?;
    let summary = next_event(&mut teacher_rx).await?;
    next_event(&mut student_rx).await?;
    passed &= check(
        "empty summary broadcast",
        summary["data"] == json!({ "present": 0, "absent": 0, "total": 0 }),
    );

    send_event(
        &mut teacher_tx,
        json!({ "event": "ATTENDANCE_MARKED", "data": { "studentId": present.id, "status": "present" } }),
    )
    .await?;
    let echo = next_event(&mut student_rx).await?;
    next_event(&mut teacher_rx).await?;
    passed &= check("mark echoed to student", echo["event"] == "ATTENDANCE_MARKED");

    send_event(&mut student_tx, json!({ "event": "MY_ATTENDANCE" })).await?;
    let mine = next_event(&mut student_rx).await?;
    passed &= check("self-status is present", mine["data"]["status"] == "present");

    send_event(
        &mut student_tx,
        json!({ "event": "ATTENDANCE_MARKED", "data": { "studentId": present.id, "status": "absent" } }),
    )
    .await?;
    let rejected = next_event(&mut student_rx).await?;
    passed &= check("student mark rejected", rejected["event"] == "ERROR");

    send_event(&mut teacher_tx, json!({ "event": "DONE" })).await?;
    let done = next_event(&mut teacher_rx).await?;
    next_event(&mut student_rx).await?;
    passed &= check(
        "final summary present=1 absent=1 total=2",
        done["data"]["present"] == 1 && done["data"]["absent"] == 1 && done["data"]["total"] == 2,
    );

    let _ = teacher_tx.close().await;
    let _ = student_tx.close().await;

    println!("{}", "Checking stored results...".cyan());
    let path = format!("/class/{}/my-attendance", class_id);
    let stored = api.get(&path, Some(present.token.as_str())).await?;
    passed &= check("present student stored as present", stored["status"] == "present");
    let stored = api.get(&path, Some(absent.token.as_str())).await?;
    passed &= check("unmarked student stored as absent", stored["status"] == "absent");

    let health = api.get("/health", None).await?;
    passed &= check("session closed", health["activeSession"].is_null());

    Ok(passed)
}
