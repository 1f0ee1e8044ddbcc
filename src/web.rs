//! Web surface: an explicit route table of uniform handlers.
//!
//! [`crate::adapters::http`] hands each request target
//! (`/upd?lastupdate=...`) to [`Router::handle_target`] and writes back the
//! [`Response`].  Handlers never touch door state directly: they
//! read published snapshots, park long-poll requests and enqueue commands.
//!
//! | Route      | Handler              |
//! |------------|----------------------|
//! | `upd`      | long-poll updates    |
//! | `cfg`      | door snapshot        |
//! | `clk`      | manual relay click   |
//! | `closeall` | close every open door|
//! | `mot`      | simulated motion     |
//! | `upt`      | host uptime          |
//! | `log`      | log tail             |

use core::cell::RefCell;
use core::time::Duration;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use burster::Limiter;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};
use serde::Serialize;

use crate::app::commands::{AppCommand, CommandQueue};
use crate::app::ports::Clock;
use crate::app::service::close_all_summary;
use crate::config::SiteConfig;
use crate::fsm::DoorState;
use crate::stream::{PendingUpdate, Subscription, UpdateRecord, UpdateStream};
use crate::timekeeper::format_span;

/// Lines of the log file shown by the `log` route.
pub const LOG_TAIL_LINES: usize = 60;

const DEFAULT_UPTIME_FILE: &str = "/proc/uptime";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Path without the leading slash, plus the decoded query pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    /// Split a request target into path and percent-decoded query.
    pub fn parse(target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            path: path.trim_start_matches('/').to_string(),
            query: url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    /// First value for `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Response {
    Json(String),
    Html(String),
    Text(String),
    /// Long-poll request waiting for a publish.
    Pending(LongPoll),
    BadRequest(&'static str),
    NotFound,
    /// The door is moving; manual actuation refused.
    Conflict(String),
    TooManyRequests,
    /// The command queue is full.
    ServiceUnavailable,
}

impl Response {
    pub fn status(&self) -> u16 {
        match self {
            Self::Json(_) | Self::Html(_) | Self::Text(_) | Self::Pending(_) => 200,
            Self::BadRequest(_) => 400,
            Self::NotFound => 404,
            Self::Conflict(_) => 409,
            Self::TooManyRequests => 429,
            Self::ServiceUnavailable => 503,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json(_) | Self::Pending(_) => "application/json",
            Self::Html(_) => "text/html",
            _ => "text/plain",
        }
    }

    /// Body text; empty for `Pending`.
    pub fn body(&self) -> &str {
        match self {
            Self::Json(s) | Self::Html(s) | Self::Text(s) | Self::Conflict(s) => s,
            Self::BadRequest(s) => s,
            Self::Pending(_) => "",
            Self::NotFound => "Not Found",
            Self::TooManyRequests => "Too Many Requests",
            Self::ServiceUnavailable => "Service Unavailable",
        }
    }
}

/// A parked `upd` request plus what is needed to format its answer.
#[derive(Debug)]
pub struct LongPoll {
    pending: PendingUpdate,
    callback: Option<String>,
}

impl LongPoll {
    /// Block until a publish resolves this request or `timeout` passes.
    /// On timeout the request is handed back, still parked.
    pub fn wait(self, ctx: &WebContext, timeout: Duration) -> Result<Response, LongPoll> {
        match self.pending.wait_timeout(timeout) {
            Some(records) => Ok(Response::Json(format_updates(
                ctx.clock.now(),
                &records,
                self.callback.as_deref(),
            ))),
            None => Err(self),
        }
    }

    pub fn watermark(&self) -> f64 {
        self.pending.watermark()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

type ClickLimiter = burster::TokenBucket<fn() -> Duration>;

/// Everything handlers may touch.  Shared by reference across threads.
pub struct WebContext {
    stream: UpdateStream,
    commands: CommandQueue,
    clock: Arc<dyn Clock + Send + Sync>,
    click_limiter: Mutex<CriticalSectionRawMutex, RefCell<ClickLimiter>>,
    log_file: PathBuf,
    uptime_file: PathBuf,
}

impl WebContext {
    pub fn new(
        stream: UpdateStream,
        commands: CommandQueue,
        clock: Arc<dyn Clock + Send + Sync>,
        site: &SiteConfig,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stream,
            commands,
            clock,
            click_limiter: Mutex::new(RefCell::new(burster::TokenBucket::new_with_time_provider(
                site.clicks_per_sec,
                site.click_burst,
                platform_now as fn() -> Duration,
            ))),
            log_file: log_file.into(),
            uptime_file: PathBuf::from(DEFAULT_UPTIME_FILE),
        }
    }

    /// Read uptime from another file (tests, non-Linux hosts).
    pub fn with_uptime_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.uptime_file = path.into();
        self
    }

    fn try_click(&self) -> bool {
        self.click_limiter
            .lock(|bucket| bucket.borrow_mut().try_consume(1).is_ok())
    }

    fn submit(&self, cmd: AppCommand) -> Option<Response> {
        match self.commands.submit(cmd) {
            Ok(()) => None,
            Err(cmd) => {
                warn!("command queue full, rejecting {cmd:?}");
                Some(Response::ServiceUnavailable)
            }
        }
    }
}

fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub type Handler = fn(&WebContext, &Request) -> Response;

pub const ROUTES: &[(&str, Handler)] = &[
    ("upd", handle_updates),
    ("cfg", handle_config),
    ("clk", handle_click),
    ("closeall", handle_close_all),
    ("mot", handle_motion),
    ("upt", handle_uptime),
    ("log", handle_log),
];

pub struct Router {
    routes: &'static [(&'static str, Handler)],
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: ROUTES }
    }

    pub fn handle(&self, ctx: &WebContext, req: &Request) -> Response {
        match self.routes.iter().find(|(path, _)| *path == req.path) {
            Some((_, handler)) => handler(ctx, req),
            None => Response::NotFound,
        }
    }

    pub fn handle_target(&self, ctx: &WebContext, target: &str) -> Response {
        self.handle(ctx, &Request::parse(target))
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct UpdateBody<'a> {
    timestamp: i64,
    update: &'a [UpdateRecord],
}

/// `{"timestamp": <int>, "update": [...]}`, optionally wrapped as `cb(...)`.
pub fn format_updates(now: f64, records: &[UpdateRecord], callback: Option<&str>) -> String {
    let body = serde_json::to_string(&UpdateBody {
        timestamp: now as i64,
        update: records,
    })
    .unwrap_or_else(|_| "{}".to_string());
    match callback {
        Some(cb) => format!("{cb}({body})"),
        None => body,
    }
}

/// JSONP callbacks are restricted to identifier characters.
pub fn is_valid_callback(cb: &str) -> bool {
    !cb.is_empty()
        && cb.len() <= 64
        && cb
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}

/// Malformed or missing watermarks read as 0.
pub fn parse_watermark(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn handle_updates(ctx: &WebContext, req: &Request) -> Response {
    let callback = match req.param("callback") {
        Some(cb) if is_valid_callback(cb) => Some(cb.to_string()),
        Some(_) => return Response::BadRequest("invalid callback"),
        None => None,
    };
    let watermark = parse_watermark(req.param("lastupdate"));
    let now = ctx.clock.now();

    match ctx.stream.subscribe(watermark, now) {
        Subscription::Ready(records) => {
            Response::Json(format_updates(now, &records, callback.as_deref()))
        }
        Subscription::Parked(pending) => Response::Pending(LongPoll { pending, callback }),
    }
}

fn handle_config(ctx: &WebContext, _req: &Request) -> Response {
    let snapshot = ctx.stream.latest();
    let rows: Vec<(&str, &str, DoorState, f64)> = snapshot
        .doors
        .iter()
        .map(|d| (d.id.as_str(), d.name.as_str(), d.state, d.time_in_state))
        .collect();
    Response::Json(serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string()))
}

fn handle_click(ctx: &WebContext, req: &Request) -> Response {
    let Some(id) = req.param("id") else {
        return Response::BadRequest("missing id");
    };
    let snapshot = ctx.stream.latest();
    let Some(door) = snapshot.doors.iter().find(|d| d.id == id) else {
        return Response::NotFound;
    };
    if door.state.is_transitional() {
        return Response::Conflict(format!("{} is {}", door.name, door.state));
    }
    if !ctx.try_click() {
        warn!("click on {id} rate limited");
        return Response::TooManyRequests;
    }
    info!("click on {}", door.name);
    ctx.submit(AppCommand::Click(door.id.clone()))
        .unwrap_or_else(|| Response::Text(String::new()))
}

fn handle_close_all(ctx: &WebContext, _req: &Request) -> Response {
    let snapshot = ctx.stream.latest();
    match close_all_summary(&snapshot.doors) {
        None => Response::Text("All doors are closed.".to_string()),
        Some(summary) => ctx
            .submit(AppCommand::CloseAll)
            .unwrap_or(Response::Text(summary)),
    }
}

fn handle_motion(ctx: &WebContext, _req: &Request) -> Response {
    ctx.submit(AppCommand::Motion)
        .unwrap_or_else(|| Response::Text(String::new()))
}

fn handle_uptime(ctx: &WebContext, _req: &Request) -> Response {
    let text = match read_uptime(&ctx.uptime_file) {
        Some(secs) => format_span(secs),
        None => format!("Cannot open uptime file: {}", ctx.uptime_file.display()),
    };
    let json = serde_json::to_string(&format!("Uptime: {text}"))
        .unwrap_or_else(|_| "\"\"".to_string());
    Response::Json(json)
}

fn read_uptime(path: &Path) -> Option<f64> {
    let contents = std::fs::read_to_string(path).ok()?;
    contents.split_whitespace().next()?.parse().ok()
}

fn handle_log(ctx: &WebContext, _req: &Request) -> Response {
    let body = match std::fs::read_to_string(&ctx.log_file) {
        Ok(contents) => escape_html(&tail_newest_first(&contents, LOG_TAIL_LINES)),
        Err(e) => escape_html(&format!(
            "Cannot open log file {}: {e}",
            ctx.log_file.display()
        )),
    };
    Response::Html(format!("<html><body><pre>{body}</pre></body></html>"))
}

/// Last `n` lines, most recent first.
pub fn tail_newest_first(contents: &str, n: usize) -> String {
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(n);
    let mut out = String::new();
    for line in lines[start..].iter().rev() {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
