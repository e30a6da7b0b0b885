use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dates::CalendarDate;
use crate::error::{AgendaError, AgendaResult, ValidationError};
use crate::grid::{self, MonthGrid};
use crate::html::{self, PageView};
use crate::session::Session;
use crate::store::EventStore;
use crate::types::{DateKey, EventFields, Snapshot};
use crate::upcoming::{self, UpcomingEntry, DEFAULT_LIMIT};

const EDIT_TARGET_GONE: &str = "Could not find that event to edit.";

/// Application state shared across requests.
///
/// Store and session sit behind one lock, so each request's
/// load → mutate → save cycle and the following render never interleave.
pub struct AppState {
    pub(crate) inner: Mutex<AppInner>,
}

pub(crate) struct AppInner {
    pub(crate) store: EventStore,
    pub(crate) session: Session,
    /// Shown once on the next page render
    pub(crate) notice: Option<String>,
}

impl AppState {
    pub fn new(store: EventStore) -> Self {
        Self {
            inner: Mutex::new(AppInner {
                store,
                session: Session::new(CalendarDate::today()),
                notice: None,
            }),
        }
    }
}

impl AppInner {
    /// Commit a transition result: adopt the new session, or keep a
    /// recovered one and queue the error as a notice.
    fn apply(&mut self, result: AgendaResult<Session>) {
        match result {
            Ok(session) => {
                self.session = session;
                self.notice = None;
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, e: AgendaError) {
        match &e {
            AgendaError::Validation(_) => info!(error = %e, "Rejected input"),
            AgendaError::NotFound { .. } => warn!(error = %e, "Event no longer exists"),
            _ => error!(error = %e, "Operation failed"),
        }
        self.session = self.session.recover(&e);
        self.notice = Some(match e {
            AgendaError::NotFound { .. } => "Could not find that event.".to_string(),
            other => other.to_string(),
        });
    }
}

/// Start the web server
pub async fn serve(port: u16, config: &Config) -> anyhow::Result<()> {
    let store = config.open_store()?;
    let state = Arc::new(AppState::new(store));

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!(%addr, backend = ?config.backend, dir = %config.data_dir.display(), "Server running");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/select", post(select_handler))
        .route("/nav", post(nav_handler))
        .route("/nav/today", post(today_handler))
        .route("/nav/goto", post(goto_handler))
        .route("/events", post(add_handler))
        .route("/events/edit", post(edit_handler))
        .route("/events/save", post(save_handler))
        .route("/events/cancel", post(cancel_handler))
        .route("/events/toggle", post(toggle_handler))
        .route("/events/delete", post(delete_handler))
        .route("/api/events", get(events_handler))
        .route("/api/month/{year}/{month}", get(month_handler))
        .route("/api/upcoming", get(upcoming_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct DateForm {
    date: String,
}

#[derive(Debug, Deserialize)]
struct NavForm {
    delta: i32,
}

#[derive(Debug, Deserialize)]
struct GotoForm {
    year: i32,
    month: u32,
}

/// Identifies one stored event
#[derive(Debug, Deserialize)]
struct EventRef {
    date: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct UpcomingQuery {
    limit: Option<usize>,
}

fn back_to_page() -> Redirect {
    Redirect::to("/")
}

/// Serve the main HTML page
async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let mut inner = state.inner.lock().await;
    let notice = inner.notice.take();
    let snapshot = inner.store.load();
    let view = PageView {
        session: &inner.session,
        snapshot: &snapshot,
        today: CalendarDate::today(),
        now: upcoming::local_now(),
        notice: notice.as_deref(),
    };
    Html(html::render_page(&view).into_string())
}

async fn select_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<DateForm>,
) -> Redirect {
    let mut inner = state.inner.lock().await;
    let result = DateKey::parse(&form.date)
        .map(|key| inner.session.select_date(key.date()))
        .map_err(AgendaError::from);
    inner.apply(result);
    back_to_page()
}

async fn nav_handler(State(state): State<Arc<AppState>>, Form(form): Form<NavForm>) -> Redirect {
    let mut inner = state.inner.lock().await;
    let next = inner.session.change_month(form.delta);
    inner.apply(Ok(next));
    back_to_page()
}

async fn today_handler(State(state): State<Arc<AppState>>) -> Redirect {
    let mut inner = state.inner.lock().await;
    let next = inner.session.jump_to_today(CalendarDate::today());
    inner.apply(Ok(next));
    back_to_page()
}

async fn goto_handler(State(state): State<Arc<AppState>>, Form(form): Form<GotoForm>) -> Redirect {
    let mut inner = state.inner.lock().await;
    let result = if form.month < 12 {
        Ok(inner.session.go_to_month(form.year, form.month))
    } else {
        Err(ValidationError::InvalidMonth(form.month).into())
    };
    inner.apply(result);
    back_to_page()
}

async fn add_handler(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<EventFields>,
) -> Redirect {
    let mut guard = state.inner.lock().await;
    let inner = &mut *guard;
    match inner.session.commit_add(&mut inner.store, &fields) {
        Ok(next) => inner.apply(Ok(next)),
        Err(e) => {
            let keep_typed = e.is_validation();
            inner.fail(e);
            if keep_typed && inner.session.is_add_mode() {
                inner.session = inner.session.with_form(fields);
            }
        }
    }
    back_to_page()
}

async fn edit_handler(State(state): State<Arc<AppState>>, Form(form): Form<EventRef>) -> Redirect {
    let mut inner = state.inner.lock().await;
    let result = match DateKey::parse(&form.date) {
        Ok(key) => {
            let snapshot = inner.store.load();
            Ok(inner.session.start_edit(&snapshot, &key, &form.id))
        }
        Err(e) => Err(e.into()),
    };
    inner.apply(result);
    back_to_page()
}

async fn save_handler(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<EventFields>,
) -> Redirect {
    let mut guard = state.inner.lock().await;
    let inner = &mut *guard;
    match inner.session.commit_edit(&mut inner.store, &fields) {
        Ok(next) => inner.apply(Ok(next)),
        Err(e) => {
            let keep_typed = e.is_validation();
            let vanished = e.is_not_found();
            inner.fail(e);
            if vanished {
                inner.notice = Some(EDIT_TARGET_GONE.to_string());
            }
            if keep_typed && inner.session.is_edit_mode() {
                inner.session = inner.session.with_form(fields);
            }
        }
    }
    back_to_page()
}

async fn cancel_handler(State(state): State<Arc<AppState>>) -> Redirect {
    let mut inner = state.inner.lock().await;
    let next = inner.session.cancel_edit();
    inner.apply(Ok(next));
    back_to_page()
}

async fn toggle_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EventRef>,
) -> Redirect {
    let mut inner = state.inner.lock().await;
    let result = DateKey::parse(&form.date)
        .map_err(AgendaError::from)
        .and_then(|key| inner.store.toggle_completed(&key, &form.id));
    match result {
        Ok(_) => inner.notice = None,
        Err(e) => inner.fail(e),
    }
    back_to_page()
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EventRef>,
) -> Redirect {
    let mut guard = state.inner.lock().await;
    let inner = &mut *guard;
    let result = DateKey::parse(&form.date)
        .map_err(AgendaError::from)
        .and_then(|key| inner.session.delete_event(&mut inner.store, &key, &form.id));
    inner.apply(result);
    back_to_page()
}

/// Return the stored snapshot as JSON
async fn events_handler(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    let inner = state.inner.lock().await;
    Json(inner.store.load())
}

/// Return the grid for a month; `month` is 1-12
async fn month_handler(
    State(state): State<Arc<AppState>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Response {
    if !(1..=12).contains(&month) {
        return (StatusCode::BAD_REQUEST, "month must be 1-12").into_response();
    }
    let inner = state.inner.lock().await;
    let snapshot = inner.store.load();
    let grid: MonthGrid = grid::project_month(
        year,
        month - 1,
        &snapshot,
        inner.session.selected(),
        CalendarDate::today(),
    );
    Json(grid).into_response()
}

/// Return the upcoming projection as JSON
async fn upcoming_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UpcomingQuery>,
) -> Json<Vec<UpcomingEntry>> {
    let inner = state.inner.lock().await;
    let snapshot = inner.store.load();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Json(upcoming::project_upcoming(&snapshot, upcoming::local_now(), limit))
}
