// Canvas drawing sessions with undo/redo, keyed by a caller-chosen name.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{json_error, AppState};
use crate::history::{DrawingSession, PixelCanvas, Rgba, MAX_BRUSH};
use crate::metrics;
use crate::store::KvStore;

/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_SIDE: u32 = 2048;

/// Stroke coordinates must lie within this distance of the canvas origin.
pub const MAX_STROKE_COORD: i64 = 4 * MAX_CANVAS_SIDE as i64;

/// Live sessions kept before the least recently used one is dropped.
pub const DEFAULT_MAX_CANVAS_SESSIONS: usize = 8;

struct Slot {
    session: DrawingSession<PixelCanvas>,
    last_used: u64,
}

#[derive(Default)]
struct Sessions {
    slots: HashMap<String, Slot>,
    clock: u64,
}

impl Sessions {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Drop least recently used sessions until at most `limit` remain.
    fn evict_to(&mut self, limit: usize) {
        while self.slots.len() > limit {
            let Some(oldest) = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(name, _)| name.clone())
            else {
                break;
            };
            self.slots.remove(&oldest);
            tracing::info!("Evicted idle canvas session {oldest}");
        }
    }
}

/// Live drawing sessions shared across requests, bounded by `max_sessions`.
#[derive(Clone)]
pub struct CanvasRegistry {
    sessions: Arc<Mutex<Sessions>>,
    history_cap: usize,
    max_sessions: usize,
}

impl CanvasRegistry {
    pub fn new(history_cap: usize, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(Sessions::default())),
            history_cap,
            max_sessions: max_sessions.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the named session, or switch an existing one to a blank canvas.
    ///
    /// Creating a session when the registry is full evicts the least
    /// recently used one.
    pub fn open(&self, name: &str, width: u32, height: u32) -> CanvasView {
        let mut sessions = self.lock();
        let now = sessions.tick();
        let canvas = PixelCanvas::new(width, height);
        let view = if let Some(slot) = sessions.slots.get_mut(name) {
            slot.session.switch_canvas(canvas);
            slot.last_used = now;
            CanvasView::of(name, &slot.session)
        } else {
            sessions.evict_to(self.max_sessions - 1);
            let session = DrawingSession::new(canvas, self.history_cap);
            let view = CanvasView::of(name, &session);
            sessions.slots.insert(
                name.to_string(),
                Slot {
                    session,
                    last_used: now,
                },
            );
            view
        };
        metrics::CANVAS_SESSIONS.set(sessions.slots.len() as i64);
        view
    }

    /// Drop the named session. Returns whether it existed.
    pub fn close(&self, name: &str) -> bool {
        let mut sessions = self.lock();
        let removed = sessions.slots.remove(name).is_some();
        metrics::CANVAS_SESSIONS.set(sessions.slots.len() as i64);
        removed
    }

    /// Run `f` against the named session.
    pub fn with_session<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut DrawingSession<PixelCanvas>) -> R,
    ) -> Option<R> {
        let mut sessions = self.lock();
        let now = sessions.tick();
        let slot = sessions.slots.get_mut(name)?;
        slot.last_used = now;
        Some(f(&mut slot.session))
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().slots.contains_key(name)
    }
}

// ── Request / response types ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct OpenCanvasRequest {
    pub width: u32,
    pub height: u32,
}

fn default_thickness() -> u32 {
    3
}

/// A finished drawing gesture.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrokeRequest {
    Line {
        from: (i64, i64),
        to: (i64, i64),
        #[serde(default = "default_thickness")]
        thickness: u32,
        color: Rgba,
    },
    Rect {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        color: Rgba,
    },
}

impl StrokeRequest {
    /// Reject geometry no canvas could use.
    fn validate(&self) -> Result<(), String> {
        let in_range = |v: i64| (-MAX_STROKE_COORD..=MAX_STROKE_COORD).contains(&v);
        match *self {
            StrokeRequest::Line {
                from,
                to,
                thickness,
                ..
            } => {
                if ![from.0, from.1, to.0, to.1].into_iter().all(in_range) {
                    return Err(format!(
                        "line endpoints must be between -{MAX_STROKE_COORD} and {MAX_STROKE_COORD}"
                    ));
                }
                if thickness > MAX_BRUSH {
                    return Err(format!("thickness must be at most {MAX_BRUSH}"));
                }
            }
            StrokeRequest::Rect {
                x,
                y,
                width,
                height,
                ..
            } => {
                if !in_range(x) || !in_range(y) {
                    return Err(format!(
                        "rect origin must be between -{MAX_STROKE_COORD} and {MAX_STROKE_COORD}"
                    ));
                }
                let max_side = 2 * MAX_STROKE_COORD as u32;
                if width > max_side || height > max_side {
                    return Err(format!("rect sides must be at most {max_side}"));
                }
            }
        }
        Ok(())
    }

    fn draw(&self, canvas: &mut PixelCanvas) {
        match *self {
            StrokeRequest::Line {
                from,
                to,
                thickness,
                color,
            } => canvas.stroke_line(from, to, thickness, color),
            StrokeRequest::Rect {
                x,
                y,
                width,
                height,
                color,
            } => canvas.fill_rect(x, y, width, height, color),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CanvasView {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub cursor: usize,
    pub length: usize,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl CanvasView {
    fn of(name: &str, session: &DrawingSession<PixelCanvas>) -> Self {
        let history = session.history();
        CanvasView {
            name: name.to_string(),
            width: session.surface().width(),
            height: session.surface().height(),
            cursor: history.cursor(),
            length: history.len(),
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
        }
    }
}

fn canvas_not_found() -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "Canvas not found").into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────

pub(super) async fn get_canvas<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state
        .canvases
        .with_session(&name, |s| CanvasView::of(&name, s))
    {
        Some(view) => (StatusCode::OK, Json(json!(view))).into_response(),
        None => canvas_not_found(),
    }
}

pub(super) async fn open_canvas<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
    Json(req): Json<OpenCanvasRequest>,
) -> impl IntoResponse {
    let valid = 1..=MAX_CANVAS_SIDE;
    if !valid.contains(&req.width) || !valid.contains(&req.height) {
        return json_error(
            StatusCode::BAD_REQUEST,
            &format!("width and height must be between 1 and {MAX_CANVAS_SIDE}"),
        )
        .into_response();
    }
    let view = state.canvases.open(&name, req.width, req.height);
    (StatusCode::OK, Json(json!(view))).into_response()
}

pub(super) async fn add_stroke<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
    Json(stroke): Json<StrokeRequest>,
) -> impl IntoResponse {
    if let Err(msg) = stroke.validate() {
        return json_error(StatusCode::BAD_REQUEST, &msg).into_response();
    }
    let result = state.canvases.with_session(&name, |s| {
        s.finish_gesture(|canvas| stroke.draw(canvas));
        CanvasView::of(&name, s)
    });
    match result {
        Some(view) => (StatusCode::OK, Json(json!(view))).into_response(),
        None => canvas_not_found(),
    }
}

pub(super) async fn close_canvas<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    if state.canvases.close(&name) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        canvas_not_found()
    }
}

pub(super) async fn undo<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    step(&state, &name, |s| s.undo())
}

pub(super) async fn redo<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    step(&state, &name, |s| s.redo())
}

fn step<S>(
    state: &AppState<S>,
    name: &str,
    op: impl FnOnce(&mut DrawingSession<PixelCanvas>) -> bool,
) -> axum::response::Response {
    let result = state.canvases.with_session(name, |s| {
        let changed = op(s);
        (changed, CanvasView::of(name, s))
    });
    match result {
        Some((changed, view)) => {
            (StatusCode::OK, Json(json!({ "changed": changed, "canvas": view }))).into_response()
        }
        None => canvas_not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_then_reopen_resets_history() {
        let registry = CanvasRegistry::new(20, 4);
        registry.open("erangel", 8, 8);
        registry.with_session("erangel", |s| {
            s.finish_gesture(|c| c.set_pixel(0, 0, Rgba([1, 2, 3, 255])));
        });
        assert_eq!(
            registry.with_session("erangel", |s| s.history().len()),
            Some(2)
        );

        let view = registry.open("erangel", 16, 4);
        assert_eq!(view.length, 1);
        assert_eq!(view.width, 16);
        assert!(!view.can_undo);
    }

    #[test]
    fn test_unknown_session() {
        let registry = CanvasRegistry::new(20, 4);
        assert!(registry.with_session("miramar", |_| ()).is_none());
    }

    #[test]
    fn test_registry_evicts_least_recently_used() {
        let registry = CanvasRegistry::new(20, 2);
        registry.open("erangel", 4, 4);
        registry.open("miramar", 4, 4);
        // Touch erangel so miramar becomes the oldest.
        registry.with_session("erangel", |_| ());

        registry.open("sanhok", 4, 4);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("erangel"));
        assert!(registry.contains("sanhok"));
        assert!(!registry.contains("miramar"));

        // Reopening an existing name never evicts.
        registry.open("sanhok", 8, 8);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("erangel"));
    }

    #[test]
    fn test_close_removes_session() {
        let registry = CanvasRegistry::new(20, 4);
        registry.open("vikendi", 4, 4);
        assert!(registry.close("vikendi"));
        assert!(!registry.close("vikendi"));
        assert!(registry.is_empty());
    }

    fn line(from: (i64, i64), to: (i64, i64), thickness: u32) -> StrokeRequest {
        StrokeRequest::Line {
            from,
            to,
            thickness,
            color: Rgba([0, 0, 0, 255]),
        }
    }

    #[test]
    fn test_stroke_validation() {
        assert!(line((0, 0), (MAX_STROKE_COORD, -MAX_STROKE_COORD), 3)
            .validate()
            .is_ok());
        assert!(line((0, 0), (MAX_STROKE_COORD + 1, 0), 3).validate().is_err());
        assert!(line((i64::MIN, 0), (i64::MAX, 0), 1).validate().is_err());
        assert!(line((0, 0), (1, 1), MAX_BRUSH + 1).validate().is_err());

        let rect = |x: i64, width: u32| StrokeRequest::Rect {
            x,
            y: 0,
            width,
            height: 4,
            color: Rgba([0, 0, 0, 255]),
        };
        assert!(rect(-10, 20).validate().is_ok());
        assert!(rect(i64::MIN, 20).validate().is_err());
        assert!(rect(0, u32::MAX).validate().is_err());
    }

    #[test]
    fn test_stroke_request_parses() {
        let line: StrokeRequest = serde_json::from_str(
            r#"{"kind":"line","from":[0,0],"to":[3,3],"color":[255,0,0,255]}"#,
        )
        .unwrap();
        assert!(matches!(line, StrokeRequest::Line { thickness: 3, .. }));

        let rect: StrokeRequest = serde_json::from_str(
            r#"{"kind":"rect","x":1,"y":1,"width":2,"height":2,"color":[0,0,0,255]}"#,
        )
        .unwrap();
        let mut canvas = PixelCanvas::new(4, 4);
        rect.draw(&mut canvas);
        assert_eq!(canvas.pixel(2, 2), Some(Rgba([0, 0, 0, 255])));
    }
}
