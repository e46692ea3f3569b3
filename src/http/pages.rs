//! Status pages: the error page and the dashboard.
//!
//! The core hands a [`PageData`] to a [`PagePresenter`]; the presenter owns
//! the markup. [`HtmlPresenter`] is the built-in one.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;

use crate::observability::RequestStats;

/// Title shown on the dashboard.
pub const DASHBOARD_TITLE: &str = "Proxit Reverse Proxy";

/// Message shown when no service matches.
pub const NOT_FOUND_MESSAGE: &str = "Service Not Found";

/// Message shown on 503 pages when backend errors are not exposed.
pub const UNAVAILABLE_MESSAGE: &str = "Service Unavailable";

/// Which page to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Error,
    Dashboard,
}

/// Values a page is rendered from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageData {
    pub title: String,
    pub message: String,
    pub code: u16,
    pub total_requests: u64,
    pub successful: u64,
    pub errored: u64,
}

impl PageData {
    pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_u16(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn dashboard(stats: RequestStats) -> Self {
        Self {
            title: DASHBOARD_TITLE.to_string(),
            code: StatusCode::OK.as_u16(),
            total_requests: stats.total(),
            successful: stats.successful,
            errored: stats.errored,
            ..Default::default()
        }
    }
}

/// Turns page data into an HTML document.
pub trait PagePresenter: Send + Sync {
    fn render(&self, kind: PageKind, data: &PageData) -> String;
}

/// Default presenter with inline markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlPresenter;

impl PagePresenter for HtmlPresenter {
    fn render(&self, kind: PageKind, data: &PageData) -> String {
        match kind {
            PageKind::Error => format!(
                "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{code} | Proxit</title></head>\n\
                 <body>\n<h1>{code}</h1>\n<p>{message}</p>\n<hr>\n<small>Proxit</small>\n</body>\n</html>\n",
                code = data.code,
                message = escape_html(&data.message),
            ),
            PageKind::Dashboard => format!(
                "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
                 <body>\n<h1>{title}</h1>\n<ul>\n<li>Total requests: <span id=\"total\">{total}</span></li>\n\
                 <li>Successful: <span id=\"successful\">{successful}</span></li>\n\
                 <li>Errored: <span id=\"errored\">{errored}</span></li>\n</ul>\n</body>\n</html>\n",
                title = escape_html(&data.title),
                total = data.total_requests,
                successful = data.successful,
                errored = data.errored,
            ),
        }
    }
}

/// Render a page into a response with the page's status code.
pub fn page_response(presenter: &dyn PagePresenter, kind: PageKind, data: &PageData) -> Response {
    let status = StatusCode::from_u16(data.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(presenter.render(kind, data)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
