//! Server-rendered HTML pages
//!
//! Pages are static shells; inline scripts call the JSON API with the
//! bearer token kept in `localStorage`. No frameworks, no build step.

mod admin;
mod directory;
mod map;

use axum::{routing::get, Router};

use crate::AppState;

pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(directory::directory_page))
        .route("/profiles/:id", get(directory::profile_page))
        .route("/map", get(map::map_page))
        .route("/admin", get(admin::admin_page))
}

const STYLE: &str = r#"
    body { font-family: system-ui, -apple-system, sans-serif; margin: 0; color: #222; }
    header { background: #1d3557; color: white; padding: 12px 24px; display: flex; gap: 24px; align-items: center; }
    header a { color: white; text-decoration: none; font-weight: 600; }
    header .token { margin-left: auto; display: flex; gap: 6px; }
    main { max-width: 1100px; margin: 24px auto; padding: 0 24px; }
    form.filters { display: flex; flex-wrap: wrap; gap: 8px; margin-bottom: 16px; }
    input, select, textarea, button { font: inherit; padding: 6px 8px; }
    button { background: #1d3557; color: white; border: none; border-radius: 4px; cursor: pointer; }
    button.secondary { background: #888; }
    table { width: 100%; border-collapse: collapse; }
    th, td { text-align: left; padding: 6px 8px; border-bottom: 1px solid #ddd; }
    .muted { color: #777; }
    .error { color: #b00020; white-space: pre-wrap; }
    .card { border: 1px solid #ddd; border-radius: 6px; padding: 16px; margin-bottom: 16px; }
    .pager { display: flex; gap: 8px; align-items: center; margin-top: 12px; }
    pre.log { background: #f4f4f4; padding: 8px; max-height: 240px; overflow: auto; }
"#;

/// Shared client helpers: token storage, authenticated fetch, escaping
const COMMON_SCRIPT: &str = r#"
const TOKEN_KEY = 'alumni_token';
function token() { return localStorage.getItem(TOKEN_KEY) || ''; }
function saveToken() {
    localStorage.setItem(TOKEN_KEY, document.getElementById('token-input').value.trim());
    location.reload();
}
async function api(path, options = {}) {
    const headers = Object.assign({ 'Content-Type': 'application/json' }, options.headers || {});
    if (token()) headers['Authorization'] = 'Bearer ' + token();
    const resp = await fetch(path, Object.assign({}, options, { headers }));
    if (resp.status === 204) return null;
    const type = resp.headers.get('content-type') || '';
    const body = type.includes('application/json') ? await resp.json() : await resp.text();
    if (!resp.ok) {
        const err = new Error((body.error && body.error.message) || resp.statusText);
        err.status = resp.status;
        err.body = body;
        throw err;
    }
    return body;
}
function esc(value) {
    return String(value ?? '').replace(/[&<>"']/g, c => ({
        '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'
    }[c]));
}
function showError(el, err) {
    let text = err.message;
    if (err.body && err.body.error && err.body.error.fields) {
        text += '\n' + err.body.error.fields.map(f => f.field + ': ' + f.message).join('\n');
    }
    el.textContent = text;
}
document.addEventListener('DOMContentLoaded', () => {
    const input = document.getElementById('token-input');
    if (input) input.value = token();
});
"#;

/// Wrap page content in the shared layout
fn layout(title: &str, head_extra: &str, body: &str, script: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Alumni Network</title>
    <style>{style}</style>
    {head_extra}
</head>
<body>
    <header>
        <a href="/">Directory</a>
        <a href="/map">Map</a>
        <a href="/admin">Admin</a>
        <span class="token">
            <input id="token-input" type="password" placeholder="Access token" size="28">
            <button onclick="saveToken()">Sign in</button>
        </span>
    </header>
    <main>
        <h1>{title}</h1>
        {body}
    </main>
    <script>{common}</script>
    <script>{script}</script>
</body>
</html>"#,
        title = title,
        style = STYLE,
        head_extra = head_extra,
        body = body,
        common = COMMON_SCRIPT,
        script = script,
    )
}
