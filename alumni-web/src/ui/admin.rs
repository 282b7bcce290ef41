//! Admin console page
//!
//! Jobs, live events, import/export, bulk email and user roles. Live events
//! are read with a streaming `fetch` because `EventSource` cannot send the
//! bearer token.

use axum::response::Html;

use super::layout;

const ADMIN_BODY: &str = r#"
<p class="error" id="error"></p>

<div class="card">
    <h2>Re-geocoding</h2>
    <select id="geo-scope">
        <option value="missing">Missing coordinates</option>
        <option value="pending">Pending</option>
        <option value="failed">Failed</option>
        <option value="all">All profiles</option>
    </select>
    <input id="geo-limit" placeholder="Limit" size="6">
    <button onclick="startGeocode()">Start</button>
</div>

<div class="card">
    <h2>Jobs</h2>
    <table>
        <thead><tr><th>Kind</th><th>State</th><th>Progress</th><th>Failed</th><th>Started</th><th></th></tr></thead>
        <tbody id="jobs"></tbody>
    </table>
    <h3>Live events</h3>
    <pre class="log" id="events"></pre>
</div>

<div class="card">
    <h2>Import</h2>
    <p><select id="import-format"><option value="csv">CSV</option><option value="json">JSON</option></select>
       <input type="file" id="import-file">
       <label><input type="checkbox" id="import-dry" checked> Dry run</label>
       <button onclick="runImport()">Import</button>
       <button class="secondary" onclick="runExport()">Export CSV</button></p>
    <pre class="log" id="import-report"></pre>
</div>

<div class="card">
    <h2>Bulk email</h2>
    <p class="muted">Variables: {{first_name}} {{last_name}} {{full_name}} {{email}} {{graduation_year}}
       {{company}} {{job_title}} {{city}} {{country}}</p>
    <p><input id="mail-subject" placeholder="Subject" size="60"></p>
    <p><textarea id="mail-body" rows="8" cols="80" placeholder="Body"></textarea></p>
    <p><input id="mail-year" placeholder="Class year" size="8">
       <input id="mail-industry" placeholder="Industry">
       <input id="mail-country" placeholder="Country"></p>
    <p><input id="mail-preview-id" placeholder="Profile id for preview" size="40">
       <button class="secondary" onclick="previewEmail()">Preview</button>
       <button onclick="sendEmail()">Send</button></p>
    <pre class="log" id="mail-preview"></pre>
    <h3>Delivery log</h3>
    <table>
        <thead><tr><th>Recipient</th><th>Status</th><th>Error</th><th>Time</th></tr></thead>
        <tbody id="mail-log"></tbody>
    </table>
</div>

<div class="card">
    <h2>Users</h2>
    <table>
        <thead><tr><th>Name</th><th>Email</th><th>Role</th><th></th></tr></thead>
        <tbody id="users"></tbody>
    </table>
</div>
"#;

const ADMIN_SCRIPT: &str = r#"
const errorEl = document.getElementById('error');
const fail = err => showError(errorEl, err);

async function loadJobs() {
    try {
        const jobs = await api('/api/admin/jobs?limit=20');
        document.getElementById('jobs').innerHTML = jobs.map(j => `
            <tr>
                <td>${esc(j.kind)}</td>
                <td>${esc(j.state)}${j.error ? ' <span class="error">' + esc(j.error) + '</span>' : ''}</td>
                <td>${j.processed} / ${j.total}</td>
                <td>${j.failed}</td>
                <td>${esc(new Date(j.started_at).toLocaleString())}</td>
                <td>${j.state === 'running'
                    ? `<button class="secondary" data-cancel-job="${esc(j.id)}">Cancel</button>` : ''}</td>
            </tr>`).join('');
    } catch (err) { fail(err); }
}

async function cancelJob(id) {
    try { await api('/api/admin/jobs/' + encodeURIComponent(id) + '/cancel', { method: 'POST' }); }
    catch (err) { fail(err); }
    loadJobs();
}

async function startGeocode() {
    const limit = document.getElementById('geo-limit').value.trim();
    const body = { scope: document.getElementById('geo-scope').value };
    if (limit) body.limit = Number(limit);
    try {
        await api('/api/admin/geocode/batch', { method: 'POST', body: JSON.stringify(body) });
        loadJobs();
    } catch (err) { fail(err); }
}

async function watchEvents() {
    const log = document.getElementById('events');
    const headers = token() ? { 'Authorization': 'Bearer ' + token() } : {};
    try {
        const resp = await fetch('/api/admin/events', { headers });
        if (!resp.ok) return;
        const reader = resp.body.getReader();
        const decoder = new TextDecoder();
        let buffer = '';
        for (;;) {
            const { value, done } = await reader.read();
            if (done) break;
            buffer += decoder.decode(value, { stream: true });
            let split;
            while ((split = buffer.indexOf('\n\n')) >= 0) {
                const chunk = buffer.slice(0, split);
                buffer = buffer.slice(split + 2);
                const data = chunk.split('\n').filter(l => l.startsWith('data:')).map(l => l.slice(5)).join('');
                if (!data) continue;
                const event = JSON.parse(data);
                log.textContent = new Date().toLocaleTimeString() + ' ' + event.type + ' '
                    + JSON.stringify(event) + '\n' + log.textContent;
                if (event.type.startsWith('Job')) loadJobs();
            }
        }
    } catch (err) {
        log.textContent = 'Event stream closed: ' + err.message + '\n' + log.textContent;
    }
    setTimeout(watchEvents, 5000);
}

async function runImport() {
    const file = document.getElementById('import-file').files[0];
    const report = document.getElementById('import-report');
    if (!file) { report.textContent = 'Choose a file first'; return; }
    const body = {
        format: document.getElementById('import-format').value,
        content: await file.text(),
        dry_run: document.getElementById('import-dry').checked
    };
    try {
        const result = await api('/api/admin/import', { method: 'POST', body: JSON.stringify(body) });
        report.textContent = JSON.stringify(result, null, 2);
    } catch (err) {
        report.textContent = JSON.stringify(err.body, null, 2) || err.message;
    }
}

async function runExport() {
    try {
        const csv = await api('/api/admin/export.csv');
        const url = URL.createObjectURL(new Blob([csv], { type: 'text/csv' }));
        const a = document.createElement('a');
        a.href = url;
        a.download = 'alumni.csv';
        a.click();
        URL.revokeObjectURL(url);
    } catch (err) { fail(err); }
}

function mailFilters() {
    const filters = {};
    const year = document.getElementById('mail-year').value.trim();
    const industry = document.getElementById('mail-industry').value.trim();
    const country = document.getElementById('mail-country').value.trim();
    if (year) filters.graduation_year = Number(year);
    if (industry) filters.industry = industry;
    if (country) filters.country = country;
    return filters;
}

async function previewEmail() {
    const out = document.getElementById('mail-preview');
    const body = {
        subject: document.getElementById('mail-subject').value,
        body: document.getElementById('mail-body').value,
        profile_id: document.getElementById('mail-preview-id').value.trim()
    };
    try {
        const p = await api('/api/admin/email/preview', { method: 'POST', body: JSON.stringify(body) });
        out.textContent = 'To: ' + p.recipient + '\nSubject: ' + p.subject + '\n\n' + p.text;
    } catch (err) { showError(out, err); }
}

async function sendEmail() {
    if (!confirm('Send this email to every matching alumnus?')) return;
    const out = document.getElementById('mail-preview');
    const body = {
        subject: document.getElementById('mail-subject').value,
        body: document.getElementById('mail-body').value,
        filters: mailFilters()
    };
    try {
        const r = await api('/api/admin/email/send', { method: 'POST', body: JSON.stringify(body) });
        out.textContent = 'Queued for ' + r.recipients + ' recipients (job ' + r.job_id + ')';
        loadJobs();
    } catch (err) { showError(out, err); }
}

async function loadMailLog() {
    try {
        const entries = await api('/api/admin/email/log?limit=50');
        document.getElementById('mail-log').innerHTML = entries.map(e => `
            <tr>
                <td>${esc(e.recipient)}</td>
                <td>${esc(e.status)}</td>
                <td>${esc(e.error)}</td>
                <td>${esc(new Date(e.created_at).toLocaleString())}</td>
            </tr>`).join('');
    } catch (err) { fail(err); }
}

async function loadUsers() {
    try {
        const users = await api('/api/admin/users');
        document.getElementById('users').innerHTML = users.map(u => {
            const next = u.role === 'admin' ? 'member' : 'admin';
            return `
            <tr>
                <td>${esc(u.name)}</td>
                <td>${esc(u.email)}</td>
                <td>${esc(u.role)}</td>
                <td><button class="secondary" data-user-id="${esc(u.id)}" data-role="${next}">Make ${next}</button></td>
            </tr>`;
        }).join('');
    } catch (err) { fail(err); }
}

async function setRole(id, role) {
    try {
        await api('/api/admin/users/' + encodeURIComponent(id) + '/role',
            { method: 'PUT', body: JSON.stringify({ role }) });
        loadUsers();
    } catch (err) { fail(err); }
}

// Row buttons carry ids in data attributes; ids never reach script source
document.getElementById('jobs').addEventListener('click', event => {
    const button = event.target.closest('button[data-cancel-job]');
    if (button) cancelJob(button.dataset.cancelJob);
});
document.getElementById('users').addEventListener('click', event => {
    const button = event.target.closest('button[data-user-id]');
    if (button) setRole(button.dataset.userId, button.dataset.role);
});

loadJobs();
loadMailLog();
loadUsers();
watchEvents();
"#;

/// GET /admin
pub async fn admin_page() -> Html<String> {
    Html(layout("Admin Console", "", ADMIN_BODY, ADMIN_SCRIPT))
}
