//! Directory listing and profile detail pages

use axum::response::Html;

use super::layout;

const DIRECTORY_BODY: &str = r#"
<form class="filters" id="filters" onsubmit="event.preventDefault(); load(1);">
    <input name="q" placeholder="Search name, company, title, city">
    <select name="graduation_year" id="f-year"><option value="">Any year</option></select>
    <select name="industry" id="f-industry"><option value="">Any industry</option></select>
    <select name="country" id="f-country"><option value="">Any country</option></select>
    <select name="sort">
        <option value="last_name">Last name</option>
        <option value="first_name">First name</option>
        <option value="graduation_year">Graduation year</option>
        <option value="company">Company</option>
        <option value="updated_at">Recently updated</option>
    </select>
    <select name="order"><option value="asc">Asc</option><option value="desc">Desc</option></select>
    <button type="submit">Search</button>
</form>
<p class="error" id="error"></p>
<p class="muted" id="summary"></p>
<table>
    <thead><tr><th>Name</th><th>Class</th><th>Company</th><th>Title</th><th>Location</th></tr></thead>
    <tbody id="rows"></tbody>
</table>
<div class="pager">
    <button class="secondary" id="prev">Previous</button>
    <span id="page-label"></span>
    <button class="secondary" id="next">Next</button>
</div>
"#;

const DIRECTORY_SCRIPT: &str = r#"
let currentPage = 1;
let totalPages = 0;

function fillSelect(id, values) {
    const select = document.getElementById(id);
    for (const v of values) {
        const opt = document.createElement('option');
        opt.value = v;
        opt.textContent = v;
        select.appendChild(opt);
    }
}

async function loadFacets() {
    try {
        const f = await api('/api/facets');
        fillSelect('f-year', f.graduation_years);
        fillSelect('f-industry', f.industries);
        fillSelect('f-country', f.countries);
    } catch (err) {
        showError(document.getElementById('error'), err);
    }
}

async function load(page) {
    const params = new URLSearchParams(new FormData(document.getElementById('filters')));
    params.set('page', page);
    const error = document.getElementById('error');
    error.textContent = '';
    try {
        const data = await api('/api/profiles?' + params.toString());
        currentPage = data.page;
        totalPages = data.total_pages;
        document.getElementById('summary').textContent = data.total_results + ' alumni';
        document.getElementById('page-label').textContent =
            totalPages ? 'Page ' + data.page + ' of ' + totalPages : '';
        document.getElementById('rows').innerHTML = data.profiles.map(p => `
            <tr>
                <td><a href="/profiles/${encodeURIComponent(p.id)}">${esc(p.first_name)} ${esc(p.last_name)}</a></td>
                <td>${esc(p.graduation_year)}</td>
                <td>${esc(p.company)}</td>
                <td>${esc(p.job_title)}</td>
                <td>${esc([p.city, p.state, p.country].filter(Boolean).join(', '))}</td>
            </tr>`).join('');
    } catch (err) {
        showError(error, err);
    }
}

document.getElementById('prev').onclick = () => { if (currentPage > 1) load(currentPage - 1); };
document.getElementById('next').onclick = () => { if (currentPage < totalPages) load(currentPage + 1); };
loadFacets();
load(1);
"#;

/// GET /
pub async fn directory_page() -> Html<String> {
    Html(layout("Alumni Directory", "", DIRECTORY_BODY, DIRECTORY_SCRIPT))
}

const PROFILE_BODY: &str = r#"
<p class="error" id="error"></p>
<div class="card" id="profile"></div>
<div class="card" id="editor" hidden>
    <h2>Edit profile</h2>
    <form id="edit-form" onsubmit="event.preventDefault(); save();">
        <p><input name="first_name" placeholder="First name"> <input name="last_name" placeholder="Last name"></p>
        <p><input name="email" placeholder="Email" size="40"> <input name="graduation_year" placeholder="Class year" size="8"></p>
        <p><input name="degree" placeholder="Degree"> <input name="major" placeholder="Major"></p>
        <p><input name="company" placeholder="Company"> <input name="job_title" placeholder="Job title"> <input name="industry" placeholder="Industry"></p>
        <p><input name="city" placeholder="City"> <input name="state" placeholder="State"> <input name="country" placeholder="Country"></p>
        <p><input name="linkedin_url" placeholder="LinkedIn URL" size="40"> <input name="website_url" placeholder="Website" size="40"></p>
        <p><textarea name="bio" rows="4" cols="80" placeholder="Bio"></textarea></p>
        <p><label><input type="checkbox" name="is_public"> Public</label>
           <label><input type="checkbox" name="email_opt_out"> No bulk email</label></p>
        <button type="submit">Save</button>
        <button type="button" class="secondary" onclick="remove()">Delete</button>
    </form>
</div>
"#;

const PROFILE_SCRIPT: &str = r#"
const profileId = decodeURIComponent(location.pathname.split('/').pop());
const TEXT_FIELDS = ['first_name', 'last_name', 'email', 'degree', 'major', 'company', 'job_title',
    'industry', 'city', 'state', 'country', 'linkedin_url', 'website_url', 'bio'];

function render(p) {
    const location = [p.city, p.state, p.country].filter(Boolean).join(', ');
    const links = [p.linkedin_url, p.website_url].filter(Boolean)
        .map(u => `<a href="${esc(u)}" rel="noopener">${esc(u)}</a>`).join(' · ');
    document.getElementById('profile').innerHTML = `
        <h2>${esc(p.first_name)} ${esc(p.last_name)}</h2>
        <p>${esc(p.job_title)}${p.company ? ' at ' + esc(p.company) : ''}</p>
        <p class="muted">${p.graduation_year ? 'Class of ' + esc(p.graduation_year) : ''}
            ${p.degree ? ' · ' + esc(p.degree) : ''}${p.major ? ', ' + esc(p.major) : ''}</p>
        <p>${esc(location)} <span class="muted">(geocode: ${esc(p.geocode_status)})</span></p>
        <p>${esc(p.bio).replace(/\n/g, '<br>')}</p>
        <p>${links}</p>
        <p><a href="mailto:${esc(p.email)}">${esc(p.email)}</a></p>`;

    const form = document.getElementById('edit-form');
    for (const f of TEXT_FIELDS) form.elements[f].value = p[f] ?? '';
    form.elements['graduation_year'].value = p.graduation_year ?? '';
    form.elements['is_public'].checked = p.is_public;
    form.elements['email_opt_out'].checked = p.email_opt_out;
}

async function load() {
    try {
        render(await api('/api/profiles/' + encodeURIComponent(profileId)));
        document.getElementById('editor').hidden = false;
    } catch (err) {
        showError(document.getElementById('error'), err);
    }
}

async function save() {
    const form = document.getElementById('edit-form');
    const body = {};
    for (const f of TEXT_FIELDS) body[f] = form.elements[f].value || null;
    const year = form.elements['graduation_year'].value.trim();
    body.graduation_year = year ? Number(year) : null;
    body.is_public = form.elements['is_public'].checked;
    body.email_opt_out = form.elements['email_opt_out'].checked;
    try {
        render(await api('/api/profiles/' + encodeURIComponent(profileId),
            { method: 'PUT', body: JSON.stringify(body) }));
        document.getElementById('error').textContent = '';
    } catch (err) {
        showError(document.getElementById('error'), err);
    }
}

async function remove() {
    if (!confirm('Delete this profile?')) return;
    try {
        await api('/api/profiles/' + encodeURIComponent(profileId), { method: 'DELETE' });
        location.href = '/';
    } catch (err) {
        showError(document.getElementById('error'), err);
    }
}

load();
"#;

/// GET /profiles/:id (the id is read client-side from the path)
pub async fn profile_page() -> Html<String> {
    Html(layout("Profile", "", PROFILE_BODY, PROFILE_SCRIPT))
}
