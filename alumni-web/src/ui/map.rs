//! Alumni map page (Leaflet, OpenStreetMap tiles)

use axum::response::Html;

use super::layout;

const LEAFLET: &str = r#"
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
    <style>#map { height: 600px; border: 1px solid #ddd; border-radius: 6px; }</style>
"#;

const MAP_BODY: &str = r#"
<form class="filters" id="filters" onsubmit="event.preventDefault(); loadMarkers();">
    <input name="q" placeholder="Search">
    <input name="graduation_year" placeholder="Class year" size="8">
    <input name="industry" placeholder="Industry">
    <input name="country" placeholder="Country">
    <button type="submit">Filter</button>
</form>
<p class="error" id="error"></p>
<p class="muted" id="summary"></p>
<div id="map"></div>
"#;

const MAP_SCRIPT: &str = r#"
const map = L.map('map').setView([20, 0], 2);
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
    maxZoom: 18,
    attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
const layer = L.layerGroup().addTo(map);

async function loadMarkers() {
    const params = new URLSearchParams();
    for (const [k, v] of new FormData(document.getElementById('filters'))) {
        if (v.trim()) params.set(k, v.trim());
    }
    const error = document.getElementById('error');
    error.textContent = '';
    layer.clearLayers();
    try {
        const markers = await api('/api/map/markers?' + params.toString());
        const bounds = [];
        let people = 0;
        for (const m of markers) {
            people += m.count;
            const names = m.profiles
                .map(p => `<a href="/profiles/${encodeURIComponent(p.id)}">${esc(p.name)}</a>`)
                .join('<br>');
            L.marker([m.latitude, m.longitude])
                .bindPopup(`<strong>${esc(m.label)}</strong> (${m.count})<br>${names}`)
                .addTo(layer);
            bounds.push([m.latitude, m.longitude]);
        }
        document.getElementById('summary').textContent =
            people + ' alumni at ' + markers.length + ' locations';
        if (bounds.length) map.fitBounds(bounds, { maxZoom: 10, padding: [24, 24] });
    } catch (err) {
        showError(error, err);
    }
}

loadMarkers();
"#;

/// GET /map
pub async fn map_page() -> Html<String> {
    Html(layout("Alumni Map", LEAFLET, MAP_BODY, MAP_SCRIPT))
}
