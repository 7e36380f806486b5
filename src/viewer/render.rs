use crate::models::{new_listing_window, Listing};
use crate::notify::format_price;
use crate::viewer::map::{to_geojson, MapMarker};
use chrono::{DateTime, Utc};

fn price_label(listing: &Listing) -> String {
    listing
        .price
        .map(|p| format!("{} €", format_price(p)))
        .unwrap_or_else(|| "Prix N/A".to_string())
}

fn details_label(listing: &Listing) -> String {
    let bedrooms = listing
        .bedrooms
        .map(|b| format!("{b} ch."))
        .unwrap_or_else(|| "? ch.".to_string());
    let surface = listing
        .surface
        .map(|s| format!("{} m²", s.round() as i64))
        .unwrap_or_else(|| "? m²".to_string());
    format!("{bedrooms} | {surface}")
}

fn seen_label(listing: &Listing) -> String {
    listing
        .first_seen
        .map(|t| t.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "date inconnue".to_string())
}

/// One listing as terminal text
pub fn render_card(listing: &Listing, now: DateTime<Utc>) -> String {
    let badge = if listing.is_recent(now, new_listing_window()) {
        "🆕 "
    } else {
        ""
    };
    let title: &str = if listing.title.is_empty() {
        "Sans titre"
    } else {
        &listing.title
    };

    let mut card = format!("{badge}{title} ({})\n", price_label(listing));
    card.push_str(&format!("   {} | {}\n", listing.commune, details_label(listing)));
    if !listing.address.is_empty() {
        card.push_str(&format!("   {}\n", listing.address));
    }
    card.push_str(&format!("   {} · vu le {}\n", listing.source, seen_label(listing)));
    card.push_str(&format!("   {}\n", listing.source_url));
    card
}

pub fn render_summary(shown: usize, total: usize, last_updated: Option<DateTime<Utc>>) -> String {
    let updated = last_updated
        .map(|t| t.format("%d/%m/%Y %H:%M UTC").to_string())
        .unwrap_or_else(|| "jamais".to_string());
    format!("{shown} annonce(s) sur {total} · mis à jour {updated}")
}

/// Static page with one card per listing and a Leaflet map of the markers.
pub fn render_html(
    listings: &[&Listing],
    markers: &[MapMarker],
    total: usize,
    now: DateTime<Utc>,
    last_updated: Option<DateTime<Utc>>,
) -> String {
    let mut cards = String::new();

    if listings.is_empty() {
        cards.push_str(r#"<p class="empty">Aucune annonce ne correspond aux filtres.</p>"#);
    }

    for listing in listings {
        let badge = if listing.is_recent(now, new_listing_window()) {
            r#"<span class="badge">Nouveau</span>"#
        } else {
            ""
        };
        let image = listing
            .images
            .first()
            .map(|src| format!(r#"<img src="{}" alt="" loading="lazy">"#, html_escape(src)))
            .unwrap_or_default();

        cards.push_str(&format!(
            r#"<article class="card">
    {image}
    <div class="body">
        <h2>{badge}<a href="{url}" target="_blank" rel="noopener">{title}</a></h2>
        <p class="price">{price}</p>
        <p>{commune} · {details}</p>
        <p class="address">{address}</p>
        <p class="meta">{source} · vu le {seen}</p>
    </div>
</article>
"#,
            url = html_escape(&listing.source_url),
            title = html_escape(&listing.title),
            price = html_escape(&price_label(listing)),
            commune = html_escape(&listing.commune),
            details = html_escape(&details_label(listing)),
            address = html_escape(&listing.address),
            source = html_escape(&listing.source),
            seen = seen_label(listing),
        ));
    }

    // `</` inside the inline script would close it early
    let geojson = to_geojson(markers).to_string().replace("</", "<\\/");

    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Dreamhouse · Bruxelles</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<style>
body {{ font-family: system-ui, sans-serif; margin: 0; background: #f5f5f5; color: #222; }}
header {{ padding: 16px 24px; background: #1b4d3e; color: #fff; }}
#map {{ height: 360px; }}
main {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); gap: 16px; padding: 24px; }}
.card {{ background: #fff; border-radius: 8px; overflow: hidden; box-shadow: 0 1px 3px rgba(0,0,0,.15); }}
.card img {{ width: 100%; height: 180px; object-fit: cover; }}
.card .body {{ padding: 12px 16px; }}
.card h2 {{ font-size: 16px; margin: 0 0 8px; }}
.price {{ font-weight: 700; color: #1b4d3e; }}
.meta, .address {{ font-size: 12px; color: #666; }}
.badge {{ background: #e65100; color: #fff; border-radius: 4px; padding: 2px 6px; font-size: 11px; margin-right: 6px; }}
.empty {{ color: #888; text-align: center; padding: 40px; }}
</style>
</head>
<body>
<header>
    <h1>Dreamhouse</h1>
    <p>{summary}</p>
</header>
<div id="map"></div>
<main>
{cards}</main>
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script>
const map = L.map('map').setView([50.8275, 4.3454], 13);
L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
    attribution: '&copy; OpenStreetMap contributors',
    maxZoom: 18,
}}).addTo(map);
L.geoJSON({geojson}, {{
    onEachFeature: (f, layer) => {{
        const a = document.createElement('a');
        a.href = f.properties.source_url;
        a.target = '_blank';
        a.textContent = f.properties.title || 'Annonce';
        layer.bindPopup(a);
    }},
}}).addTo(map);
</script>
</body>
</html>
"#,
        summary = html_escape(&render_summary(listings.len(), total, last_updated)),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
