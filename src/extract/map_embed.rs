use serde_json::Value;

const EMBED_BASE: &str = "https://www.openstreetmap.org/export/embed.html";
const BBOX_PADDING: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Reads `{latitude, longitude}` from structured data. Both must be
    /// numbers or numeric strings.
    pub fn from_json(value: &Value) -> Option<Self> {
        let latitude = coordinate(value.get("latitude")?)?;
        let longitude = coordinate(value.get("longitude")?)?;
        Some(Self {
            latitude,
            longitude,
        })
    }
}

fn coordinate(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Shortest decimal form after dropping float noise from the padding math.
fn format_coordinate(value: f64) -> String {
    let rounded = (value * 1e10).round() / 1e10;
    format!("{rounded}")
}

/// Builds an embeddable map link. Coordinates win over the address; with
/// neither there is no map.
pub fn map_embed_url(address: Option<&str>, geo: Option<GeoPoint>) -> Option<String> {
    if let Some(point) = geo {
        let bbox = [
            point.longitude - BBOX_PADDING,
            point.latitude - BBOX_PADDING,
            point.longitude + BBOX_PADDING,
            point.latitude + BBOX_PADDING,
        ]
        .iter()
        .map(|v| format_coordinate(*v))
        .collect::<Vec<_>>()
        .join(",");
        return Some(format!(
            "{EMBED_BASE}?bbox={bbox}&layer=mapnik&marker={},{}",
            format_coordinate(point.latitude),
            format_coordinate(point.longitude)
        ));
    }

    let address = address.map(str::trim).filter(|a| !a.is_empty())?;
    Some(format!(
        "{EMBED_BASE}?query={}",
        urlencoding::encode(address)
    ))
}
