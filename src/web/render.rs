//! HTML rendering of spots for the snapshot page and the live stream.

use askama::Template;
use std::sync::Arc;
use tracing::error;

use crate::errors::WebResult;
use crate::models::Spot;
use crate::services::SpotFilter;

/// One `<tr>` of the spot table
#[derive(Template)]
#[template(path = "spot_row.html")]
pub struct SpotRowTemplate<'a> {
    pub utc: String,
    pub mhz: String,
    pub band: &'a str,
    pub mode: &'a str,
    pub report: i32,
    pub sender_callsign: &'a str,
    pub sender_locator: &'a str,
    pub sender_country: i32,
    pub receiver_callsign: &'a str,
    pub receiver_locator: &'a str,
    pub receiver_country: i32,
}

impl<'a> SpotRowTemplate<'a> {
    pub fn from_spot(spot: &'a Spot) -> Self {
        Self {
            utc: spot.utc(),
            mhz: format!("{:.6}", spot.mhz()),
            band: &spot.band,
            mode: &spot.mode,
            report: spot.report,
            sender_callsign: &spot.sender_callsign,
            sender_locator: &spot.sender_locator,
            sender_country: spot.sender_country,
            receiver_callsign: &spot.receiver_callsign,
            receiver_locator: &spot.receiver_locator,
            receiver_country: spot.receiver_country,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub country: i32,
    pub bands: String,
    pub retained: usize,
    pub shown: usize,
    pub filter_bands: String,
    pub filter_modes: String,
    pub filter_locator: &'a str,
    pub filter_callsign: &'a str,
    pub rows: &'a [String],
}

pub fn render_row(spot: &Spot) -> WebResult<String> {
    let row = SpotRowTemplate::from_spot(spot).render()?;
    Ok(row.trim().to_string())
}

/// Render the spots matching `filter`, in the given order.
///
/// A spot that fails to render is logged and skipped.
pub fn render_rows<'a, I>(spots: I, filter: &SpotFilter) -> Vec<String>
where
    I: IntoIterator<Item = &'a Arc<Spot>>,
{
    spots
        .into_iter()
        .filter(|spot| filter.matches(spot))
        .filter_map(|spot| match render_row(spot) {
            Ok(row) => Some(row),
            Err(e) => {
                error!(sequence = spot.sequence, error = %e, "Failed to render spot row");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::spot::fixtures;

    #[test]
    fn test_row_contains_derived_views() {
        let row = render_row(&fixtures::spot()).unwrap();
        assert!(row.starts_with("<tr>") && row.ends_with("</tr>"));
        assert!(!row.contains('\n'));
        assert!(row.contains("<td>2023-11-14T22:13:20Z</td>"));
        assert!(row.contains("<td>144.174000</td>"));
        assert!(row.contains("<td>OH2ABC</td>"));
    }

    #[test]
    fn test_row_escapes_markup() {
        let spot = Spot {
            sender_callsign: "<script>".to_string(),
            ..fixtures::spot()
        };
        let row = render_row(&spot).unwrap();
        assert!(!row.contains("<script>"));
        assert!(row.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_render_rows_applies_filter() {
        let spots = vec![
            Arc::new(fixtures::spot()),
            Arc::new(Spot {
                band: "70cm".to_string(),
                ..fixtures::spot()
            }),
        ];
        let filter = SpotFilter {
            bands: vec!["70cm".to_string()],
            ..SpotFilter::default()
        };
        let rows = render_rows(&spots, &filter);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].contains("<td>70cm</td>"));
    }
}
