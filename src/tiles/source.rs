use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::core::{
    config::ServiceDescriptor,
    constants::{EPSG_4326, MAX_METADATA_ZOOM, RETINA_SUFFIX, TILE_SIZE},
    geo::GeoPoint,
    projection::tile_to_wms_coords,
};
use crate::tiles::address::{encode_quadkey, TileAddress};
use crate::{Result, TileError};

/// Characters left untouched when escaping a built URL.
///
/// The usual query-safe punctuation stays literal, and so does `%` so that
/// templates which are already escaped are not escaped twice.
const URL_ALLOWED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b'-')
    .remove(b'.')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'?')
    .remove(b'@')
    .remove(b'_')
    .remove(b'~')
    .remove(b'%');

/// Trait representing anything that can produce tile URLs for a given address.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `address`. `x` is normalized first.
    fn url(&self, address: TileAddress) -> Result<String>;
}

/// URL builder driven by a [`ServiceDescriptor`] template.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    service: ServiceDescriptor,
    display_scale: f64,
}

impl TemplateSource {
    pub fn new(service: ServiceDescriptor, display_scale: f64) -> Self {
        Self {
            service,
            display_scale,
        }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    /// Metadata URL for the area around `center`, if the service has one.
    pub fn metadata_url(&self, center: GeoPoint, zoom: u8) -> Option<String> {
        let template = self.service.metadata_url_template.as_deref()?;
        let url = template
            .replace("{lat}", &center.latitude.to_string())
            .replace("{lon}", &center.longitude.to_string())
            .replace("{zoom}", &zoom.min(MAX_METADATA_ZOOM).to_string());
        Some(escape(&url))
    }

    fn expand_wms(&self, mut url: String, address: TileAddress, projection: &str) -> Result<String> {
        let nw = tile_to_wms_coords(address.x, address.y, address.zoom, projection).ensure_finite()?;
        let se = tile_to_wms_coords(address.x + 1, address.y + 1, address.zoom, projection)
            .ensure_finite()?;
        let (west, north) = (nw.x, nw.y);
        let (east, south) = (se.x, se.y);

        // WMS 1.3 lists EPSG:4326 boxes latitude first; 1.1 (srs=) does not
        let bbox = if projection == EPSG_4326 && url.to_lowercase().contains("crs={proj}") {
            format!("{south},{west},{north},{east}")
        } else {
            format!("{west},{south},{east},{north}")
        };

        let size = TILE_SIZE.to_string();
        url = url
            .replace("{width}", &size)
            .replace("{height}", &size)
            .replace("{proj}", projection)
            .replace("{bbox}", &bbox)
            .replace("{wkid}", &projection.replace("EPSG:", ""))
            .replace("{w}", &west.to_string())
            .replace("{s}", &south.to_string())
            .replace("{n}", &north.to_string())
            .replace("{e}", &east.to_string());
        Ok(url)
    }

    fn expand_tiled(&self, url: String, address: TileAddress) -> String {
        let flipped_y = TileAddress::tiles_per_side(address.zoom) - address.y - 1;
        url.replace("{u}", &encode_quadkey(address.zoom, address.x, address.y))
            .replace("{x}", &address.x.to_string())
            .replace("{y}", &address.y.to_string())
            .replace("{-y}", &flipped_y.to_string())
            .replace("{z}", &address.zoom.to_string())
    }
}

impl TileSource for TemplateSource {
    fn url(&self, address: TileAddress) -> Result<String> {
        if !address.has_valid_row() {
            return Err(TileError::InvalidKey(format!(
                "row {} outside zoom {}",
                address.y, address.zoom
            )));
        }
        let address = address.normalized();
        let url = resolve_switch(&self.service.url_template, address.x + address.y);

        let url = match self.service.wms_projection() {
            Some(projection) => self.expand_wms(url, address, projection)?,
            None => self.expand_tiled(url, address),
        };

        let retina = if self.display_scale > 1.0 { RETINA_SUFFIX } else { "" };
        Ok(escape(&url.replace("{@2x}", retina)))
    }
}

/// Replaces the first `{switch:a,b,c}` token with entry `selector mod N`.
fn resolve_switch(template: &str, selector: i64) -> String {
    const OPEN: &str = "{switch:";
    let Some(begin) = template.find(OPEN) else {
        return template.to_string();
    };
    let body_start = begin + OPEN.len();
    let Some(len) = template[body_start..].find('}') else {
        return template.to_string();
    };
    let choices: Vec<&str> = template[body_start..body_start + len].split(',').collect();
    let choice = choices[selector.rem_euclid(choices.len() as i64) as usize];

    let mut url = String::with_capacity(template.len());
    url.push_str(&template[..begin]);
    url.push_str(choice);
    url.push_str(&template[body_start + len + 1..]);
    url
}

fn escape(url: &str) -> String {
    utf8_percent_encode(url, URL_ALLOWED).to_string()
}
