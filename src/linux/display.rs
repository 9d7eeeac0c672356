//! Monitor enumeration using Xinerama, with a RandR CRTC fallback

use x11rb::protocol::randr::{self, ConnectionExt as RandrExt};
use x11rb::protocol::xinerama::{self, ConnectionExt as XineramaExt};

use crate::error::Result;
use crate::geometry::{OutputInfo, OutputSource, Rect, RegionSource};
use crate::linux::Session;

/// Screens in Xinerama order. This is the order the server reports heads to
/// clients, so monitor numbers match what other X tools show.
pub struct XineramaRegions<'a> {
    session: &'a Session,
}

impl<'a> XineramaRegions<'a> {
    /// `None` when Xinerama is missing or inactive on the display
    pub fn probe(session: &'a Session) -> Result<Option<Self>> {
        if !session.has_extension(xinerama::X11_EXTENSION_NAME)? {
            return Ok(None);
        }
        let active = session.conn().xinerama_is_active()?.reply()?;
        Ok((active.state != 0).then_some(Self { session }))
    }
}

impl RegionSource for XineramaRegions<'_> {
    fn name(&self) -> &'static str {
        "xinerama"
    }

    fn regions(&self) -> Result<Vec<Rect>> {
        let reply = self.session.conn().xinerama_query_screens()?.reply()?;
        Ok(reply
            .screen_info
            .iter()
            .map(|s| Rect::new(s.x_org as i32, s.y_org as i32, s.width as u32, s.height as u32))
            .collect())
    }
}

/// Active CRTCs that drive at least one connected output, in CRTC order
pub struct CrtcRegions<'a> {
    session: &'a Session,
}

impl<'a> CrtcRegions<'a> {
    pub fn probe(session: &'a Session) -> Result<Option<Self>> {
        if !session.has_extension(randr::X11_EXTENSION_NAME)? {
            return Ok(None);
        }
        session.conn().randr_query_version(1, 5)?.reply()?;
        Ok(Some(Self { session }))
    }
}

impl RegionSource for CrtcRegions<'_> {
    fn name(&self) -> &'static str {
        "randr"
    }

    fn regions(&self) -> Result<Vec<Rect>> {
        let conn = self.session.conn();
        let resources = conn
            .randr_get_screen_resources(self.session.root())?
            .reply()?;

        let mut regions = Vec::new();
        for crtc in &resources.crtcs {
            let info = conn
                .randr_get_crtc_info(*crtc, resources.config_timestamp)?
                .reply()?;

            // Disabled CRTCs have no outputs or zero size
            if info.outputs.is_empty() || info.width == 0 || info.height == 0 {
                continue;
            }

            let mut connected = false;
            for output in &info.outputs {
                let output_info = conn
                    .randr_get_output_info(*output, resources.config_timestamp)?
                    .reply()?;
                if output_info.connection == randr::Connection::CONNECTED {
                    connected = true;
                    break;
                }
            }

            if connected {
                regions.push(Rect::new(
                    info.x as i32,
                    info.y as i32,
                    info.width as u32,
                    info.height as u32,
                ));
            }
        }

        Ok(regions)
    }
}

/// The whole root window as a single monitor
pub struct RootRegion<'a> {
    session: &'a Session,
}

impl RegionSource for RootRegion<'_> {
    fn name(&self) -> &'static str {
        "root"
    }

    fn regions(&self) -> Result<Vec<Rect>> {
        Ok(vec![self.session.root_rect()])
    }
}

/// Pick the best region strategy the display supports
pub fn region_source(session: &Session) -> Result<Box<dyn RegionSource + '_>> {
    if let Some(source) = XineramaRegions::probe(session)? {
        return Ok(Box::new(source));
    }
    if let Some(source) = CrtcRegions::probe(session)? {
        return Ok(Box::new(source));
    }
    Ok(Box::new(RootRegion { session }))
}

/// Monitor regions of `session` in server enumeration order. Never empty.
pub fn list_regions(session: &Session) -> Result<Vec<Rect>> {
    let source = region_source(session)?;
    let mut regions = source.regions()?;

    if regions.is_empty() {
        regions.push(session.root_rect());
    }

    log::info!(
        "{}: {} monitor(s) via {}",
        session.name(),
        regions.len(),
        source.name()
    );
    for (index, region) in regions.iter().enumerate() {
        log::debug!("  [{index}] {region}");
    }

    Ok(regions)
}

/// RandR outputs of a display, used to resolve monitors by name
pub struct RandrOutputs<'a> {
    session: &'a Session,
}

impl<'a> RandrOutputs<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }
}

impl OutputSource for RandrOutputs<'_> {
    fn outputs(&self) -> Result<Vec<OutputInfo>> {
        self.session.require_extension(randr::X11_EXTENSION_NAME)?;

        let conn = self.session.conn();
        conn.randr_query_version(1, 5)?.reply()?;
        let resources = conn
            .randr_get_screen_resources(self.session.root())?
            .reply()?;

        let mut outputs = Vec::with_capacity(resources.outputs.len());
        for output in &resources.outputs {
            let info = conn
                .randr_get_output_info(*output, resources.config_timestamp)?
                .reply()?;

            let geometry = if info.crtc == x11rb::NONE {
                None
            } else {
                let crtc = conn
                    .randr_get_crtc_info(info.crtc, resources.config_timestamp)?
                    .reply()?;
                Some(Rect::new(
                    crtc.x as i32,
                    crtc.y as i32,
                    crtc.width as u32,
                    crtc.height as u32,
                ))
            };

            outputs.push(OutputInfo {
                name: String::from_utf8_lossy(&info.name).into_owned(),
                geometry,
            });
        }

        Ok(outputs)
    }
}
