//! Monitor geometry and selector resolution
//!
//! A display's virtual desktop is split into monitor regions. The regions are
//! listed in the order the server enumerates its heads; a user-supplied
//! [`MonitorSelector`] picks one of them by index or by RandR output name.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{MirrorError, Result};

/// Rectangle in a display's virtual-desktop coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Whether the point lies inside the rectangle (right and bottom edges excluded)
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (x as i64, y as i64);
        x >= self.x as i64 && x < self.right() && y >= self.y as i64 && y < self.bottom()
    }

    /// Half-open intersection test on both axes; rectangles that only share
    /// an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        segments_intersect(self.x as i64, self.right(), other.x as i64, other.right())
            && segments_intersect(self.y as i64, self.bottom(), other.y as i64, other.bottom())
    }

    /// Map a point from this rectangle onto the same offset inside `target`
    pub fn translate_to(&self, target: &Rect, x: i32, y: i32) -> (i32, i32) {
        (x - self.x + target.x, y - self.y + target.y)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// `[a1, a2)` and `[b1, b2)` overlap
fn segments_intersect(a1: i64, a2: i64, b1: i64, b2: i64) -> bool {
    if a1 < b1 {
        a2 > b1
    } else {
        b2 > a1
    }
}

/// How the user picked a monitor on one side of the mirror
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MonitorSelector {
    /// First enumerated monitor
    #[default]
    First,
    Index(usize),
    /// RandR output name, e.g. `HDMI-1`
    Name(String),
}

impl FromStr for MonitorSelector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        if s.is_empty() {
            Ok(Self::First)
        } else if digits.is_empty() {
            Ok(Self::Name(s.to_string()))
        } else {
            // Leading digits win, so "1" and "1st" both select monitor 1
            Ok(digits
                .parse()
                .map(Self::Index)
                .unwrap_or(Self::Index(usize::MAX)))
        }
    }
}

impl fmt::Display for MonitorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "default"),
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// A named output and the rectangle its CRTC currently scans out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputInfo {
    pub name: String,
    /// `None` when the output is not driven by a CRTC
    pub geometry: Option<Rect>,
}

/// Enumerates a display's monitor regions in server order
pub trait RegionSource {
    /// Short name of the strategy, used in log messages
    fn name(&self) -> &'static str;

    fn regions(&self) -> Result<Vec<Rect>>;
}

/// Enumerates a display's named outputs
pub trait OutputSource {
    fn outputs(&self) -> Result<Vec<OutputInfo>>;
}

/// Resolve a selector against the enumerated regions.
///
/// Outputs are only queried for name selectors. When two outputs share the
/// same geometry the first enumerated region with that geometry is returned.
pub fn resolve(
    outputs: &dyn OutputSource,
    regions: &[Rect],
    selector: &MonitorSelector,
) -> Result<Rect> {
    match selector {
        MonitorSelector::First => regions.first().copied().ok_or(MirrorError::OutOfRange {
            index: 0,
            count: 0,
        }),
        MonitorSelector::Index(index) => {
            regions
                .get(*index)
                .copied()
                .ok_or(MirrorError::OutOfRange {
                    index: *index,
                    count: regions.len(),
                })
        }
        MonitorSelector::Name(name) => {
            let outputs = outputs.outputs()?;
            let output = outputs
                .iter()
                .find(|o| &o.name == name)
                .ok_or_else(|| MirrorError::NotFound {
                    name: name.clone(),
                    candidates: outputs.iter().map(|o| o.name.clone()).collect(),
                })?;

            let geometry = output
                .geometry
                .ok_or_else(|| MirrorError::NoCrtc { name: name.clone() })?;

            regions
                .iter()
                .find(|r| **r == geometry)
                .copied()
                .ok_or_else(|| MirrorError::NoMatchingRegion { name: name.clone() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeOutputs {
        outputs: Vec<OutputInfo>,
        queried: Cell<usize>,
    }

    impl FakeOutputs {
        fn new(outputs: Vec<OutputInfo>) -> Self {
            Self {
                outputs,
                queried: Cell::new(0),
            }
        }
    }

    impl OutputSource for FakeOutputs {
        fn outputs(&self) -> Result<Vec<OutputInfo>> {
            self.queried.set(self.queried.get() + 1);
            Ok(self.outputs.clone())
        }
    }

    fn three_heads() -> Vec<Rect> {
        vec![
            Rect::new(0, 0, 1920, 1080),
            Rect::new(1920, 0, 1280, 1024),
            Rect::new(3200, 0, 1920, 1200),
        ]
    }

    fn output(name: &str, geometry: Option<Rect>) -> OutputInfo {
        OutputInfo {
            name: name.to_string(),
            geometry,
        }
    }

    #[test]
    fn test_intersects_overlapping() {
        let r = Rect::new(0, 0, 10, 10);
        assert!(r.intersects(&Rect::new(5, 5, 10, 10)));
        assert!(Rect::new(5, 5, 10, 10).intersects(&r));
    }

    #[test]
    fn test_intersects_touching_edges() {
        let r = Rect::new(0, 0, 10, 10);
        assert!(!r.intersects(&Rect::new(10, 10, 5, 5)));
        assert!(!r.intersects(&Rect::new(10, 0, 5, 5)));
        assert!(!r.intersects(&Rect::new(0, 10, 5, 5)));
        assert!(!Rect::new(10, 10, 5, 5).intersects(&r));
    }

    #[test]
    fn test_intersects_containment() {
        let outer = Rect::new(100, 100, 500, 500);
        assert!(outer.intersects(&Rect::new(200, 200, 1, 1)));
        assert!(Rect::new(200, 200, 1, 1).intersects(&outer));
    }

    #[test]
    fn test_contains_excludes_far_edges() {
        let r = Rect::new(1920, 0, 1280, 1024);
        assert!(r.contains(1920, 0));
        assert!(r.contains(3199, 1023));
        assert!(!r.contains(3200, 500));
        assert!(!r.contains(2000, 1024));
        assert!(!r.contains(1919, 10));
    }

    #[test]
    fn test_translate_to() {
        let src = Rect::new(1920, 0, 1280, 1024);
        let dst = Rect::new(0, 100, 1280, 1024);
        assert_eq!(src.translate_to(&dst, 2000, 50), (80, 150));
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!("".parse::<MonitorSelector>().unwrap(), MonitorSelector::First);
        assert_eq!("2".parse::<MonitorSelector>().unwrap(), MonitorSelector::Index(2));
        assert_eq!("1st".parse::<MonitorSelector>().unwrap(), MonitorSelector::Index(1));
        assert_eq!(
            "DP-2".parse::<MonitorSelector>().unwrap(),
            MonitorSelector::Name("DP-2".to_string())
        );
    }

    #[test]
    fn test_resolve_default_is_first() {
        let outputs = FakeOutputs::new(vec![]);
        let regions = three_heads();
        let r = resolve(&outputs, &regions, &MonitorSelector::First).unwrap();
        assert_eq!(r, regions[0]);
        assert_eq!(outputs.queried.get(), 0);
    }

    #[test]
    fn test_resolve_index() {
        let outputs = FakeOutputs::new(vec![]);
        let regions = three_heads();
        let r = resolve(&outputs, &regions, &"2".parse().unwrap()).unwrap();
        assert_eq!(r, regions[2]);
    }

    #[test]
    fn test_resolve_index_out_of_range() {
        let outputs = FakeOutputs::new(vec![]);
        let err = resolve(&outputs, &three_heads(), &"5".parse().unwrap()).unwrap_err();
        assert!(matches!(err, MirrorError::OutOfRange { index: 5, count: 3 }));
    }

    #[test]
    fn test_resolve_name_matches_crtc_geometry() {
        let outputs = FakeOutputs::new(vec![
            output("eDP-1", Some(Rect::new(0, 0, 1920, 1080))),
            output("HDMI-1", Some(Rect::new(1920, 0, 1280, 1024))),
        ]);
        let regions = three_heads();
        let r = resolve(&outputs, &regions, &"HDMI-1".parse().unwrap()).unwrap();
        assert_eq!(r, regions[1]);
    }

    #[test]
    fn test_resolve_unknown_name_lists_candidates() {
        let outputs = FakeOutputs::new(vec![
            output("eDP-1", Some(Rect::new(0, 0, 1920, 1080))),
            output("HDMI-1", None),
        ]);
        let err = resolve(&outputs, &three_heads(), &"VGA-1".parse().unwrap()).unwrap_err();
        match &err {
            MirrorError::NotFound { name, candidates } => {
                assert_eq!(name, "VGA-1");
                assert_eq!(candidates, &["eDP-1".to_string(), "HDMI-1".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("eDP-1, HDMI-1"));
    }

    #[test]
    fn test_resolve_name_without_crtc() {
        let outputs = FakeOutputs::new(vec![output("HDMI-1", None)]);
        let err = resolve(&outputs, &three_heads(), &"HDMI-1".parse().unwrap()).unwrap_err();
        assert!(matches!(err, MirrorError::NoCrtc { .. }));
    }

    #[test]
    fn test_resolve_name_without_matching_region() {
        let outputs = FakeOutputs::new(vec![output("DP-1", Some(Rect::new(0, 0, 800, 600)))]);
        let err = resolve(&outputs, &three_heads(), &"DP-1".parse().unwrap()).unwrap_err();
        assert!(matches!(err, MirrorError::NoMatchingRegion { .. }));
    }

    #[test]
    fn test_resolve_shared_geometry_takes_first_region() {
        let clone = Rect::new(0, 0, 1920, 1080);
        let outputs = FakeOutputs::new(vec![output("DP-1", Some(clone)), output("DP-2", Some(clone))]);
        let regions = vec![clone, clone];
        let r = resolve(&outputs, &regions, &"DP-2".parse().unwrap()).unwrap();
        assert_eq!(r, regions[0]);
    }
}
