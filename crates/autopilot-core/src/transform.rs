//! Mapping between the engine's virtual coordinate space and the device's
//! physical input space.
//!
//! The virtual screen is letterboxed into the physical one: whichever axis
//! needs the larger virtual-per-physical scale keeps its full extent, and the
//! other axis is centered with an offset. Landscape orientations additionally
//! swap (and flip) the axes because physical input is always reported in the
//! device's portrait frame.
//!
//! [`to_physical`] and [`to_virtual`] are exact inverses as long as the two
//! scale factors in [`ScreenMetrics`] are reciprocal.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Current screen orientation as reported by the embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl ScreenOrientation {
    pub fn is_landscape(&self) -> bool {
        matches!(self, ScreenOrientation::LandscapeLeft | ScreenOrientation::LandscapeRight)
    }
}

/// Screen parameters pulled from the environment each time a point is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenMetrics {
    /// How the UI is rotated relative to the native frame.
    #[serde(default)]
    pub orientation: ScreenOrientation,
    /// Physical screen width in the device's native (portrait) frame.
    pub physical_width: f32,
    /// Physical screen height in the device's native (portrait) frame.
    pub physical_height: f32,
    /// Width of the coordinate space scripts are written in.
    pub virtual_width: f32,
    /// Height of the coordinate space scripts are written in.
    pub virtual_height: f32,
    /// Scale applied after the virtual offset is removed.
    #[serde(default = "unit_factor")]
    pub virtual_to_physical: f32,
    /// Inverse of `virtual_to_physical`.
    #[serde(default = "unit_factor")]
    pub physical_to_virtual: f32,
}

fn unit_factor() -> f32 {
    1.0
}

impl Default for ScreenMetrics {
    fn default() -> Self {
        Self::identity(1024.0, 768.0)
    }
}

impl ScreenMetrics {
    /// Metrics where virtual and physical spaces coincide.
    pub fn identity(width: f32, height: f32) -> Self {
        Self {
            orientation: ScreenOrientation::Portrait,
            physical_width: width,
            physical_height: height,
            virtual_width: width,
            virtual_height: height,
            virtual_to_physical: 1.0,
            physical_to_virtual: 1.0,
        }
    }

    /// Physical input extent, swapped for landscape orientations.
    fn input_size(&self) -> (f32, f32) {
        if self.orientation.is_landscape() {
            (self.physical_height, self.physical_width)
        } else {
            (self.physical_width, self.physical_height)
        }
    }

    /// Letterbox offset that centers the virtual content on the short axis.
    fn input_offset(&self) -> Point {
        let (input_width, input_height) = self.input_size();
        let w = self.virtual_width / input_width;
        let h = self.virtual_height / input_height;
        if w > h {
            Point::new(0.0, 0.5 * (self.virtual_height - input_height * w))
        } else {
            Point::new(0.5 * (self.virtual_width - input_width * h), 0.0)
        }
    }
}

/// Maps a virtual point to the device's physical input space.
pub fn to_physical(metrics: &ScreenMetrics, virtual_point: Point) -> Point {
    let (input_width, input_height) = metrics.input_size();
    let offset = metrics.input_offset();
    let factor = metrics.virtual_to_physical;
    let shifted = virtual_point - offset;

    match metrics.orientation {
        ScreenOrientation::LandscapeLeft => {
            Point::new(shifted.y * factor, input_width - shifted.x * factor)
        }
        ScreenOrientation::LandscapeRight => {
            Point::new(input_height - shifted.y * factor, shifted.x * factor)
        }
        ScreenOrientation::Portrait | ScreenOrientation::PortraitUpsideDown => shifted * factor,
    }
}

/// Maps a physical input point back into virtual space.
pub fn to_virtual(metrics: &ScreenMetrics, physical_point: Point) -> Point {
    let (input_width, input_height) = metrics.input_size();
    let offset = metrics.input_offset();

    let unrotated = match metrics.orientation {
        ScreenOrientation::LandscapeLeft => {
            Point::new(input_width - physical_point.y, physical_point.x)
        }
        ScreenOrientation::LandscapeRight => {
            Point::new(physical_point.y, input_height - physical_point.x)
        }
        ScreenOrientation::Portrait | ScreenOrientation::PortraitUpsideDown => physical_point,
    };

    unrotated * metrics.physical_to_virtual + offset
}
