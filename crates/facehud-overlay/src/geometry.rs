//! Coordinate rescaling from the processing resolution to the display
//! resolution, applied uniformly to boxes and landmark points once per
//! tick.

use facehud_core::types::{Detection, FaceBox, Landmarks};

/// Mapping from source (capture/processing) dimensions to destination
/// (display) dimensions.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    scale_x: f32,
    scale_y: f32,
}

impl Viewport {
    pub fn new(src: (u32, u32), dst: (u32, u32)) -> Self {
        Self {
            scale_x: dst.0 as f32 / src.0.max(1) as f32,
            scale_y: dst.1 as f32 / src.1.max(1) as f32,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.scale_x == 1.0 && self.scale_y == 1.0
    }

    pub fn scale_point(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (x * self.scale_x, y * self.scale_y)
    }

    pub fn scale_box(&self, b: &FaceBox) -> FaceBox {
        FaceBox {
            x: b.x * self.scale_x,
            y: b.y * self.scale_y,
            width: b.width * self.scale_x,
            height: b.height * self.scale_y,
            confidence: b.confidence,
        }
    }

    /// Rescale all geometry of a detection; descriptor and attributes pass
    /// through untouched.
    pub fn rescale(&self, detection: &Detection) -> Detection {
        Detection {
            face: self.scale_box(&detection.face),
            landmarks: Landmarks {
                points: detection
                    .landmarks
                    .points
                    .iter()
                    .map(|&p| self.scale_point(p))
                    .collect(),
            },
            descriptor: detection.descriptor.clone(),
            attributes: detection.attributes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facehud_core::types::{
        Descriptor, ExpressionScores, FaceAttributes, Gender, GenderEstimate,
    };

    fn detection() -> Detection {
        Detection {
            face: FaceBox { x: 10.0, y: 20.0, width: 100.0, height: 50.0, confidence: 0.8 },
            landmarks: Landmarks { points: vec![(10.0, 20.0), (110.0, 70.0)] },
            descriptor: Descriptor { values: vec![1.0, 2.0] },
            attributes: FaceAttributes {
                age: 30.0,
                gender: GenderEstimate { gender: Gender::Female, probability: 0.9 },
                expressions: ExpressionScores { scores: [0.0; 7] },
            },
        }
    }

    #[test]
    fn test_identity_viewport() {
        let vp = Viewport::new((640, 480), (640, 480));
        assert!(vp.is_identity());

        let d = detection();
        let r = vp.rescale(&d);
        assert_eq!(r.face.x, d.face.x);
        assert_eq!(r.landmarks.points, d.landmarks.points);
    }

    #[test]
    fn test_upscale_applies_to_boxes_and_points() {
        let vp = Viewport::new((640, 480), (1280, 960));
        let r = vp.rescale(&detection());

        assert_eq!(r.face.x, 20.0);
        assert_eq!(r.face.y, 40.0);
        assert_eq!(r.face.width, 200.0);
        assert_eq!(r.face.height, 100.0);
        assert_eq!(r.landmarks.points[0], (20.0, 40.0));
        assert_eq!(r.landmarks.points[1], (220.0, 140.0));
    }

    #[test]
    fn test_anisotropic_scale() {
        let vp = Viewport::new((100, 100), (200, 50));
        let r = vp.rescale(&detection());

        assert_eq!(r.face.width, 200.0);
        assert_eq!(r.face.height, 25.0);
    }

    #[test]
    fn test_descriptor_and_attributes_untouched() {
        let vp = Viewport::new((640, 480), (1920, 1080));
        let d = detection();
        let r = vp.rescale(&d);

        assert_eq!(r.descriptor.values, d.descriptor.values);
        assert_eq!(r.attributes.age, d.attributes.age);
    }
}
