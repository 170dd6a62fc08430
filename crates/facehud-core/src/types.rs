use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box for a detected face, in pixel coordinates of
/// the frame it was detected in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Top-right corner, the anchor used for the age/gender text field.
    pub fn top_right(&self) -> (f32, f32) {
        (self.right(), self.y)
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &FaceBox) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.width * self.height + other.width * other.height - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Number of points produced by the landmark estimator (iBUG 68 layout).
pub const LANDMARK_POINTS: usize = 68;

// iBUG 68 indices for the five alignment anchors.
const LEFT_EYE_RANGE: std::ops::Range<usize> = 36..42;
const RIGHT_EYE_RANGE: std::ops::Range<usize> = 42..48;
const NOSE_TIP: usize = 30;
const MOUTH_LEFT: usize = 48;
const MOUTH_RIGHT: usize = 54;

/// Facial landmark point set, in pixel coordinates of the source frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landmarks {
    pub points: Vec<(f32, f32)>,
}

impl Landmarks {
    /// Reduce the 68-point set to the five canonical alignment anchors:
    /// [left eye center, right eye center, nose tip, left mouth corner,
    /// right mouth corner]. Returns `None` unless all 68 points are present.
    pub fn alignment_points(&self) -> Option<[(f32, f32); 5]> {
        if self.points.len() != LANDMARK_POINTS {
            return None;
        }

        let centroid = |range: std::ops::Range<usize>| {
            let n = range.len() as f32;
            let (sx, sy) = self.points[range]
                .iter()
                .fold((0.0f32, 0.0f32), |(ax, ay), (x, y)| (ax + x, ay + y));
            (sx / n, sy / n)
        };

        Some([
            centroid(LEFT_EYE_RANGE),
            centroid(RIGHT_EYE_RANGE),
            self.points[NOSE_TIP],
            self.points[MOUTH_LEFT],
            self.points[MOUTH_RIGHT],
        ])
    }
}

/// Face descriptor vector (128-dimensional), L2-normalized at extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    /// Euclidean distance to another descriptor. This is the fixed distance
    /// function used for gallery matching; identical descriptors are at 0.
    pub fn distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Estimated gender category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// Gender category with the model's confidence in it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenderEstimate {
    pub gender: Gender,
    pub probability: f32,
}

/// Expression class names, in model output order.
pub const EXPRESSION_NAMES: [&str; 7] = [
    "neutral",
    "happy",
    "sad",
    "angry",
    "fearful",
    "disgusted",
    "surprised",
];

/// Per-expression probabilities, softmaxed so they sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionScores {
    pub scores: [f32; 7],
}

impl ExpressionScores {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        EXPRESSION_NAMES.iter().copied().zip(self.scores.iter().copied())
    }

    /// The highest-probability expression.
    pub fn dominant(&self) -> (&'static str, f32) {
        let mut best = (EXPRESSION_NAMES[0], self.scores[0]);
        for (name, score) in self.iter() {
            if score > best.1 {
                best = (name, score);
            }
        }
        best
    }
}

/// Per-face attributes estimated from the aligned crop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceAttributes {
    /// Age in years.
    pub age: f32,
    pub gender: GenderEstimate,
    pub expressions: ExpressionScores,
}

/// Everything the analyzer produces for one face in one frame. Transient:
/// lives only within a single tick.
#[derive(Debug, Clone)]
pub struct Detection {
    pub face: FaceBox,
    pub landmarks: Landmarks,
    pub descriptor: Descriptor,
    pub attributes: FaceAttributes,
}

/// Analysis result for a reference image: box, landmarks, and descriptor
/// only — attributes are not computed for gallery entries.
#[derive(Debug, Clone)]
pub struct ReferenceFace {
    pub face: FaceBox,
    pub landmarks: Landmarks,
    pub descriptor: Descriptor,
}
