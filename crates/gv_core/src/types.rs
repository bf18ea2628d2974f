use std::fmt;

use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Side length of the square image the model expects.
pub const INPUT_SIZE: u32 = 256;
pub const INPUT_CHANNELS: usize = 3;
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];
/// Divisor mapping 8-bit channel values into [0, 1].
pub const PIXEL_SCALE: f32 = 255.0;

/// Disease classes in the order of the model's output indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseClass {
    BlackMeasles,
    BlackRot,
    HealthyGrapes,
    LeafBlight,
}

impl DiseaseClass {
    pub const ALL: [DiseaseClass; 4] = [
        DiseaseClass::BlackMeasles,
        DiseaseClass::BlackRot,
        DiseaseClass::HealthyGrapes,
        DiseaseClass::LeafBlight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseClass::BlackMeasles => "BlackMeasles",
            DiseaseClass::BlackRot => "BlackRot",
            DiseaseClass::HealthyGrapes => "HealthyGrapes",
            DiseaseClass::LeafBlight => "LeafBlight",
        }
    }
}

impl fmt::Display for DiseaseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized NHWC image batch fed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor(Array4<f32>);

impl InputTensor {
    pub fn new(array: Array4<f32>) -> Self {
        Self(array)
    }

    pub fn zeros() -> Self {
        Self(Array4::zeros((
            INPUT_SHAPE[0],
            INPUT_SHAPE[1],
            INPUT_SHAPE[2],
            INPUT_SHAPE[3],
        )))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.0
    }

    /// Row-major view of the data, `None` if the array is not in standard layout.
    pub fn as_slice(&self) -> Option<&[f32]> {
        self.0.as_slice()
    }
}

/// Raw values read from the model's output slot, with the shape the model reported.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputScores {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub label: DiseaseClass,
    pub percentage: f32,
}

/// Per-class percentages, always in `DiseaseClass::ALL` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predictions: Vec<ClassScore>,
}

impl Prediction {
    pub fn rows(&self) -> &[ClassScore] {
        &self.predictions
    }

    pub fn total(&self) -> f32 {
        self.predictions.iter().map(|row| row.percentage).sum()
    }

    /// Highest-scoring row; ties keep the earliest label.
    pub fn top(&self) -> Option<&ClassScore> {
        self.predictions.iter().fold(None, |best: Option<&ClassScore>, row| match best {
            Some(b) if b.percentage >= row.percentage => Some(b),
            _ => Some(row),
        })
    }

    pub fn max_percentage(&self) -> f32 {
        self.predictions
            .iter()
            .map(|row| row.percentage)
            .fold(0.0, f32::max)
    }
}
