use std::str::FromStr;

use crate::catalog::models::SpaModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityBucket {
    UpToFour,
    FiveToSix,
    SevenPlus,
}

impl CapacityBucket {
    pub fn matches(self, capacity: u32) -> bool {
        match self {
            CapacityBucket::UpToFour => capacity <= 4,
            CapacityBucket::FiveToSix => (5..=6).contains(&capacity),
            CapacityBucket::SevenPlus => capacity >= 7,
        }
    }
}

impl FromStr for CapacityBucket {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "2-4" | "4" | "small" => Ok(CapacityBucket::UpToFour),
            "5-6" | "6" | "medium" => Ok(CapacityBucket::FiveToSix),
            "7+" | "8" | "large" => Ok(CapacityBucket::SevenPlus),
            other => Err(format!(
                "Unknown capacity bucket '{other}' (expected 2-4, 5-6 or 7+)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanShape {
    Round,
    Square,
    Rectangular,
}

const EVEN_RATIO_MIN: f64 = 0.9;
const EVEN_RATIO_MAX: f64 = 1.1;
const RECTANGULAR_RATIO_MIN: f64 = 1.2;

impl PlanShape {
    /// Round and square products share a footprint ratio; the active filter decides the label.
    pub fn matches(self, spa: &SpaModel) -> bool {
        let Some(ratio) = spa.dimensions.aspect_ratio() else {
            return false;
        };
        match self {
            PlanShape::Round | PlanShape::Square => {
                (EVEN_RATIO_MIN..=EVEN_RATIO_MAX).contains(&ratio)
            }
            PlanShape::Rectangular => ratio >= RECTANGULAR_RATIO_MIN,
        }
    }
}

impl FromStr for PlanShape {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "round" => Ok(PlanShape::Round),
            "square" => Ok(PlanShape::Square),
            "rectangular" | "rectangle" => Ok(PlanShape::Rectangular),
            other => Err(format!(
                "Unknown shape '{other}' (expected round, square or rectangular)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogFilter {
    pub capacity: Option<CapacityBucket>,
    pub shape: Option<PlanShape>,
}

impl CatalogFilter {
    pub fn matches(&self, spa: &SpaModel) -> bool {
        if let Some(bucket) = self.capacity {
            if !bucket.matches(spa.capacity) {
                return false;
            }
        }
        if let Some(shape) = self.shape {
            if !shape.matches(spa) {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.capacity.is_none() && self.shape.is_none()
    }
}
