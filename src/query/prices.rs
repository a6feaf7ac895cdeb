//! Price windows and the seed partition generator
//!
//! Seeds are built at three step sizes so that low prices, where listings are dense, get the
//! finest resolution. A single wide tail window picks up everything priced above the grid.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open integer price interval `[min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceWindow {
    pub min: u32,
    pub max: u32,
}

impl PriceWindow {
    /// Creates a window, returning `None` if it would be empty
    pub fn new(min: u32, max: u32) -> Option<Self> {
        if min < max {
            Some(Self { min, max })
        } else {
            None
        }
    }

    pub fn width(&self) -> u32 {
        self.max - self.min
    }

    /// Floor midpoint of the window
    pub fn midpoint(&self) -> u32 {
        // Computed without overflowing on large bounds
        self.min + (self.max - self.min) / 2
    }

    /// Whether the window can be bisected at all
    ///
    /// A width-1 window has `midpoint == min`; splitting it would produce an empty child and
    /// an identical sibling, so it is always treated as retrievable.
    pub fn is_splittable(&self) -> bool {
        self.width() > 1
    }

    /// Bisects the window at its floor midpoint
    ///
    /// Returns `None` for windows that cannot be split. Both children are strictly narrower
    /// than the parent, disjoint, and their union is the parent.
    pub fn split(&self) -> Option<(PriceWindow, PriceWindow)> {
        if !self.is_splittable() {
            return None;
        }
        let mid = self.midpoint();
        Some((
            PriceWindow {
                min: self.min,
                max: mid,
            },
            PriceWindow {
                min: mid,
                max: self.max,
            },
        ))
    }

    /// Narrows the window to an optional budget, returning `None` if nothing is left
    pub fn clip(&self, budget_min: Option<u32>, budget_max: Option<u32>) -> Option<PriceWindow> {
        let min = budget_min.map_or(self.min, |b| self.min.max(b));
        let max = budget_max.map_or(self.max, |b| self.max.min(b));
        PriceWindow::new(min, max)
    }
}

impl fmt::Display for PriceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// One step granularity of the seed grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceStep {
    pub start: u32,
    pub step: u32,
}

/// Generates the ordered seed partitions for a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRangeGenerator {
    /// Step granularities, emitted in order (fine, medium, coarse)
    pub steps: Vec<PriceStep>,
    /// Inclusive upper boundary of the stepped grid
    pub upper: u32,
    /// Overflow window appended after the grid
    pub tail: PriceWindow,
}

impl Default for PriceRangeGenerator {
    fn default() -> Self {
        Self {
            steps: vec![
                PriceStep { start: 10, step: 20 },
                PriceStep { start: 10, step: 30 },
                PriceStep { start: 0, step: 40 },
            ],
            upper: 1600,
            tail: PriceWindow {
                min: 1500,
                max: 50_000,
            },
        }
    }
}

impl PriceRangeGenerator {
    /// Produces the seed windows
    ///
    /// Each granularity contributes the consecutive pairs of its boundaries
    /// `start, start + step, ...` up to and including `upper`. The sequence is deterministic
    /// and windows from different granularities overlap on purpose.
    pub fn generate(&self) -> Vec<PriceWindow> {
        let mut windows = Vec::new();

        for grain in &self.steps {
            if grain.step == 0 {
                continue;
            }
            let boundaries: Vec<u32> = (grain.start..=self.upper)
                .step_by(grain.step as usize)
                .collect();
            windows.extend(
                boundaries
                    .windows(2)
                    .filter_map(|pair| PriceWindow::new(pair[0], pair[1])),
            );
        }

        windows.push(self.tail);
        windows
    }

    /// Produces the seed windows narrowed to an optional budget
    pub fn generate_within(&self, budget_min: Option<u32>, budget_max: Option<u32>) -> Vec<PriceWindow> {
        self.generate()
            .into_iter()
            .filter_map(|w| w.clip(budget_min, budget_max))
            .collect()
    }
}
