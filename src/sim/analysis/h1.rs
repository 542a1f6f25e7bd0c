use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// Accumulated weights of one bin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BinStats {
    pub entries: u64,
    /// Sum of weights.
    pub sw: f64,
    /// Sum of squared weights.
    pub sw2: f64,
    /// Sum of weight times value.
    pub sxw: f64,
    /// Sum of weight times squared value.
    pub sx2w: f64,
}

impl BinStats {
    fn fill(&mut self, x: f64, w: f64) {
        self.entries += 1;
        self.sw += w;
        self.sw2 += w * w;
        self.sxw += x * w;
        self.sx2w += x * x * w;
    }

    fn merge(&mut self, other: &Self) {
        self.entries += other.entries;
        self.sw += other.sw;
        self.sw2 += other.sw2;
        self.sxw += other.sxw;
        self.sx2w += other.sx2w;
    }
}

/// One-dimensional histogram with fixed binning.
///
/// Bin 0 is the underflow, bins `1..=nbins` cover `[min, max)` and bin
/// `nbins + 1` is the overflow. Mean and rms use in-range fills only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct H1 {
    pub name: String,
    pub title: String,
    nbins: usize,
    min: f64,
    max: f64,
    bins: Vec<BinStats>,
}

impl H1 {
    pub fn new(name: &str, title: &str, nbins: usize, min: f64, max: f64) -> Result<Self> {
        if nbins == 0 || !(min < max) {
            bail!(DetectorError::Booking(format!(
                "histogram '{name}' needs nbins > 0 and min < max, got {nbins} [{min}, {max})"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            title: title.to_string(),
            nbins,
            min,
            max,
            bins: vec![BinStats::default(); nbins + 2],
        })
    }

    pub fn nbins(&self) -> usize {
        self.nbins
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Index into [`Self::bins`] for a value, including under/overflow.
    pub fn bin_index(&self, x: f64) -> usize {
        if x < self.min {
            0
        } else if x >= self.max || x.is_nan() {
            self.nbins + 1
        } else {
            let i = ((x - self.min) / (self.max - self.min) * self.nbins as f64) as usize;
            // Rounding can push values just below max onto the overflow edge
            i.min(self.nbins - 1) + 1
        }
    }

    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, w: f64) {
        let i = self.bin_index(x);
        self.bins[i].fill(x, w);
    }

    /// All bins, underflow first and overflow last.
    pub fn bins(&self) -> &[BinStats] {
        &self.bins
    }

    /// Lower edge of in-range bin `i` (`0..nbins`).
    pub fn bin_lower_edge(&self, i: usize) -> f64 {
        self.min + (self.max - self.min) * i as f64 / self.nbins as f64
    }

    fn in_range(&self) -> &[BinStats] {
        &self.bins[1..=self.nbins]
    }

    /// Number of in-range fills.
    pub fn entries(&self) -> u64 {
        self.in_range().iter().map(|b| b.entries).sum()
    }

    /// Number of fills including under- and overflow.
    pub fn all_entries(&self) -> u64 {
        self.bins.iter().map(|b| b.entries).sum()
    }

    pub fn underflow(&self) -> &BinStats {
        &self.bins[0]
    }

    pub fn overflow(&self) -> &BinStats {
        &self.bins[self.nbins + 1]
    }

    pub fn sum_of_weights(&self) -> f64 {
        self.in_range().iter().map(|b| b.sw).sum()
    }

    pub fn mean(&self) -> f64 {
        let sw = self.sum_of_weights();
        if sw == 0.0 {
            return 0.0;
        }
        self.in_range().iter().map(|b| b.sxw).sum::<f64>() / sw
    }

    pub fn rms(&self) -> f64 {
        let sw = self.sum_of_weights();
        if sw == 0.0 {
            return 0.0;
        }
        let mean = self.mean();
        let sx2w: f64 = self.in_range().iter().map(|b| b.sx2w).sum();
        (sx2w / sw - mean * mean).max(0.0).sqrt()
    }

    /// Adds the contents of a histogram with identical binning.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.nbins != other.nbins || self.min != other.min || self.max != other.max {
            bail!(DetectorError::Booking(format!(
                "cannot merge histogram '{}' into '{}': binning differs",
                other.name, self.name
            )));
        }
        for (a, b) in self.bins.iter_mut().zip(other.bins.iter()) {
            a.merge(b);
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = BinStats::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_and_overflow() {
        let mut h = H1::new("Ediode", "Edep in diode", 10, 0.0, 10.0).unwrap();
        h.fill(-1.0);
        h.fill(0.0);
        h.fill(9.999);
        h.fill(10.0);
        h.fill(25.0);
        assert_eq!(h.underflow().entries, 1);
        assert_eq!(h.overflow().entries, 2);
        assert_eq!(h.entries(), 2);
        assert_eq!(h.all_entries(), 5);
        assert_eq!(h.bins()[1].entries, 1);
        assert_eq!(h.bins()[10].entries, 1);
    }

    #[test]
    fn test_mean_rms_in_range_only() {
        let mut h = H1::new("h", "h", 100, 0.0, 10.0).unwrap();
        for x in [1.0, 3.0] {
            h.fill(x);
        }
        h.fill(50.0);
        assert!((h.mean() - 2.0).abs() < 1e-12);
        assert!((h.rms() - 1.0).abs() < 1e-12);
        assert_eq!(h.sum_of_weights(), 2.0);
    }

    #[test]
    fn test_empty_histogram() {
        let h = H1::new("h", "h", 10, 0.0, 1.0).unwrap();
        assert_eq!(h.entries(), 0);
        assert_eq!(h.mean(), 0.0);
        assert_eq!(h.rms(), 0.0);
    }

    #[test]
    fn test_merge_is_additive() {
        let mut a = H1::new("h", "h", 10, 0.0, 10.0).unwrap();
        let mut b = a.clone();
        let mut both = a.clone();
        for x in [0.5, 2.5, 11.0] {
            a.fill(x);
            both.fill(x);
        }
        for x in [2.7, -3.0] {
            b.fill(x);
            both.fill(x);
        }
        a.merge(&b).unwrap();
        assert_eq!(a, both);

        let other = H1::new("h", "h", 5, 0.0, 10.0).unwrap();
        assert!(a.merge(&other).is_err());
    }

    #[test]
    fn test_invalid_booking() {
        assert!(H1::new("h", "h", 0, 0.0, 1.0).is_err());
        assert!(H1::new("h", "h", 10, 1.0, 1.0).is_err());
    }
}
