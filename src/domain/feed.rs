//! Per-asset bar series and the date-aligned feed that drives the engine.
//!
//! The feed is a read-only view over its series: every call to
//! [`BarFeed::batches`] starts a fresh forward-only walk, so independent runs can
//! replay the same feed.

use crate::domain::bar::Bar;
use crate::domain::error::NavtraderError;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct AssetSeries {
    pub asset: String,
    bars: Vec<Bar>,
}

impl AssetSeries {
    /// Bars must be strictly increasing by date.
    pub fn new(asset: impl Into<String>, bars: Vec<Bar>) -> Result<Self, NavtraderError> {
        let asset = asset.into();
        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(NavtraderError::UnsortedSeries {
                asset,
                date: pair[1].date,
            });
        }
        Ok(Self { asset, bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }
}

pub fn build_unified_timeline(series: &[AssetSeries]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}

/// The asset universe in iteration order plus its aligned calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarFeed {
    series: Vec<AssetSeries>,
    timeline: Vec<NaiveDate>,
}

impl BarFeed {
    /// Series order is the universe order.
    pub fn new(series: Vec<AssetSeries>) -> Self {
        let timeline = build_unified_timeline(&series);
        Self { series, timeline }
    }

    /// Builds a feed ordered by `universe`, taking each asset's bars from `bars`.
    pub fn from_map(
        universe: &[String],
        mut bars: HashMap<String, Vec<Bar>>,
    ) -> Result<Self, NavtraderError> {
        let mut series = Vec::with_capacity(universe.len());
        for asset in universe {
            let asset_bars = bars
                .remove(asset)
                .ok_or_else(|| NavtraderError::MissingSeries {
                    asset: asset.clone(),
                })?;
            series.push(AssetSeries::new(asset.clone(), asset_bars)?);
        }

        if !bars.is_empty() {
            let mut extra: Vec<&String> = bars.keys().collect();
            extra.sort();
            return Err(NavtraderError::UniverseMismatch {
                reason: format!("series supplied for assets outside the universe: {:?}", extra),
            });
        }

        Ok(Self::new(series))
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.asset.as_str())
    }

    pub fn asset_count(&self) -> usize {
        self.series.len()
    }

    pub fn series(&self) -> &[AssetSeries] {
        &self.series
    }

    pub fn timeline(&self) -> &[NaiveDate] {
        &self.timeline
    }

    pub fn batches(&self) -> DateBatches<'_> {
        DateBatches {
            feed: self,
            position: 0,
            cursors: vec![0; self.series.len()],
        }
    }
}

/// One asset's bar on the current date, tagged with its universe position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetBar<'a> {
    pub index: usize,
    pub asset: &'a str,
    pub bar: &'a Bar,
}

/// Everything the universe trades on one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateBatch<'a> {
    pub date: NaiveDate,
    /// Assets with a bar on `date`, in universe order.
    pub present: Vec<AssetBar<'a>>,
    /// Universe indices of assets without a bar on `date`.
    pub missing: Vec<usize>,
}

pub struct DateBatches<'a> {
    feed: &'a BarFeed,
    position: usize,
    cursors: Vec<usize>,
}

impl<'a> Iterator for DateBatches<'a> {
    type Item = DateBatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let feed: &'a BarFeed = self.feed;
        let date = *feed.timeline.get(self.position)?;
        self.position += 1;

        let mut present = Vec::with_capacity(feed.series.len());
        let mut missing = Vec::new();

        for (index, series) in feed.series.iter().enumerate() {
            let cursor = self.cursors[index];
            match series.bars.get(cursor) {
                Some(bar) if bar.date == date => {
                    self.cursors[index] = cursor + 1;
                    present.push(AssetBar {
                        index,
                        asset: series.asset.as_str(),
                        bar,
                    });
                }
                _ => missing.push(index),
            }
        }

        Some(DateBatch {
            date,
            present,
            missing,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.feed.timeline.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DateBatches<'_> {}
