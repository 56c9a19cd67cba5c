//! Feature engineering for housing records.
//!
//! [`FeatureEngineer::transform`] adds a fixed, versioned set of derived
//! columns. It is a pure function of its input row and the frozen
//! [`NeighborhoodStats`], so training and inference rows are derived the same
//! way.
//!
//! Absent or null sources take a default (0 unless documented otherwise).
//! `YearBuilt`, `YrSold`, `OverallQual` and `GrLivArea` have no default and
//! their absence is a [`ProcessingError::FeatureComputation`].

mod formulas;
mod neighborhood;

pub use formulas::{age_category, log_area, quality_score, sale_season};
pub use neighborhood::{NEIGHBORHOOD_COLUMN, NeighborhoodRow, NeighborhoodStats};

use crate::error::{ProcessingError, Result};
use crate::utils::{numeric_values, safe_div, string_values};
use formulas::{finite_or_zero, flag};
use polars::prelude::*;
use tracing::debug;

/// Version of the derived column set. Bump whenever a formula or name changes.
pub const FEATURE_SET_VERSION: u32 = 1;

/// Every column added by [`FeatureEngineer::transform`], in insertion order.
pub const ENGINEERED_FEATURES: &[&str] = &[
    // Age
    "HouseAge",
    "YearsSinceRemodel",
    "RecentRemodel",
    "WasRemodeled",
    "GarageAge",
    "AgeCategory",
    // Area
    "TotalSF",
    "TotalBathrooms",
    "TotalPorchSF",
    "AvgRoomSize",
    "FinishedBsmtRatio",
    "LivingAreaRatio",
    "GarageRatio",
    "GarageCapacity",
    // Quality
    "OverallScore",
    "ExterScore",
    "KitchenScore",
    "AvgQuality",
    // Binary
    "HasPool",
    "HasFireplace",
    "HasGarage",
    "HasBasement",
    "Has2ndFloor",
    "HasWoodDeck",
    "HasPorch",
    "HasMultipleFloors",
    "HasGoodFence",
    "HasCentralAir",
    "HasPavedDrive",
    // Neighborhood
    "NeighborhoodMedianPrice",
    "NeighborhoodMeanPrice",
    "NeighborhoodPriceStd",
    "NeighborhoodSize",
    "NeighborhoodAvgQuality",
    // Interaction
    "GrLivArea_Squared",
    "TotalSF_Squared",
    "Qual_SF_Interaction",
    "Qual_Age_Interaction",
    "Bath_Bedroom_Ratio",
    // Temporal
    "SaleSeason",
    "IsSummerSale",
    "YearsSince2006",
    // Log
    "LotAreaLog",
    "GrLivAreaLog",
    "TotalSFLog",
];

/// Porch columns summed into `TotalPorchSF`.
const PORCH_COLUMNS: [&str; 5] = [
    "WoodDeckSF",
    "OpenPorchSF",
    "EnclosedPorch",
    "3SsnPorch",
    "ScreenPorch",
];

/// Adds derived columns using frozen neighborhood statistics.
#[derive(Debug, Clone, Copy)]
pub struct FeatureEngineer<'a> {
    neighborhoods: &'a NeighborhoodStats,
}

impl<'a> FeatureEngineer<'a> {
    pub fn new(neighborhoods: &'a NeighborhoodStats) -> Self {
        Self { neighborhoods }
    }

    /// Return a copy of `df` with every column of [`ENGINEERED_FEATURES`] added.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let src = Sources::new(df);
        let core = Core {
            year_built: src.required("YearBuilt", "HouseAge")?,
            yr_sold: src.required("YrSold", "HouseAge")?,
            overall_qual: src.required("OverallQual", "OverallScore")?,
            gr_liv_area: src.required("GrLivArea", "Qual_SF_Interaction")?,
        };

        let mut out = DerivedColumns::default();
        let house_age = Self::age_features(&src, &core, &mut out)?;
        let area = Self::area_features(&src, &core, &mut out)?;
        Self::quality_features(&src, &core, &mut out)?;
        Self::binary_features(&src, &area, &mut out)?;
        self.neighborhood_features(&src, &mut out)?;
        Self::interaction_features(&src, &core, &house_age, &area, &mut out)?;
        Self::temporal_features(&src, &core, &mut out)?;
        Self::log_features(&src, &core, &area, &mut out)?;

        let mut result = df.clone();
        let added = out.columns.len();
        for series in out.columns {
            result.with_column(series)?;
        }

        debug!("Engineered {} features for {} rows", added, result.height());
        Ok(result)
    }

    fn age_features(src: &Sources, core: &Core, out: &mut DerivedColumns) -> Result<Vec<f64>> {
        let year_remod: Vec<f64> = src
            .optional("YearRemodAdd")?
            .into_iter()
            .zip(&core.year_built)
            .map(|(remod, built)| remod.unwrap_or(*built))
            .collect();

        let house_age: Vec<f64> = zip_map(&core.yr_sold, &core.year_built, |s, b| s - b);
        let years_since_remodel: Vec<f64> = zip_map(&core.yr_sold, &year_remod, |s, r| s - r);
        let garage_age: Vec<f64> = src
            .optional("GarageYrBlt")?
            .into_iter()
            .zip(&core.yr_sold)
            .map(|(garage, sold)| garage.map(|g| sold - g).unwrap_or(-1.0))
            .collect();

        out.numbers("HouseAge", house_age.clone());
        out.numbers("YearsSinceRemodel", years_since_remodel.clone());
        out.flags(
            "RecentRemodel",
            years_since_remodel.iter().map(|y| *y < 10.0),
        );
        out.flags(
            "WasRemodeled",
            year_remod.iter().zip(&core.year_built).map(|(r, b)| r != b),
        );
        out.numbers("GarageAge", garage_age);
        out.labels("AgeCategory", house_age.iter().map(|a| age_category(*a)));

        Ok(house_age)
    }

    fn area_features(src: &Sources, core: &Core, out: &mut DerivedColumns) -> Result<AreaTotals> {
        let total_bsmt = src.or("TotalBsmtSF", 0.0)?;
        let first_floor = src.or("1stFlrSF", 0.0)?;
        let second_floor = src.or("2ndFlrSF", 0.0)?;
        let total_sf: Vec<f64> = (0..src.height)
            .map(|i| total_bsmt[i] + first_floor[i] + second_floor[i])
            .collect();

        let full_bath = src.or("FullBath", 0.0)?;
        let half_bath = src.or("HalfBath", 0.0)?;
        let bsmt_full = src.or("BsmtFullBath", 0.0)?;
        let bsmt_half = src.or("BsmtHalfBath", 0.0)?;
        let total_bathrooms: Vec<f64> = (0..src.height)
            .map(|i| full_bath[i] + 0.5 * half_bath[i] + bsmt_full[i] + 0.5 * bsmt_half[i])
            .collect();

        let mut total_porch = vec![0.0; src.height];
        for column in PORCH_COLUMNS {
            for (sum, value) in total_porch.iter_mut().zip(src.or(column, 0.0)?) {
                *sum += value;
            }
        }

        let rooms = src.or("TotRmsAbvGrd", 0.0)?;
        let fin1 = src.or("BsmtFinSF1", 0.0)?;
        let fin2 = src.or("BsmtFinSF2", 0.0)?;
        let garage_area = src.or("GarageArea", 0.0)?;
        let garage_cars = src.or("GarageCars", 0.0)?;

        out.numbers("TotalSF", total_sf.clone());
        out.numbers("TotalBathrooms", total_bathrooms.clone());
        out.numbers("TotalPorchSF", total_porch.clone());
        out.numbers("AvgRoomSize", zip_map(&core.gr_liv_area, &rooms, safe_div));
        out.numbers(
            "FinishedBsmtRatio",
            (0..src.height)
                .map(|i| safe_div(fin1[i] + fin2[i], total_bsmt[i]))
                .collect(),
        );
        out.numbers(
            "LivingAreaRatio",
            zip_map(&core.gr_liv_area, &total_sf, |g, t| safe_div(g, t + 1.0)),
        );
        out.numbers(
            "GarageRatio",
            zip_map(&garage_area, &core.gr_liv_area, safe_div),
        );
        out.numbers(
            "GarageCapacity",
            zip_map(&garage_cars, &garage_area, |c, a| c + a / 200.0),
        );

        Ok(AreaTotals {
            total_bsmt,
            first_floor,
            second_floor,
            total_sf,
            total_bathrooms,
            total_porch,
            garage_area,
        })
    }

    fn quality_features(src: &Sources, core: &Core, out: &mut DerivedColumns) -> Result<()> {
        let overall_cond = src.or("OverallCond", 5.0)?;
        let exter_qual = src.quality("ExterQual", 3.0)?;
        let exter_cond = src.quality("ExterCond", 3.0)?;
        let kitchen_qual = src.quality("KitchenQual", 3.0)?;
        let kitchen_count = src.or("KitchenAbvGr", 1.0)?;
        let bsmt_qual = src.quality("BsmtQual", 0.0)?;

        out.numbers(
            "OverallScore",
            zip_map(&core.overall_qual, &overall_cond, |q, c| q * c),
        );
        out.numbers("ExterScore", zip_map(&exter_qual, &exter_cond, |q, c| q * c));
        out.numbers(
            "KitchenScore",
            zip_map(&kitchen_qual, &kitchen_count, |q, n| q * n),
        );
        out.numbers(
            "AvgQuality",
            (0..src.height)
                .map(|i| {
                    (core.overall_qual[i] + exter_qual[i] + kitchen_qual[i] + bsmt_qual[i]) / 4.0
                })
                .collect(),
        );
        Ok(())
    }

    fn binary_features(src: &Sources, area: &AreaTotals, out: &mut DerivedColumns) -> Result<()> {
        let positive = |values: &[f64]| values.iter().map(|v| *v > 0.0).collect::<Vec<_>>();

        out.flags("HasPool", positive(&src.or("PoolArea", 0.0)?));
        out.flags("HasFireplace", positive(&src.or("Fireplaces", 0.0)?));
        out.flags("HasGarage", positive(&area.garage_area));
        out.flags("HasBasement", positive(&area.total_bsmt));
        out.flags("Has2ndFloor", positive(&area.second_floor));
        out.flags("HasWoodDeck", positive(&src.or("WoodDeckSF", 0.0)?));
        out.flags("HasPorch", positive(&area.total_porch));
        out.flags(
            "HasMultipleFloors",
            area.first_floor
                .iter()
                .zip(&area.second_floor)
                .map(|(f, s)| *f > 0.0 && *s > 0.0),
        );

        let label_is = |column: &str, accepted: &[&str]| -> Result<Vec<bool>> {
            Ok(src
                .labels(column)?
                .iter()
                .map(|l| l.as_deref().is_some_and(|l| accepted.contains(&l)))
                .collect())
        };
        out.flags("HasGoodFence", label_is("Fence", &["GdPrv", "GdWo"])?);
        out.flags("HasCentralAir", label_is("CentralAir", &["Y"])?);
        out.flags("HasPavedDrive", label_is("PavedDrive", &["Y"])?);
        Ok(())
    }

    fn neighborhood_features(&self, src: &Sources, out: &mut DerivedColumns) -> Result<()> {
        let rows: Vec<&NeighborhoodRow> = src
            .labels(NEIGHBORHOOD_COLUMN)?
            .iter()
            .map(|label| self.neighborhoods.lookup(label.as_deref()))
            .collect();

        out.numbers(
            "NeighborhoodMedianPrice",
            rows.iter().map(|r| r.median_price).collect(),
        );
        out.numbers(
            "NeighborhoodMeanPrice",
            rows.iter().map(|r| r.mean_price).collect(),
        );
        out.numbers(
            "NeighborhoodPriceStd",
            rows.iter().map(|r| r.price_std).collect(),
        );
        out.numbers("NeighborhoodSize", rows.iter().map(|r| r.size).collect());
        out.numbers(
            "NeighborhoodAvgQuality",
            rows.iter().map(|r| r.avg_quality).collect(),
        );
        Ok(())
    }

    fn interaction_features(
        src: &Sources,
        core: &Core,
        house_age: &[f64],
        area: &AreaTotals,
        out: &mut DerivedColumns,
    ) -> Result<()> {
        let bedrooms = src.or("BedroomAbvGr", 0.0)?;

        out.numbers(
            "GrLivArea_Squared",
            core.gr_liv_area.iter().map(|g| g * g).collect(),
        );
        out.numbers(
            "TotalSF_Squared",
            area.total_sf.iter().map(|t| t * t).collect(),
        );
        out.numbers(
            "Qual_SF_Interaction",
            zip_map(&core.overall_qual, &core.gr_liv_area, |q, g| q * g),
        );
        out.numbers(
            "Qual_Age_Interaction",
            zip_map(&core.overall_qual, house_age, |q, a| q * a),
        );
        out.numbers(
            "Bath_Bedroom_Ratio",
            zip_map(&area.total_bathrooms, &bedrooms, |b, r| safe_div(b, r + 1.0)),
        );
        Ok(())
    }

    fn temporal_features(src: &Sources, core: &Core, out: &mut DerivedColumns) -> Result<()> {
        let month = src.or("MoSold", 0.0)?;

        out.labels("SaleSeason", month.iter().map(|m| sale_season(*m)));
        out.flags(
            "IsSummerSale",
            month.iter().map(|m| matches!(sale_season(*m), "Summer")),
        );
        out.numbers(
            "YearsSince2006",
            core.yr_sold.iter().map(|y| y - 2006.0).collect(),
        );
        Ok(())
    }

    fn log_features(
        src: &Sources,
        core: &Core,
        area: &AreaTotals,
        out: &mut DerivedColumns,
    ) -> Result<()> {
        let lot_area = src.or("LotArea", 0.0)?;

        out.numbers("LotAreaLog", lot_area.iter().map(|v| log_area(*v)).collect());
        out.numbers(
            "GrLivAreaLog",
            core.gr_liv_area.iter().map(|v| log_area(*v)).collect(),
        );
        out.numbers(
            "TotalSFLog",
            area.total_sf.iter().map(|v| log_area(*v)).collect(),
        );
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Source columns without a default.
struct Core {
    year_built: Vec<f64>,
    yr_sold: Vec<f64>,
    overall_qual: Vec<f64>,
    gr_liv_area: Vec<f64>,
}

/// Area aggregates reused by later feature groups.
struct AreaTotals {
    total_bsmt: Vec<f64>,
    first_floor: Vec<f64>,
    second_floor: Vec<f64>,
    total_sf: Vec<f64>,
    total_bathrooms: Vec<f64>,
    total_porch: Vec<f64>,
    garage_area: Vec<f64>,
}

/// Typed access to the input columns.
struct Sources<'df> {
    df: &'df DataFrame,
    height: usize,
}

impl<'df> Sources<'df> {
    fn new(df: &'df DataFrame) -> Self {
        Self {
            df,
            height: df.height(),
        }
    }

    fn required(&self, column: &str, feature: &str) -> Result<Vec<f64>> {
        let values = numeric_values(self.df, column)?
            .ok_or_else(|| ProcessingError::feature(feature, column))?;
        values
            .into_iter()
            .map(|v| v.ok_or_else(|| ProcessingError::feature(feature, column)))
            .collect()
    }

    fn optional(&self, column: &str) -> Result<Vec<Option<f64>>> {
        Ok(numeric_values(self.df, column)?.unwrap_or_else(|| vec![None; self.height]))
    }

    fn or(&self, column: &str, default: f64) -> Result<Vec<f64>> {
        Ok(self
            .optional(column)?
            .into_iter()
            .map(|v| v.unwrap_or(default))
            .collect())
    }

    fn labels(&self, column: &str) -> Result<Vec<Option<String>>> {
        Ok(string_values(self.df, column)?.unwrap_or_else(|| vec![None; self.height]))
    }

    fn quality(&self, column: &str, default: f64) -> Result<Vec<f64>> {
        Ok(self
            .labels(column)?
            .iter()
            .map(|l| quality_score(l.as_deref()).unwrap_or(default))
            .collect())
    }
}

/// Output columns in insertion order.
#[derive(Default)]
struct DerivedColumns {
    columns: Vec<Series>,
}

impl DerivedColumns {
    fn numbers(&mut self, name: &str, values: Vec<f64>) {
        let values: Vec<f64> = values.into_iter().map(finite_or_zero).collect();
        self.columns.push(Series::new(name.into(), values));
    }

    fn flags(&mut self, name: &str, values: impl IntoIterator<Item = bool>) {
        let values: Vec<i32> = values.into_iter().map(flag).collect();
        self.columns.push(Series::new(name.into(), values));
    }

    fn labels<'s>(&mut self, name: &str, values: impl IntoIterator<Item = &'s str>) {
        let values: Vec<&str> = values.into_iter().collect();
        self.columns.push(Series::new(name.into(), values));
    }
}

fn zip_map(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::has_column;
    use pretty_assertions::assert_eq;

    fn value(df: &DataFrame, column: &str) -> f64 {
        df.column(column)
            .unwrap()
            .cast(&DataType::Float64)
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap()
    }

    fn label(df: &DataFrame, column: &str) -> String {
        df.column(column)
            .unwrap()
            .str()
            .unwrap()
            .get(0)
            .unwrap()
            .to_string()
    }

    fn minimal_record() -> DataFrame {
        df![
            "YearBuilt" => [2003i64],
            "YrSold" => [2008i64],
            "OverallQual" => [7i64],
            "GrLivArea" => [1710.0],
        ]
        .unwrap()
    }

    fn full_record() -> DataFrame {
        df![
            "YearBuilt" => [2003i64],
            "YearRemodAdd" => [2003i64],
            "YrSold" => [2008i64],
            "MoSold" => [2i64],
            "OverallQual" => [7i64],
            "OverallCond" => [5i64],
            "GrLivArea" => [1710.0],
            "TotalBsmtSF" => [856.0],
            "1stFlrSF" => [856.0],
            "2ndFlrSF" => [854.0],
            "FullBath" => [2i64],
            "HalfBath" => [1i64],
            "BsmtFullBath" => [1i64],
            "BsmtHalfBath" => [0i64],
            "GarageArea" => [548.0],
            "GarageCars" => [2i64],
            "GarageYrBlt" => [2003.0],
            "TotRmsAbvGrd" => [8i64],
            "BedroomAbvGr" => [3i64],
            "LotArea" => [8450.0],
            "OpenPorchSF" => [61.0],
            "ExterQual" => ["Gd"],
            "ExterCond" => ["TA"],
            "KitchenQual" => ["Gd"],
            "BsmtQual" => ["Gd"],
            "CentralAir" => ["Y"],
            "Neighborhood" => ["CollgCr"],
        ]
        .unwrap()
    }

    #[test]
    fn test_adds_every_engineered_column() {
        let stats = NeighborhoodStats::default();
        let df = FeatureEngineer::new(&stats)
            .transform(&minimal_record())
            .unwrap();

        for feature in ENGINEERED_FEATURES {
            assert!(has_column(&df, feature), "missing {feature}");
        }
        assert_eq!(df.width(), 4 + ENGINEERED_FEATURES.len());
    }

    #[test]
    fn test_core_formulas() {
        let stats = NeighborhoodStats::default();
        let df = FeatureEngineer::new(&stats).transform(&full_record()).unwrap();

        assert_eq!(value(&df, "HouseAge"), 5.0);
        assert_eq!(value(&df, "YearsSinceRemodel"), 5.0);
        assert_eq!(value(&df, "RecentRemodel"), 1.0);
        assert_eq!(value(&df, "WasRemodeled"), 0.0);
        assert_eq!(value(&df, "GarageAge"), 5.0);
        assert_eq!(label(&df, "AgeCategory"), "Very New");
        assert_eq!(value(&df, "TotalSF"), 2566.0);
        assert_eq!(value(&df, "TotalBathrooms"), 3.5);
        assert_eq!(value(&df, "TotalPorchSF"), 61.0);
        assert_eq!(value(&df, "OverallScore"), 35.0);
        assert_eq!(value(&df, "GarageCapacity"), 2.0 + 548.0 / 200.0);
        assert_eq!(value(&df, "ExterScore"), 12.0);
        assert_eq!(value(&df, "AvgQuality"), (7.0 + 4.0 + 4.0 + 4.0) / 4.0);
        assert_eq!(value(&df, "Qual_SF_Interaction"), 7.0 * 1710.0);
        assert_eq!(value(&df, "Bath_Bedroom_Ratio"), 3.5 / 4.0);
        assert_eq!(value(&df, "HasBasement"), 1.0);
        assert_eq!(value(&df, "Has2ndFloor"), 1.0);
        assert_eq!(value(&df, "HasMultipleFloors"), 1.0);
        assert_eq!(value(&df, "HasPool"), 0.0);
        assert_eq!(value(&df, "HasCentralAir"), 1.0);
        assert_eq!(label(&df, "SaleSeason"), "Winter");
        assert_eq!(value(&df, "IsSummerSale"), 0.0);
        assert_eq!(value(&df, "YearsSince2006"), 2.0);
        assert_eq!(value(&df, "LotAreaLog"), 8450.0f64.ln_1p());
    }

    #[test]
    fn test_documented_defaults() {
        let stats = NeighborhoodStats::default();
        let df = FeatureEngineer::new(&stats)
            .transform(&minimal_record())
            .unwrap();

        // YearRemodAdd defaults to YearBuilt, OverallCond to 5.
        assert_eq!(value(&df, "YearsSinceRemodel"), 5.0);
        assert_eq!(value(&df, "WasRemodeled"), 0.0);
        assert_eq!(value(&df, "OverallScore"), 35.0);
        assert_eq!(value(&df, "GarageAge"), -1.0);
        assert_eq!(value(&df, "KitchenScore"), 3.0);
        assert_eq!(value(&df, "AvgQuality"), (7.0 + 3.0 + 3.0 + 0.0) / 4.0);
        assert_eq!(value(&df, "LotAreaLog"), 0.0);
        assert_eq!(label(&df, "SaleSeason"), "Unknown");
    }

    #[test]
    fn test_zero_denominators_stay_finite() {
        let mut record = minimal_record();
        record
            .with_column(Series::new("GrLivArea".into(), &[0.0]))
            .unwrap();
        record
            .with_column(Series::new("TotRmsAbvGrd".into(), &[0.0]))
            .unwrap();

        let stats = NeighborhoodStats::default();
        let df = FeatureEngineer::new(&stats).transform(&record).unwrap();

        for feature in ["AvgRoomSize", "FinishedBsmtRatio", "GarageRatio", "LivingAreaRatio"] {
            let v = value(&df, feature);
            assert!(v.is_finite(), "{feature} = {v}");
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_missing_required_column_names_feature_and_column() {
        let record = minimal_record().drop("YrSold").unwrap();
        let stats = NeighborhoodStats::default();

        let err = FeatureEngineer::new(&stats).transform(&record).unwrap_err();
        match err {
            ProcessingError::FeatureComputation { feature, column } => {
                assert_eq!(feature, "HouseAge");
                assert_eq!(column, "YrSold");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_neighborhood_features_come_from_frozen_table() {
        let training = df![
            "Neighborhood" => ["CollgCr", "CollgCr", "NAmes"],
            "OverallQual" => [7i64, 8, 5],
            "SalePrice" => [200000.0, 220000.0, 140000.0],
        ]
        .unwrap();
        let stats = NeighborhoodStats::fit(&training, "SalePrice").unwrap();

        let df = FeatureEngineer::new(&stats).transform(&full_record()).unwrap();
        assert_eq!(value(&df, "NeighborhoodMedianPrice"), 210000.0);
        assert_eq!(value(&df, "NeighborhoodSize"), 2.0);
        assert_eq!(value(&df, "NeighborhoodAvgQuality"), 7.5);

        let unknown = minimal_record();
        let df = FeatureEngineer::new(&stats).transform(&unknown).unwrap();
        assert_eq!(value(&df, "NeighborhoodSize"), 3.0);
    }
}
