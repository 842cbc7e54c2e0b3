use crate::decoder::DecodedSamples;
use crate::mso::Mso19;
use crate::transport::Transport;
use crate::trigger_config::ProbeType;
use polars::prelude::*;

pub const TIME_COLUMN_NAME: &str = "time";
pub const ANALOG_RAW_COLUMN_NAME: &str = "analog_raw";
pub const ANALOG_MV_COLUMN_NAME: &str = "analog_mv";
pub const LOGIC_COLUMN_NAME: &str = "logic";

/// ADC code of 0 V at the input.
const ADC_ZERO: f64 = 512.0;

/// One decoded block together with what is needed to put it on a time and
/// voltage axis.
#[derive(Debug, Clone)]
pub struct CapturedBlock {
    pub samples: DecodedSamples,
    /// Sample rate in Hz.
    pub rate: u64,
    /// Millivolts per ADC step.
    pub vbit: f64,
    pub probe: ProbeType,
}

impl CapturedBlock {
    /// Lazy frame with `time` (seconds), `analog_raw`, `analog_mv` and
    /// `logic` columns.
    pub fn to_lazy(&self) -> Result<LazyFrame, PolarsError> {
        let raw: Vec<u32> = self.samples.analog.iter().map(|&a| u32::from(a)).collect();
        let logic: Vec<u32> = self.samples.logic.iter().map(|&l| u32::from(l)).collect();

        let df = DataFrame::new(vec![
            Series::new(ANALOG_RAW_COLUMN_NAME.into(), raw).into(),
            Series::new(LOGIC_COLUMN_NAME.into(), logic).into(),
        ])?
        .lazy()
        .with_row_index("row_index", Some(0))
        .with_columns([
            (col("row_index").cast(DataType::Float64) * lit(1.0 / self.rate.max(1) as f64))
                .alias(TIME_COLUMN_NAME),
            self.raw_to_millivolts(col(ANALOG_RAW_COLUMN_NAME))
                .alias(ANALOG_MV_COLUMN_NAME),
        ])
        .select([
            col(TIME_COLUMN_NAME),
            col(ANALOG_RAW_COLUMN_NAME),
            col(ANALOG_MV_COLUMN_NAME),
            col(LOGIC_COLUMN_NAME),
        ]);

        Ok(df)
    }

    /// Collected frame with one extra boolean column per logic input.
    pub fn to_dataframe(&self) -> Result<DataFrame, PolarsError> {
        let mut df = self.to_lazy()?.collect()?;
        Self::extract_bits(&mut df)?;
        Ok(df)
    }

    /// Millivolts at the probe tip for a column of raw ADC codes.
    pub fn raw_to_millivolts(&self, raw_value: Expr) -> Expr {
        let scale = self.vbit * f64::from(self.probe.to_multiplier());
        (lit(ADC_ZERO) - raw_value.cast(DataType::Float64)) * lit(scale)
    }

    /// Add `bit_0` .. `bit_7` columns split out of the `logic` column.
    pub fn extract_bits(df: &mut DataFrame) -> Result<&mut DataFrame, PolarsError> {
        let logic: Vec<u32> = df
            .column(LOGIC_COLUMN_NAME)?
            .u32()?
            .into_iter()
            .map(|v| v.unwrap_or(0))
            .collect();

        for bit in 0..8 {
            let values: Vec<bool> = logic.iter().map(|l| (l >> bit) & 1 == 1).collect();
            let column: Column = Series::new(format!("bit_{}", bit).into(), values).into();
            df.with_column(column)?;
        }

        Ok(df)
    }
}

impl<T: Transport> Mso19<T> {
    /// Attach the current rate, calibration and probe to a decoded block.
    pub fn captured_block(&self, samples: DecodedSamples) -> CapturedBlock {
        CapturedBlock {
            samples,
            rate: self.ctx.cur_rate,
            vbit: self.ctx.calibration.vbit,
            probe: self.ctx.trigger.probe,
        }
    }
}
