/// Decoder for NWM `channel_rt` NetCDF files.
///
/// Relevant layout of the file (one dimension, `feature_id`, ~2.7M reaches
/// for CONUS):
///   feature_id(feature_id)  int    NHDPlus COMID of the reach
///   velocity(feature_id)    int    packed, scale_factor 0.01, units m s-1
///   streamflow(feature_id)  int    packed, scale_factor 0.01, units m3 s-1
///
/// Both value variables carry `_FillValue` (-999900) for reaches with no
/// result. The fill check runs on the packed value, before scaling.
///
/// Reading NetCDF needs the system libnetcdf. The real reader sits behind
/// the default `netcdf` feature so `--no-default-features` builds without
/// it. The unpacking logic below is plain
/// Rust and always available.

use crate::model::{ChannelData, Measurement, SourceError, Variable};

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Turns the raw bytes of one archive file into measurements.
pub trait ChannelDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ChannelData, SourceError>;
}

/// CF packing attributes of one variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packing {
    pub fill_value: Option<f64>,
    pub scale_factor: f64,
    pub add_offset: f64,
}

impl Default for Packing {
    fn default() -> Self {
        Self {
            fill_value: None,
            scale_factor: 1.0,
            add_offset: 0.0,
        }
    }
}

/// Applies fill detection and `value * scale_factor + add_offset`.
pub fn unpack_values(raw: &[f64], packing: &Packing) -> Vec<Option<f64>> {
    raw.iter()
        .map(|&v| {
            if packing.fill_value == Some(v) || v.is_nan() {
                None
            } else {
                Some(v * packing.scale_factor + packing.add_offset)
            }
        })
        .collect()
}

/// Zips the `feature_id` column with one value column.
///
/// # Errors
/// - `SourceError::Decode`: the columns have different lengths.
pub fn measurements_from_columns(
    ids: &[i64],
    values: &[Option<f64>],
    variable: Variable,
) -> Result<Vec<Measurement>, SourceError> {
    if ids.len() != values.len() {
        return Err(SourceError::Decode(format!(
            "feature_id has {} entries but {} has {}",
            ids.len(),
            variable,
            values.len()
        )));
    }

    Ok(ids
        .iter()
        .zip(values)
        .map(|(&id, &value)| Measurement {
            reach_id: id.into(),
            variable,
            value,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// NetCDF reader
// ---------------------------------------------------------------------------

/// Decoder backed by libnetcdf.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfDecoder;

#[cfg(feature = "netcdf")]
impl ChannelDecoder for NetcdfDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ChannelData, SourceError> {
        reader::read(bytes)
    }
}

#[cfg(not(feature = "netcdf"))]
impl ChannelDecoder for NetcdfDecoder {
    fn decode(&self, _bytes: &[u8]) -> Result<ChannelData, SourceError> {
        Err(SourceError::Decode(
            "built without NetCDF support; rebuild with `--features netcdf`".to_string(),
        ))
    }
}

#[cfg(feature = "netcdf")]
mod reader {
    use std::io::Write;

    use netcdf::AttributeValue;

    use super::{measurements_from_columns, unpack_values, Packing};
    use crate::model::{ChannelData, Measurement, SourceError, Variable};

    pub(super) fn read(bytes: &[u8]) -> Result<ChannelData, SourceError> {
        // libnetcdf wants a path; spill to a scratch file that is removed on drop
        let mut scratch = tempfile::NamedTempFile::new()?;
        scratch.write_all(bytes)?;
        scratch.flush()?;

        let file = netcdf::open(scratch.path()).map_err(nc_err)?;

        let ids: Vec<i64> = file
            .variable("feature_id")
            .ok_or_else(|| SourceError::Decode("missing variable feature_id".to_string()))?
            .get_values::<i64, _>(..)
            .map_err(nc_err)?;

        Ok(ChannelData {
            velocity: read_variable(&file, &ids, Variable::Velocity)?,
            streamflow: read_variable(&file, &ids, Variable::Streamflow)?,
        })
    }

    fn read_variable(
        file: &netcdf::File,
        ids: &[i64],
        variable: Variable,
    ) -> Result<Vec<Measurement>, SourceError> {
        let var = file
            .variable(variable.netcdf_name())
            .ok_or_else(|| SourceError::Decode(format!("missing variable {}", variable)))?;

        let raw: Vec<f64> = var.get_values::<f64, _>(..).map_err(nc_err)?;

        let fill_value = match attr_f64(&var, "_FillValue")? {
            Some(v) => Some(v),
            None => attr_f64(&var, "missing_value")?,
        };
        let packing = Packing {
            fill_value,
            scale_factor: attr_f64(&var, "scale_factor")?.unwrap_or(1.0),
            add_offset: attr_f64(&var, "add_offset")?.unwrap_or(0.0),
        };

        measurements_from_columns(ids, &unpack_values(&raw, &packing), variable)
    }

    fn attr_f64(var: &netcdf::Variable<'_>, name: &str) -> Result<Option<f64>, SourceError> {
        let Some(attr) = var.attribute(name) else {
            return Ok(None);
        };

        let value = match attr.value().map_err(nc_err)? {
            AttributeValue::Double(v) => v,
            AttributeValue::Float(v) => f64::from(v),
            AttributeValue::Int(v) => f64::from(v),
            AttributeValue::Short(v) => f64::from(v),
            AttributeValue::Longlong(v) => v as f64,
            AttributeValue::Doubles(v) => match v.first() {
                Some(first) => *first,
                None => return Ok(None),
            },
            AttributeValue::Floats(v) => match v.first() {
                Some(first) => f64::from(*first),
                None => return Ok(None),
            },
            AttributeValue::Ints(v) => match v.first() {
                Some(first) => f64::from(*first),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };

        Ok(Some(value))
    }

    fn nc_err(e: netcdf::Error) -> SourceError {
        SourceError::Decode(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
