//! Shared HDF5 dataset helpers.

use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, Group};
use ndarray::{ArrayView1, ArrayView2};
use std::str::FromStr;

pub(crate) fn write_vec<T: H5Type>(group: &Group, name: &str, data: &[T]) -> Result<Dataset> {
    let dataset = group.new_dataset::<T>().shape((data.len(),)).create(name)?;
    if !data.is_empty() {
        dataset.write(ArrayView1::from(data))?;
    }
    Ok(dataset)
}

/// Writes `[col, row]` pairs as an `(n, 2)` dataset.
pub(crate) fn write_pairs(group: &Group, name: &str, data: &[[u16; 2]]) -> Result<Dataset> {
    let dataset = group
        .new_dataset::<u16>()
        .shape((data.len(), 2))
        .create(name)?;
    if !data.is_empty() {
        let flat: Vec<u16> = data.iter().flat_map(|pair| [pair[0], pair[1]]).collect();
        let view = ArrayView2::from_shape((data.len(), 2), flat.as_slice())
            .map_err(|e| Error::InvalidFormat(format!("pair table shape mismatch: {e}")))?;
        dataset.write(view)?;
    }
    Ok(dataset)
}

pub(crate) fn read_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

pub(crate) fn read_vec_opt<T: H5Type>(group: &Group, name: &str) -> Result<Option<Vec<T>>> {
    match group.dataset(name) {
        Ok(dataset) => Ok(Some(dataset.read_raw::<T>()?)),
        Err(_) => Ok(None),
    }
}

pub(crate) fn set_units(dataset: &Dataset, units: &str) -> Result<()> {
    let value = to_var_len_unicode(units)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create("units")?
        .write_scalar(&value)?;
    Ok(())
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}
