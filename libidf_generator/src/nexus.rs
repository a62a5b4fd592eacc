use hdf5::File;
use ndarray::{s, Array2};
use std::path::Path;

use super::error::NexusError;

/// Per-pixel calibration of one inelastic bank, indexed `[tube, pixel]`
#[derive(Debug, Clone)]
pub struct BankCalibration {
    pub pixel_id: Array2<i64>,
    /// Neutronic distance to the sample; NaN marks a pixel that is not read out
    pub distance: Array2<f64>,
    /// Angle from the Z axis towards the X axis, in radians
    pub polar_angle: Array2<f64>,
    /// Angle in the XY plane, in radians
    pub azimuthal_angle: Array2<f64>,
    /// Wavelength selected by the analyser crystal seen by each pixel
    pub wavelength: Array2<f64>,
}

impl BankCalibration {
    pub fn shape(&self) -> (usize, usize) {
        self.pixel_id.dim()
    }

    /// Every table must have the shape of `pixel_id`
    pub fn check_shapes(&self) -> Result<(), NexusError> {
        let expected = self.pixel_id.shape().to_vec();
        let others = [
            ("distance", self.distance.shape()),
            ("polar_angle", self.polar_angle.shape()),
            ("azimuthal_angle", self.azimuthal_angle.shape()),
            ("wavelength", self.wavelength.shape()),
        ];
        for (name, shape) in others {
            if shape != expected.as_slice() {
                return Err(NexusError::BadShape {
                    name: name.to_string(),
                    found: shape.to_vec(),
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Remove the trailing `ghosts` tubes, which are not installed
    pub fn without_ghost_tubes(self, bank: usize, ghosts: usize) -> Result<Self, NexusError> {
        let (tubes, _) = self.shape();
        if tubes <= ghosts {
            return Err(NexusError::TooFewTubes { bank, tubes, ghosts });
        }
        let keep = tubes - ghosts;
        Ok(Self {
            pixel_id: self.pixel_id.slice(s![..keep, ..]).to_owned(),
            distance: self.distance.slice(s![..keep, ..]).to_owned(),
            polar_angle: self.polar_angle.slice(s![..keep, ..]).to_owned(),
            azimuthal_angle: self.azimuthal_angle.slice(s![..keep, ..]).to_owned(),
            wavelength: self.wavelength.slice(s![..keep, ..]).to_owned(),
        })
    }
}

/// Read the calibration of banks `1..=n_banks` from an event NeXus file
pub fn read_bank_calibrations(
    path: &Path,
    n_banks: usize,
    ghosts: usize,
) -> Result<Vec<BankCalibration>, NexusError> {
    if !path.exists() {
        return Err(NexusError::BadFilePath(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let mut banks = Vec::with_capacity(n_banks);
    for bank in 1..=n_banks {
        let instrument = file.group("entry/instrument")?;
        let bank_group = instrument.group(&format!("bank{bank}"))?;
        let analyser = instrument.group(&format!("analyzer{bank}"))?;
        let calibration = BankCalibration {
            pixel_id: bank_group.dataset("pixel_id")?.read_2d::<i64>()?,
            distance: bank_group.dataset("distance")?.read_2d::<f64>()?,
            polar_angle: bank_group.dataset("polar_angle")?.read_2d::<f64>()?,
            azimuthal_angle: bank_group.dataset("azimuthal_angle")?.read_2d::<f64>()?,
            wavelength: analyser.dataset("wavelength")?.read_2d::<f64>()?,
        };
        calibration.check_shapes()?;
        spdlog::debug!(
            "Read calibration of bank{} from {} with shape {:?}",
            bank,
            path.to_string_lossy(),
            calibration.shape()
        );
        banks.push(calibration.without_ghost_tubes(bank, ghosts)?);
    }
    Ok(banks)
}
