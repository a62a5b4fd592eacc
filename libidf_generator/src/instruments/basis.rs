//! BASIS at SNS: an indirect geometry backscattering spectrometer.
//!
//! Four inelastic banks sit above and below the scattering plane on the walls
//! of a cylindrical tank. Their physical positions are idealized so pixels
//! draw as a regular grid, while the neutronic positions and the final energy
//! of each pixel come from the calibration stored in an event NeXus file.
//! Nine single-tube diffraction banks sit in the scattering plane.
use std::f64::consts::PI;
use std::path::Path;

use crate::error::InstrumentError;
use crate::geometry::{DefaultsOptions, DetectorPixel, Document, IdfHeader, Rot};
use crate::idlist::{IdEntry, IdList};
use crate::nexus::{read_bank_calibrations, BankCalibration};

const INCH_TO_METRE: f64 = 0.0254;
/// E = h^2 / (2 m lambda^2) in meV with lambda in Angstrom
const ENERGY_WAVELENGTH_FACTOR: f64 = 81.8042051;

pub const N_INELASTIC_BANKS: usize = 4;
pub const INELASTIC_TUBES_PER_BANK: usize = 64;
/// Tubes of each bank that are read out but not installed
pub const INELASTIC_TUBES_NGHOST: usize = 8;
pub const INELASTIC_TUBE_NPIXEL: usize = 64;
const INELASTIC_TUBE_DISTANCE_TO_SAMPLE: f64 = 2.44365;
const INELASTIC_TUBE_Y0: f64 = 1.0 * INCH_TO_METRE;
const INELASTIC_TUBE_LENGTH: f64 = INELASTIC_TUBE_DISTANCE_TO_SAMPLE;
const INELASTIC_BANK_THETA_START: f64 = 11.5018 * PI / 180.0;
const INELASTIC_BANK_THETA_END: f64 = 161.199 * PI / 180.0;
const INELASTIC_PIXEL_RADIUS_GAP_RATIO: f64 = 0.1;
const INELASTIC_PIXEL_HEIGHT_GAP_RATIO: f64 = 0.1;

const ELASTIC_BANK_START: usize = 5;
const ELASTIC_DETECTORID_START: i64 = 16384;
const ELASTIC_TUBE_NPIXELS: usize = 128;
const ELASTIC_TUBE_LENGTH: f64 = 25.24 * INCH_TO_METRE;
const ELASTIC_TUBE_WIDTH: f64 = 0.5 * INCH_TO_METRE;
const ELASTIC_X: [f64; 9] = [
    1.1649855, 1.7484015, 2.175541, 2.408594, 2.422933, 2.216378, 1.8142005, 1.247867, 0.5687435,
];
const ELASTIC_Y: [f64; 9] = [
    -0.001807, -0.001801, -0.0011845, -0.0006885, -0.0013145, -0.001626, -0.001397, 0.0003465,
    -0.0001125,
];
const ELASTIC_Z: [f64; 9] = [
    -2.1474825, -1.704594, -1.108373, -0.4135165, 0.3181, 1.0218315, 1.6330115, 2.0993535, 2.376999,
];

/// Analyser reflection; selects calibration run, wavelength and whether Efixed is written
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub key: &'static str,
    pub wavelength: f64,
    /// Ratio of the analyser wavelength to that of the irreducible reflection
    pub ratio_to_irreducible_hkl: f64,
    pub efixed: bool,
    /// True when the calibration comes from a run with the 311 analysers
    pub uses_311_run: bool,
}

impl Reflection {
    pub fn all() -> [Reflection; 4] {
        [
            Self {
                key: "generic",
                wavelength: 6.2712,
                ratio_to_irreducible_hkl: 1.0,
                efixed: false,
                uses_311_run: false,
            },
            Self {
                key: "111",
                wavelength: 6.2712,
                ratio_to_irreducible_hkl: 1.0,
                efixed: true,
                uses_311_run: false,
            },
            Self {
                key: "333",
                wavelength: 6.2712 / 3.0,
                ratio_to_irreducible_hkl: 1.0 / 3.0,
                efixed: true,
                uses_311_run: false,
            },
            Self {
                key: "311",
                wavelength: 3.2750,
                ratio_to_irreducible_hkl: 1.0,
                efixed: true,
                uses_311_run: true,
            },
        ]
    }

    /// Final energy in meV for an analyser wavelength of the irreducible reflection
    pub fn energy(&self, wavelength: f64) -> f64 {
        let wavelength = wavelength * self.ratio_to_irreducible_hkl;
        ENERGY_WAVELENGTH_FACTOR / (wavelength * wavelength)
    }

    pub fn filename(&self) -> String {
        format!("BASIS_Definition_Si{}.xml", self.key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasisSpec {
    pub instrument_name: String,
    pub comment: String,
    pub valid_from: String,
    pub moderator_distance: f64,
    pub monitor_distance: f64,
    pub monitor_id: i64,
}

impl Default for BasisSpec {
    fn default() -> Self {
        Self {
            instrument_name: String::from("BASIS"),
            comment: String::from("Created by Michael Reuter and Jose Borreguero"),
            valid_from: String::from("2014-01-01 00:00:00"),
            moderator_distance: 84.0,
            monitor_distance: -0.23368,
            monitor_id: -1,
        }
    }
}

/// Idealized physical position of every pixel of inelastic bank `bank` (zero based), `[tube][pixel]`
pub fn inelastic_pixel_positions(bank: usize) -> Vec<Vec<[f64; 3]>> {
    let y_offset = match bank {
        0 | 2 => INELASTIC_TUBE_Y0,
        _ => -INELASTIC_TUBE_Y0 - INELASTIC_TUBE_LENGTH,
    };
    let theta_offset = match bank {
        0 | 1 => INELASTIC_BANK_THETA_START,
        _ => PI + INELASTIC_BANK_THETA_START,
    };
    let ntubes = INELASTIC_TUBES_PER_BANK - INELASTIC_TUBES_NGHOST;
    let delta_theta = (INELASTIC_BANK_THETA_END - INELASTIC_BANK_THETA_START) / ntubes as f64;
    let pixel_length = INELASTIC_TUBE_LENGTH / INELASTIC_TUBE_NPIXEL as f64;
    (0..ntubes)
        .map(|itube| {
            let (sin, cos) = (theta_offset + itube as f64 * delta_theta).sin_cos();
            let x = INELASTIC_TUBE_DISTANCE_TO_SAMPLE * sin;
            let z = INELASTIC_TUBE_DISTANCE_TO_SAMPLE * cos;
            (0..INELASTIC_TUBE_NPIXEL)
                .map(|ipixel| [x, y_offset + ipixel as f64 * pixel_length, z])
                .collect()
        })
        .collect()
}

/// Pixels of one inelastic bank; pixels without a calibrated distance are left out
pub fn inelastic_bank_pixels(
    bank: usize,
    calibration: &BankCalibration,
    reflection: &Reflection,
) -> Vec<DetectorPixel> {
    let positions = inelastic_pixel_positions(bank);
    let mut pixels = Vec::new();
    for (itube, tube) in positions.iter().enumerate() {
        for (ipixel, xyz) in tube.iter().enumerate() {
            let index = [itube, ipixel];
            let (Some(distance), Some(id), Some(polar), Some(azimuthal), Some(wavelength)) = (
                calibration.distance.get(index),
                calibration.pixel_id.get(index),
                calibration.polar_angle.get(index),
                calibration.azimuthal_angle.get(index),
                calibration.wavelength.get(index),
            ) else {
                continue;
            };
            if distance.is_nan() {
                continue;
            }
            let efixed = reflection
                .efixed
                .then(|| reflection.energy(*wavelength));
            pixels.push(DetectorPixel {
                id: *id,
                x: xyz[0],
                y: xyz[1],
                z: xyz[2],
                neutronic: Some((
                    *distance,
                    polar.to_degrees(),
                    azimuthal.to_degrees(),
                )),
                efixed,
            });
        }
    }
    pixels
}

/// Assemble the document of one reflection from the calibration of the inelastic banks
pub fn build(
    spec: &BasisSpec,
    reflection: &Reflection,
    calibrations: &[BankCalibration],
    last_modified: Option<&str>,
) -> Result<Document, InstrumentError> {
    let header = IdfHeader::new(&spec.instrument_name, &spec.valid_from)
        .with_comment(&spec.comment)
        .with_last_modified(last_modified);
    let mut doc = Document::new(header);
    doc.add_sns_defaults(&DefaultsOptions {
        indirect: true,
        ..Default::default()
    });
    doc.add_comment("SOURCE AND SAMPLE POSITION");
    doc.add_moderator(spec.moderator_distance, "moderator");
    doc.add_sample_position(None);
    doc.add_monitors(&[spec.monitor_distance], &["monitor1"], true);

    doc.add_comment("INELASTIC DECTECTORS");
    doc.add_located_component(None, "silicon", None);
    let silicon = doc.make_type_element("silicon");
    for (i, calibration) in calibrations.iter().enumerate() {
        calibration.check_shapes()?;
        let bank_name = format!("bank{}", i + 1);
        doc.add_located_component(Some(silicon), &bank_name, Some(bank_name.as_str()));
        let pixels = inelastic_bank_pixels(i, calibration, reflection);
        doc.add_detector_pixels(&bank_name, &pixels);
        doc.add_detector_pixels_idlist(&bank_name, &pixels);
    }

    doc.add_located_component(None, "elastic", Some("elastic"));
    let elastic = doc.make_type_element("elastic");
    let mut idlist = IdList::default();
    for (k, ((x, y), z)) in ELASTIC_X
        .iter()
        .zip(ELASTIC_Y.iter())
        .zip(ELASTIC_Z.iter())
        .enumerate()
    {
        let bank_name = format!("bank{}", ELASTIC_BANK_START + k);
        doc.add_located_component(Some(elastic), &bank_name, None);
        let rot = Rot {
            x: Some(0.0),
            y: Some(0.0),
            z: Some(90.0),
        };
        doc.add_detector([*x, *y, *z], rot, &bank_name, "tube-elastic", true);
        let start = ELASTIC_DETECTORID_START + (ELASTIC_TUBE_NPIXELS * k) as i64;
        idlist.push(IdEntry::range(
            start,
            start + ELASTIC_TUBE_NPIXELS as i64 - 1,
        ));
    }

    doc.add_comment("ELASTIC TUBE (90 degrees)");
    doc.add_pixelated_tube(
        "tube-elastic",
        ELASTIC_TUBE_NPIXELS,
        ELASTIC_TUBE_LENGTH,
        "pixel-elastic-tube",
        true,
    );
    doc.add_detector_ids("elastic", &idlist);

    doc.add_comment("PIXEL FOR DIFFRACTION TUBES");
    doc.add_cylinder_pixel(
        "pixel-elastic-tube",
        [0.0; 3],
        [0.0, 1.0, 0.0],
        ELASTIC_TUBE_WIDTH / 2.0,
        ELASTIC_TUBE_LENGTH / ELASTIC_TUBE_NPIXELS as f64,
        "detector",
        "cyl-approx",
    );

    doc.add_comment("PIXEL FOR INELASTIC TUBES");
    let ntubes = (INELASTIC_TUBES_PER_BANK - INELASTIC_TUBES_NGHOST) as f64;
    let tube_width = INELASTIC_TUBE_DISTANCE_TO_SAMPLE
        * (INELASTIC_BANK_THETA_END - INELASTIC_BANK_THETA_START)
        / ntubes;
    doc.add_cylinder_pixel(
        "pixel",
        [0.0; 3],
        [0.0, 1.0, 0.0],
        tube_width * (1.0 - INELASTIC_PIXEL_RADIUS_GAP_RATIO) / 2.0,
        INELASTIC_TUBE_LENGTH * (1.0 - INELASTIC_PIXEL_HEIGHT_GAP_RATIO)
            / INELASTIC_TUBE_NPIXEL as f64,
        "detector",
        "cyl-approx",
    );

    doc.add_comment("MONITOR SHAPE");
    doc.add_dummy_monitor(0.01, 0.03);
    doc.add_monitor_ids(&[spec.monitor_id]);

    doc.validate()?;
    Ok(doc)
}

/// Read the calibration for a reflection from the given NeXus file and assemble its document
pub fn build_from_nexus(
    spec: &BasisSpec,
    reflection: &Reflection,
    nexus_path: &Path,
    last_modified: Option<&str>,
) -> Result<Document, InstrumentError> {
    let calibrations =
        read_bank_calibrations(nexus_path, N_INELASTIC_BANKS, INELASTIC_TUBES_NGHOST)?;
    spdlog::info!(
        "Read calibration of {} banks for reflection Si{} ({} A)",
        calibrations.len(),
        reflection.key,
        reflection.wavelength
    );
    build(spec, reflection, &calibrations, last_modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NexusError;
    use ndarray::Array2;

    const STAMP: Option<&str> = Some("2014-01-01 00:00:00.000000");

    /// Calibration with ghosts already removed; pixel ids follow the real bank layout
    fn calibration(bank: usize) -> BankCalibration {
        let shape = (
            INELASTIC_TUBES_PER_BANK - INELASTIC_TUBES_NGHOST,
            INELASTIC_TUBE_NPIXEL,
        );
        let first_id = (bank * INELASTIC_TUBES_PER_BANK * INELASTIC_TUBE_NPIXEL) as i64;
        let mut distance = Array2::from_elem(shape, 2.44);
        // one dead pixel in the first bank
        if bank == 0 {
            distance[[3, 10]] = f64::NAN;
        }
        BankCalibration {
            pixel_id: Array2::from_shape_fn(shape, |(t, p)| {
                first_id + (t * INELASTIC_TUBE_NPIXEL + p) as i64
            }),
            distance,
            polar_angle: Array2::from_elem(shape, PI / 2.0),
            azimuthal_angle: Array2::zeros(shape),
            wavelength: Array2::from_elem(shape, 6.2712),
        }
    }

    fn calibrations() -> Vec<BankCalibration> {
        (0..N_INELASTIC_BANKS).map(calibration).collect()
    }

    #[test]
    fn test_reflection_energies() {
        let [generic, si111, si333, si311] = Reflection::all();
        assert_eq!(generic.filename(), "BASIS_Definition_Sigeneric.xml");
        let e111 = si111.energy(6.2712);
        assert!((e111 - 2.0801).abs() < 1e-3);
        assert!((si333.energy(6.2712) - 9.0 * e111).abs() < 1e-9);
        assert!((si311.energy(3.2750) - 7.627).abs() < 1e-3);
    }

    #[test]
    fn test_inelastic_positions() {
        let positions = inelastic_pixel_positions(1);
        assert_eq!(positions.len(), 56);
        assert_eq!(positions[0].len(), 64);
        let [x, y, z] = positions[0][0];
        assert!((x.hypot(z) - INELASTIC_TUBE_DISTANCE_TO_SAMPLE).abs() < 1e-12);
        assert!((y + INELASTIC_TUBE_Y0 + INELASTIC_TUBE_LENGTH).abs() < 1e-12);
        let [x, _, _] = inelastic_pixel_positions(2)[0][0];
        assert!(x < 0.0);
    }

    #[test]
    fn test_dead_pixels_skipped() {
        let reflections = Reflection::all();
        let pixels = inelastic_bank_pixels(0, &calibration(0), &reflections[1]);
        assert_eq!(pixels.len(), 56 * 64 - 1);
        assert!(pixels.iter().all(|p| p.efixed.is_some()));
        assert!(!pixels.iter().any(|p| p.id == 3 * 64 + 10));
        let (_, theta, _) = pixels[0].neutronic.unwrap();
        assert!((theta - 90.0).abs() < 1e-12);

        let generic = inelastic_bank_pixels(1, &calibration(1), &reflections[0]);
        assert!(generic.iter().all(|p| p.efixed.is_none()));
    }

    #[test]
    fn test_build_validates() {
        let reflections = Reflection::all();
        let doc = build(&BasisSpec::default(), &reflections[1], &calibrations(), STAMP).unwrap();
        let inelastic = 4 * 56 * 64 - 1;
        assert_eq!(doc.validate().unwrap(), inelastic + 9 * 128 + 1);
        let xml = doc.to_xml_string().unwrap();
        assert!(xml.contains("<indirect-neutronic-positions/>"));
        assert!(xml.contains(r#"<parameter name="Efixed">"#));
        assert!(xml.contains(r#"<id start="16384" end="16511"/>"#));
        assert!(xml.contains(r#"<id start="17408" end="17535"/>"#));
        assert!(xml.contains(r#"<facing x="0.0" y="0.0" z="0.0"/>"#));
        // the dead pixel splits the first bank into two ranges
        assert!(xml.contains(r#"<id start="0" end="201"/>"#));
        assert!(xml.contains(r#"<id start="203" end="3583"/>"#));
    }

    #[test]
    fn test_mismatched_calibration_shapes() {
        let reflections = Reflection::all();
        let mut banks = calibrations();
        banks[2].wavelength = Array2::from_elem((10, INELASTIC_TUBE_NPIXEL), 6.2712);
        let result = build(&BasisSpec::default(), &reflections[1], &banks, STAMP);
        assert!(matches!(
            result,
            Err(InstrumentError::NexusError(NexusError::BadShape { .. }))
        ));
        // the pixel list alone never indexes past a short table
        let pixels = inelastic_bank_pixels(2, &banks[2], &reflections[1]);
        assert_eq!(pixels.len(), 10 * 64);
    }

    #[test]
    fn test_generic_has_no_efixed() {
        let reflections = Reflection::all();
        let doc = build(&BasisSpec::default(), &reflections[0], &calibrations(), STAMP).unwrap();
        let xml = doc.to_xml_string().unwrap();
        assert!(!xml.contains("Efixed"));
    }
}
