//! VULCAN at SNS: banks of interleaved eight-packs whose position and
//! orientation come from the survey of the installed detectors.
//!
//! Every eight-pack owns a block of ids larger than its pixel count, and every
//! bank owns room for twenty blocks, so banks can grow without renumbering.
use std::path::Path;

use crate::error::InstrumentError;
use crate::geometry::{DefaultsOptions, Document, IdfHeader, Rot};
use crate::idlist::bank_idlist;
use crate::rectangle::{add_rectangle_location, Rectangle};
use crate::survey::Survey;
use crate::xml_tree::fixed_attr;

pub const INCH_TO_METRE: f64 = 0.0254;
/// Survey tolerance on side lengths, in metres
pub const SURVEY_TOLERANCE: f64 = 0.035;

/// An installed bank: the survey points of its corners (LL, UL, UR, LR) and its eight-packs
#[derive(Debug, Clone, PartialEq)]
pub struct BankLayout {
    pub name: &'static str,
    pub eightpack_type: &'static str,
    pub num_panels: usize,
    /// Index of the bank id block
    pub block: i64,
    pub corners: [&'static str; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct VulcanSpec {
    pub instrument_name: String,
    pub comment: String,
    pub valid_from: String,
    pub l1: f64,
    pub tube_length: f64,
    pub tube_length_short: f64,
    pub tube_radius: f64,
    pub tube_pixels: usize,
    /// Ids reserved per eight-pack
    pub pixels_per_panel: i64,
    /// Eight-pack slots per bank
    pub panels_per_bank: i64,
    /// Distance between the front and back rows of tubes
    pub separation: f64,
    /// Distance between neighbouring tubes of a row
    pub slip: f64,
    /// Distance between neighbouring eight-pack centers
    pub slip_panel: f64,
    pub monitor_distances: [f64; 2],
    pub monitor_names: [&'static str; 2],
    pub monitor_ids: [i64; 2],
    pub banks: Vec<BankLayout>,
}

impl Default for VulcanSpec {
    fn default() -> Self {
        let slip = 0.434 * INCH_TO_METRE;
        Self {
            instrument_name: String::from("VULCAN"),
            comment: String::from("Created by Peter Peterson"),
            valid_from: String::from("2021-01-01 00:00:01"),
            l1: -43.754,
            tube_length: 1.0,
            tube_length_short: 0.7,
            // given as diameter
            tube_radius: 0.317 * INCH_TO_METRE * 0.5,
            tube_pixels: 512,
            pixels_per_panel: 5000,
            panels_per_bank: 20,
            separation: 0.323 * INCH_TO_METRE,
            slip,
            slip_panel: 3.0 * slip + 0.460 * INCH_TO_METRE,
            monitor_distances: [4.83, 1.50],
            monitor_names: ["monitor2", "monitor3"],
            monitor_ids: [-2, -3],
            banks: vec![
                // right when facing downstream
                BankLayout {
                    name: "bank1",
                    eightpack_type: "eightpack",
                    num_panels: 20,
                    block: 0,
                    corners: ["D1T1B", "D1T1T", "D20T4T", "D20T1B"],
                },
                // left when facing downstream
                BankLayout {
                    name: "bank2",
                    eightpack_type: "eightpack",
                    num_panels: 20,
                    block: 1,
                    corners: ["D20T1B", "D20T4T", "D1T1T", "D1T1B"],
                },
                // high angle, short tubes
                BankLayout {
                    name: "bank5",
                    eightpack_type: "eightpackshort",
                    num_panels: 9,
                    block: 4,
                    corners: ["D1T1B", "D1T1T", "D9T4T", "D9T4B"],
                },
            ],
        }
    }
}

impl VulcanSpec {
    pub fn pixels_per_eightpack(&self) -> i64 {
        8 * self.tube_pixels as i64
    }

    pub fn pixels_per_bank(&self) -> i64 {
        self.pixels_per_panel * self.panels_per_bank
    }

    pub fn filename(&self) -> String {
        format!("{}_Definition.xml", self.instrument_name)
    }

    /// Resolve the rectangle of every bank from a survey
    pub fn bank_rectangles(&self, survey: &Survey) -> Result<Vec<Rectangle>, InstrumentError> {
        let mut rectangles = Vec::with_capacity(self.banks.len());
        for bank in self.banks.iter() {
            rectangles.push(survey.rectangle(bank.name, bank.corners, SURVEY_TOLERANCE)?);
        }
        Ok(rectangles)
    }
}

/// Interleaved eight-pack. Pixel 1 sits at the bottom of the back left tube:
///
/// ```text
/// back     1 3 5 7          back      2 4 6 8
/// front     2 4 6 8         front    1 3 5 7
///                             (upside down)
/// ```
fn add_eightpack(
    doc: &mut Document,
    spec: &VulcanSpec,
    name: &str,
    tube_type: &str,
    upside_down: bool,
) {
    let eightpack = doc.make_assembly_type(name);
    let component = doc.add_component(Some(eightpack), tube_type, None, None);
    // back row then front row, centered on the front plane
    let tube_z = [-spec.separation, spec.separation];
    // offsets center the pack between its fourth and fifth tube
    let x_offset = if upside_down {
        [-1.25 * spec.slip, -1.75 * spec.slip]
    } else {
        [-1.75 * spec.slip, -1.25 * spec.slip]
    };
    let tree = doc.tree_mut();
    for i in 0..4 {
        let x = i as f64 * spec.slip;
        for (j, (z, slip)) in tube_z.iter().zip(x_offset.iter()).enumerate() {
            tree.append(component, "location")
                .attr("name", format!("{name}_{i}_{j}"))
                .attr("x", fixed_attr(x + slip))
                .attr("z", fixed_attr(*z));
        }
    }
}

/// Eight-packs of a bank, laid side by side around the bank center
fn add_bank_position(doc: &mut Document, spec: &VulcanSpec, bank: &BankLayout) {
    let bank_type = doc.make_type_element(bank.name);
    for i in 0..bank.num_panels {
        let position_index = i as f64 - 0.5 * (bank.num_panels as f64 - 1.0);
        let pack_name = format!("pack{:02}", i + 1);
        let panel = doc.add_component(
            Some(bank_type),
            bank.eightpack_type,
            None,
            Some(&pack_name),
        );
        doc.add_location(
            panel,
            [spec.slip_panel * position_index, 0.0, 0.0],
            Rot::about_y(0.0),
            None,
        );
    }
}

/// Assemble the document from one rectangle per bank, in the order of `spec.banks`
pub fn build(
    spec: &VulcanSpec,
    rectangles: &[Rectangle],
    last_modified: Option<&str>,
) -> Result<Document, InstrumentError> {
    if rectangles.len() != spec.banks.len() {
        return Err(InstrumentError::BankCountMismatch {
            expected: spec.banks.len(),
            found: rectangles.len(),
        });
    }
    let header = IdfHeader::new(&spec.instrument_name, &spec.valid_from)
        .with_comment(&spec.comment)
        .with_last_modified(last_modified);
    let mut doc = Document::new(header);
    doc.add_comment("DEFAULTS");
    doc.add_sns_defaults(&DefaultsOptions::default());
    doc.add_comment("SOURCE");
    doc.add_moderator(spec.l1, "moderator");
    doc.add_comment("SAMPLE");
    doc.add_sample_position(None);
    doc.add_monitors(&spec.monitor_distances, &spec.monitor_names, false);

    // empty banks at the surveyed centers to hang the eight-packs from
    for (bank, rect) in spec.banks.iter().zip(rectangles.iter()) {
        let component = doc.add_component(None, bank.name, Some(bank.name), None);
        add_rectangle_location(&mut doc, component, rect);
    }
    for bank in spec.banks.iter() {
        add_bank_position(&mut doc, spec, bank);
    }

    let tubes = [
        ("eightpack", "tube", "onepixel", spec.tube_length, false),
        (
            "eightpackshort",
            "tubeshort",
            "onepixelshort",
            spec.tube_length_short,
            true,
        ),
    ];
    for (pack, tube, pixel, length, upside_down) in tubes {
        add_eightpack(&mut doc, spec, pack, tube, upside_down);
        doc.add_comment(&format!(
            "{} pixels across {}m",
            spec.tube_pixels, length
        ));
        doc.add_pixelated_tube(tube, spec.tube_pixels, length, pixel, false);
        doc.add_cylinder_pixel(
            pixel,
            [0.0; 3],
            [0.0, 1.0, 0.0],
            spec.tube_radius,
            length / spec.tube_pixels as f64,
            "detector",
            "cyl-approx",
        );
    }

    doc.add_comment("DETECTOR IDs - panel is an 8-pack");
    for bank in spec.banks.iter() {
        let ids = bank_idlist(
            bank.num_panels,
            spec.pixels_per_eightpack(),
            spec.pixels_per_panel,
            bank.block * spec.pixels_per_bank(),
        );
        doc.add_detector_ids(bank.name, &ids);
    }

    doc.add_comment(" Shape for Monitors");
    doc.add_dummy_monitor(0.01, 0.03);
    doc.add_monitor_ids(&spec.monitor_ids);

    doc.validate()?;
    Ok(doc)
}

/// Read the survey and assemble the document
pub fn build_from_survey(
    spec: &VulcanSpec,
    survey_path: &Path,
    last_modified: Option<&str>,
) -> Result<Document, InstrumentError> {
    let survey = Survey::read(survey_path)?;
    spdlog::info!(
        "Read survey {} with banks {:?}",
        survey_path.to_string_lossy(),
        survey.bank_names()
    );
    let rectangles = spec.bank_rectangles(&survey)?;
    build(spec, &rectangles, last_modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rectangle::{Vector, DEFAULT_TOLERANCE};

    const STAMP: Option<&str> = Some("2021-02-10 00:00:00.000000");

    /// Upright rectangle facing the sample at `angle` degrees from the beam
    fn rectangle_at(angle: f64, distance: f64, width: f64, height: f64) -> Rectangle {
        let (sin, cos) = angle.to_radians().sin_cos();
        let center = Vector::new(distance * sin, 0.0, distance * cos);
        let along = Vector::new(cos, 0.0, -sin) * (width / 2.0);
        let up = Vector::new(0.0, height / 2.0, 0.0);
        Rectangle::new(
            center - along - up,
            center - along + up,
            center + along + up,
            center + along - up,
            DEFAULT_TOLERANCE,
        )
        .unwrap()
    }

    fn rectangles() -> Vec<Rectangle> {
        vec![
            rectangle_at(-90.0, 2.0, 1.2, 1.0),
            rectangle_at(90.0, 2.0, 1.2, 1.0),
            rectangle_at(150.0, 2.0, 0.6, 0.7),
        ]
    }

    #[test]
    fn test_spec_constants() {
        let spec = VulcanSpec::default();
        assert_eq!(spec.pixels_per_eightpack(), 4096);
        assert_eq!(spec.pixels_per_bank(), 100_000);
        assert!((spec.slip_panel - (3.0 * 0.434 + 0.460) * 0.0254).abs() < 1e-12);
        assert_eq!(spec.filename(), "VULCAN_Definition.xml");
    }

    #[test]
    fn test_build_from_rectangles() {
        let doc = build(&VulcanSpec::default(), &rectangles(), STAMP).unwrap();
        assert_eq!(doc.validate().unwrap(), (20 + 20 + 9) * 4096 + 2);
        let xml = doc.to_xml_string().unwrap();
        assert!(xml.contains(r#"<id start="0" end="4095"/>"#));
        assert!(xml.contains(r#"<id start="5000" end="9095"/>"#));
        assert!(xml.contains(r#"<id start="100000" end="104095"/>"#));
        assert!(xml.contains(r#"<id start="440000" end="444095"/>"#));
        assert!(xml.contains(r#"name="pack20""#));
        assert!(xml.contains(r#"<location z="4.83" name="monitor2"/>"#));
    }

    #[test]
    fn test_eightpack_interleaving() {
        let spec = VulcanSpec::default();
        let doc = build(&spec, &rectangles(), STAMP).unwrap();
        let tree = doc.tree();
        let offsets = |pack: &str| -> Vec<(f64, f64)> {
            let pack_type = tree
                .child_elements(tree.root(), "type")
                .find(|t| tree.attribute(*t, "name") == Some(pack))
                .unwrap();
            let component = tree.find_child(pack_type, "component").unwrap();
            tree.child_elements(component, "location")
                .map(|loc| {
                    let x = tree.attribute(loc, "x").unwrap().parse().unwrap();
                    let z = tree.attribute(loc, "z").unwrap().parse().unwrap();
                    (x, z)
                })
                .collect()
        };
        let normal = offsets("eightpack");
        assert_eq!(normal.len(), 8);
        // first tube in the back row, second in the front, shifted right by half a slip
        assert!(normal[0].1 < 0.0 && normal[1].1 > 0.0);
        assert!((normal[1].0 - normal[0].0 - 0.5 * spec.slip).abs() < 1e-4);
        let short = offsets("eightpackshort");
        assert!((short[0].0 - short[1].0 - 0.5 * spec.slip).abs() < 1e-4);
    }

    #[test]
    fn test_bank_rotation_from_rectangle() {
        let doc = build(&VulcanSpec::default(), &rectangles(), STAMP).unwrap();
        let tree = doc.tree();
        let bank2 = tree
            .child_elements(tree.root(), "component")
            .find(|c| tree.attribute(*c, "type") == Some("bank2"))
            .unwrap();
        let location = tree.find_child(bank2, "location").unwrap();
        let x: f64 = tree.attribute(location, "x").unwrap().parse().unwrap();
        assert!((x - 2.0).abs() < 1e-9);
        // three nested rotations, their sum is the bank angle about Y
        let mut total = 0.0;
        let mut node = location;
        for _ in 0..3 {
            node = tree.find_child(node, "rot").unwrap();
            let angle: f64 = tree.attribute(node, "val").unwrap().parse().unwrap();
            if tree.attribute(node, "axis-y") == Some("1") {
                total += angle;
            } else {
                assert!(angle.abs() < 1e-9);
            }
        }
        assert!((total - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_every_bank_needs_a_rectangle() {
        let mut two = rectangles();
        two.pop();
        match build(&VulcanSpec::default(), &two, STAMP) {
            Err(InstrumentError::BankCountMismatch { expected, found }) => {
                assert_eq!((expected, found), (3, 2));
            }
            other => panic!("expected BankCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_survey_point() {
        let spec = VulcanSpec::default();
        let survey = Survey::parse("Point,X,Y,Z\nBR_D1T1B,0,0,0\n").unwrap();
        assert!(spec.bank_rectangles(&survey).is_err());
    }
}
