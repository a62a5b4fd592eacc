//! BIOSANS at HFIR: a flat main detector and a curved wing detector, both
//! made of double panels of eight-packs.
//!
//! Pixel ids start at tube 1 of bank 1 of the main detector and end at the
//! last tube of the last wing bank. Within each array the front panel is
//! enumerated before the back panel.
use crate::error::InstrumentError;
use crate::filename::make_filename;
use crate::geometry::{DefaultsOptions, Document, IdfHeader, Rot};
use crate::idlist::{IdEntry, IdList};
use crate::panels::{
    add_basic_types, add_double_curved_panel_component, add_double_curved_panel_type,
    add_double_flat_panel_component, add_double_flat_panel_type, CurvedPanelSpec, FlatPanelSpec,
    TubeSpec,
};

pub const FLAT_IDLIST: &str = "flat_panel_ids";
pub const CURVED_IDLIST: &str = "curved_panel_ids";

#[derive(Debug, Clone, PartialEq)]
pub struct BiosansSpec {
    pub instrument_name: String,
    pub comment: String,
    pub valid_from: String,
    pub valid_to: String,
    pub source_sample_distance: f64,
    pub tube: TubeSpec,
    pub flat: FlatPanelSpec,
    pub wing: CurvedPanelSpec,
}

impl Default for BiosansSpec {
    fn default() -> Self {
        Self {
            instrument_name: String::from("BIOSANS"),
            comment: String::from("Created by Jose Borreguero, borreguerojm@ornl.gov"),
            valid_from: String::from("2019-01-01 00:00:00"),
            valid_to: String::from("2100-12-31 23:59:59"),
            source_sample_distance: 1.0,
            tube: TubeSpec {
                tube_length: 1.046,
                tube_diameter: 0.00805,
                pixels_per_tube: 256,
                tube_separation: 0.0110,
                fourpack_separation: 0.0082,
                fourpack_slip: 0.0055,
            },
            flat: FlatPanelSpec {
                array_name: String::from("detector1"),
                front_type: String::from("front-panel"),
                back_type: String::from("back-panel"),
                bank_name: String::from("bank"),
                number_eightpacks: 24,
            },
            wing: CurvedPanelSpec {
                array_name: String::from("wing_detector_arm"),
                front_type: String::from("front-wing-panel"),
                back_type: String::from("back-wing-panel"),
                bank_name: String::from("wing-bank"),
                number_eightpacks: 20,
                bank_radius: 5.0,
                anchor_offset: 0.0041,
                eightpack_angle: 0.5041,
            },
        }
    }
}

impl BiosansSpec {
    fn pixels_per_eightpack(&self) -> i64 {
        2 * self.tube.pixels_per_fourpack()
    }

    pub fn flat_pixels(&self) -> i64 {
        self.flat.number_eightpacks as i64 * self.pixels_per_eightpack()
    }

    pub fn wing_pixels(&self) -> i64 {
        self.wing.number_eightpacks as i64 * self.pixels_per_eightpack()
    }

    pub fn filename(&self) -> Result<String, InstrumentError> {
        Ok(make_filename(
            &self.instrument_name,
            &self.valid_from,
            &self.valid_to,
        )?)
    }
}

/// Assemble the complete BIOSANS document
pub fn build(spec: &BiosansSpec, last_modified: Option<&str>) -> Result<Document, InstrumentError> {
    let header = IdfHeader::new(&spec.instrument_name, &spec.valid_from)
        .with_valid_to(&spec.valid_to)
        .with_comment(&spec.comment)
        .with_last_modified(last_modified);
    let mut doc = Document::new(header);
    doc.add_sns_defaults(&DefaultsOptions {
        default_view: Some(String::from("3D")),
        axis_view_3d: Some(String::from("Z-")),
        ..Default::default()
    });
    add_basic_types(&mut doc, spec.source_sample_distance, &spec.tube);

    // main detector
    let double_panel = add_double_flat_panel_type(&mut doc, &spec.tube, &spec.flat);
    doc.add_comment_section("LIST OF PIXEL IDs in FLAT DETECTOR", None);
    let n_flat = spec.flat_pixels();
    doc.add_detector_ids(
        FLAT_IDLIST,
        &IdList::new(vec![IdEntry::stepped(0, n_flat - 1, 1)]),
    );
    add_double_flat_panel_component(
        &mut doc,
        double_panel,
        FLAT_IDLIST,
        &spec.flat.array_name,
        None,
    );

    // wing detector
    let double_panel =
        add_double_curved_panel_type(&mut doc, &spec.tube, &spec.wing, 1, true, None);
    doc.add_comment_section("LIST OF PIXEL IDs in CURVED DETECTOR", None);
    let n_wing = spec.wing_pixels();
    doc.add_detector_ids(
        CURVED_IDLIST,
        &IdList::new(vec![IdEntry::stepped(n_flat, n_flat + n_wing - 1, 1)]),
    );
    let wing = add_double_curved_panel_component(
        &mut doc,
        double_panel,
        CURVED_IDLIST,
        &spec.wing.array_name,
        None,
    );
    // swing the wing out of the path of the direct beam
    let rot_y = -spec.wing.eightpack_angle * spec.wing.number_eightpacks as f64 / 2.0;
    doc.add_location(wing, [0.0; 3], Rot::about_y(rot_y), None);

    doc.validate()?;
    Ok(doc)
}
