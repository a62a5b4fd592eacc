//! Legacy BIOSANS geometry with only the wing detector: 160 single tubes on
//! an arc of 1.13 m, each tube stepped by the same small angle.
use crate::error::InstrumentError;
use crate::filename::make_filename;
use crate::geometry::{DefaultsOptions, Document, IdfHeader};
use crate::idlist::IdList;
use crate::placement::linspace;
use crate::xml_tree::float_attr;

pub const WING_IDLIST: &str = "wing_detector_ids";

#[derive(Debug, Clone, PartialEq)]
pub struct WingDetectorSpec {
    pub instrument_name: String,
    pub valid_from: String,
    pub valid_to: String,
    pub moderator_distance: f64,
    /// Monitor and timer share the same position
    pub monitor_distance: f64,
    pub radius: f64,
    pub n_tubes: usize,
    pub pixels_per_tube: usize,
    /// Arc length between consecutive tube centers
    pub tube_step: f64,
    /// Center of the first and last pixel along the tube
    pub pixel_span: (f64, f64),
    pub pixel_radius: f64,
    pub pixel_height: f64,
    pub first_id: i64,
}

impl Default for WingDetectorSpec {
    fn default() -> Self {
        Self {
            instrument_name: String::from("BIOSANSWING"),
            valid_from: String::from("2016-04-22 00:00:00"),
            valid_to: String::from("2100-01-31 23:59:59"),
            moderator_distance: 13.601,
            monitor_distance: -10.5,
            radius: 1.13,
            n_tubes: 20 * 8,
            pixels_per_tube: 256,
            tube_step: 0.0055,
            pixel_span: (-0.54825, 0.54825),
            pixel_radius: 0.00275,
            pixel_height: 0.0043,
            first_id: 2_000_000,
        }
    }
}

impl WingDetectorSpec {
    pub fn total_pixels(&self) -> i64 {
        (self.n_tubes * self.pixels_per_tube) as i64
    }

    /// Angle between consecutive tubes as seen from the sample, in degrees
    pub fn tube_step_angle(&self) -> f64 {
        (self.tube_step / 2.0 / self.radius).asin().to_degrees()
    }

    pub fn filename(&self) -> Result<String, InstrumentError> {
        Ok(make_filename(
            &self.instrument_name,
            &self.valid_from,
            &self.valid_to,
        )?)
    }
}

/// A single monitor-like component with its own type and one-value idlist
fn add_single_monitor(doc: &mut Document, name: &str, z: f64, id: i64) {
    let component = doc.add_component(None, name, Some(name), None);
    doc.tree_mut()
        .append(component, "location")
        .attr("z", float_attr(z));
    let type_element = doc.make_type_element(name);
    doc.tree_mut().set_attribute(type_element, "is", "monitor");
    doc.add_detector_ids(name, &IdList::values(&[id]));
}

pub fn build(
    spec: &WingDetectorSpec,
    last_modified: Option<&str>,
) -> Result<Document, InstrumentError> {
    let header = IdfHeader::new(&spec.instrument_name, &spec.valid_from)
        .with_valid_to(&spec.valid_to)
        .with_last_modified(last_modified);
    let mut doc = Document::new(header);
    doc.add_sns_defaults(&DefaultsOptions::default());

    doc.add_comment("SOURCE AND SAMPLE POSITION");
    doc.add_moderator(spec.moderator_distance, "moderator");
    doc.add_sample_position(None);

    doc.add_comment("MONITOR 1");
    add_single_monitor(&mut doc, "monitor1", spec.monitor_distance, 1);
    doc.add_comment("MONITOR 2");
    add_single_monitor(&mut doc, "timer1", spec.monitor_distance, 2);

    doc.add_comment("Wing Detector");
    doc.add_located_component(None, "wing_detector", Some(WING_IDLIST));
    doc.add_detector_ids(
        WING_IDLIST,
        &IdList::dense(spec.first_id, spec.first_id + spec.total_pixels() - 1),
    );

    let detector = doc.make_type_element("wing_detector");
    let tubes = doc.add_component(Some(detector), "wing_tube", None, None);
    let step = spec.tube_step_angle();
    for i in 0..spec.n_tubes {
        doc.tree_mut()
            .append(tubes, "location")
            .attr("r", float_attr(spec.radius))
            .attr("t", float_attr(-step * i as f64))
            .attr("name", format!("wing_tube_{i}"));
    }

    let tube = doc.make_type_element("wing_tube");
    doc.tree_mut().set_attribute(tube, "outline", "yes");
    let pixels = doc.add_component(Some(tube), "wing_pixel", None, None);
    let (first, last) = spec.pixel_span;
    for (i, y) in linspace(first, last, spec.pixels_per_tube)
        .into_iter()
        .enumerate()
    {
        doc.tree_mut()
            .append(pixels, "location")
            .attr("y", float_attr(y))
            .attr("name", format!("wing_pixel_{i}"));
    }

    let pixel = doc.make_type_element("wing_pixel");
    let tree = doc.tree_mut();
    tree.set_attribute(pixel, "is", "detector");
    let cylinder = tree.append(pixel, "cylinder").attr("id", "cyl-approx").id();
    tree.append(cylinder, "centre-of-bottom-base")
        .attr("p", "0.0")
        .attr("r", "0.0")
        .attr("t", "0.0");
    tree.append(cylinder, "axis")
        .attr("y", "1.0")
        .attr("x", "0.0")
        .attr("z", "0.0");
    tree.append(cylinder, "radius")
        .attr("val", float_attr(spec.pixel_radius));
    tree.append(cylinder, "height")
        .attr("val", float_attr(spec.pixel_height));
    tree.append(pixel, "algebra").attr("val", "cyl-approx");

    doc.validate()?;
    Ok(doc)
}
