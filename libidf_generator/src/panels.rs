//! Panel assemblers and the shared sections of small-angle scattering instruments.
//!
//! Detector arrays of the SANS family are built from four-packs of tubes.
//! Two four-packs slipped against each other form an eight-pack, and the
//! eight-packs are laid out on a flat or a curved panel. A double panel holds
//! all the front four-packs in one panel type and all the back four-packs in
//! another, so that pixel ids can run through the front panel first.
use super::geometry::{Document, Rot};
use super::idlist::double_panel_idlist;
use super::placement::{curved_positions, double_pack_positions, flat_positions};
use super::xml_tree::{fixed_attr, float_attr, NodeId};

/// Dimensions of the tubes and four-packs of a detector array
#[derive(Debug, Clone, PartialEq)]
pub struct TubeSpec {
    pub tube_length: f64,
    pub tube_diameter: f64,
    pub pixels_per_tube: usize,
    /// Distance between consecutive tube axes
    pub tube_separation: f64,
    /// Distance between front and back four-packs along the panel normal
    pub fourpack_separation: f64,
    /// Shift between front and back four-packs along X
    pub fourpack_slip: f64,
}

impl TubeSpec {
    pub fn pixels_per_fourpack(&self) -> i64 {
        4 * self.pixels_per_tube as i64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatPanelSpec {
    pub array_name: String,
    pub front_type: String,
    pub back_type: String,
    pub bank_name: String,
    pub number_eightpacks: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurvedPanelSpec {
    pub array_name: String,
    pub front_type: String,
    pub back_type: String,
    pub bank_name: String,
    pub number_eightpacks: usize,
    /// Distance between the focal point and the anchor point
    pub bank_radius: f64,
    /// Added to the bank radius to reach the eight-pack midline
    pub anchor_offset: f64,
    /// Angle subtended by each eight-pack, in degrees
    pub eightpack_angle: f64,
}

/// Naming of the elements of a panel type
#[derive(Debug, Clone, Copy)]
pub struct PanelElements<'a> {
    pub type_elem: &'a str,
    pub name_elem: &'a str,
    pub first_index: usize,
    pub assembly_type: &'a str,
}

/// Coordinate of a location driven by a run log value
#[derive(Debug, Clone, Copy)]
pub struct LogCoordinate<'a> {
    pub log_key: &'a str,
    pub coord_name: &'a str,
    pub equation: &'a str,
}

impl Default for LogCoordinate<'_> {
    fn default() -> Self {
        Self {
            log_key: "detectorZ",
            coord_name: "z",
            equation: "0.001*value",
        }
    }
}

pub fn add_source_and_sample(doc: &mut Document, source_sample_distance: f64) {
    doc.add_comment_section("COMPONENT and TYPE: SOURCE AND SAMPLE POSITION", None);
    doc.add_moderator(source_sample_distance, "moderator");
    doc.add_sample_position(None);
}

/// Sample aperture at `z` (metres) with its diameter (millimetres) as the Size parameter
pub fn add_sample_aperture(doc: &mut Document, z: f64, diameter: f64) -> NodeId {
    doc.add_comment_section("COMPONENT and TYPE: SAMPLE APERTURE", None);
    doc.make_type_element("sample_aperture");
    let aperture = doc.add_component(None, "sample_aperture", None, None);
    let tree = doc.tree_mut();
    tree.append(aperture, "location").attr("z", float_attr(z));
    let size = tree
        .append(aperture, "parameter")
        .attr("name", "Size")
        .id();
    tree.append(size, "value").attr("val", float_attr(diameter));
    aperture
}

pub fn add_pixel_type(doc: &mut Document, diameter: f64, height: f64) -> NodeId {
    doc.add_comment_section("TYPE: PIXEL FOR STANDARD 256 PIXEL TUBE", None);
    doc.add_cylinder_pixel(
        "pixel",
        [0.0; 3],
        [0.0, 1.0, 0.0],
        diameter / 2.0,
        height,
        "detector",
        "cyl-approx",
    )
}

pub fn add_tube_type(doc: &mut Document, length: f64, pixels: usize) -> NodeId {
    doc.add_comment_section("TYPE: STANDARD 256 PIXEL TUBE", None);
    doc.add_pixelated_tube("tube", pixels, length, "pixel", false)
}

pub fn add_fourpack_type(doc: &mut Document, diameter: f64, separation: f64) -> NodeId {
    doc.add_comment_section("TYPE: FOUR-PACK", None);
    let air_gap = separation - diameter;
    // negative sizes order the tubes like the embedded geometry of the event files
    doc.add_n_pack("fourpack", 4, -diameter, -air_gap, "tube")
}

/// Source, sample, pixel, tube and four-pack
pub fn add_basic_types(doc: &mut Document, source_sample_distance: f64, tube: &TubeSpec) {
    add_source_and_sample(doc, source_sample_distance);
    add_pixel_type(
        doc,
        tube.tube_diameter,
        tube.tube_length / tube.pixels_per_tube as f64,
    );
    add_tube_type(doc, tube.tube_length, tube.pixels_per_tube);
    add_fourpack_type(doc, tube.tube_diameter, tube.tube_separation);
}

/// Panel type and the component whose locations place its elements
fn add_panel_assembly(doc: &mut Document, elements: &PanelElements) -> (NodeId, NodeId) {
    let assembly = doc.make_assembly_type(elements.assembly_type);
    let component = doc.add_component(Some(assembly), elements.type_elem, None, None);
    (assembly, component)
}

/// Flat panel of `num_elem` elements placed along X, returns the panel type
pub fn add_flat_panel_type(
    doc: &mut Document,
    num_elem: usize,
    width: f64,
    gap: f64,
    elements: &PanelElements,
) -> NodeId {
    doc.add_comment_section("TYPE: FLAT PANEL", None);
    let (assembly, component) = add_panel_assembly(doc, elements);
    let tree = doc.tree_mut();
    for pos in flat_positions(num_elem, width, gap, elements.name_elem, elements.first_index) {
        tree.append(component, "location")
            .attr("name", pos.name)
            .attr("x", fixed_attr(pos.x));
    }
    assembly
}

/// Panel of `num_elem` elements on an arc facing the focal point, returns the panel type
pub fn add_curved_panel_type(
    doc: &mut Document,
    num_elem: usize,
    radius: f64,
    dtheta: f64,
    theta_0: f64,
    translation: [f64; 3],
    elements: &PanelElements,
) -> NodeId {
    doc.add_comment_section("TYPE: CURVED PANEL", None);
    let (assembly, component) = add_panel_assembly(doc, elements);
    let positions = curved_positions(
        num_elem,
        radius,
        dtheta,
        theta_0,
        translation,
        elements.name_elem,
        elements.first_index,
    );
    let tree = doc.tree_mut();
    for pos in positions {
        tree.append(component, "location")
            .attr("name", pos.name)
            .attr("x", fixed_attr(pos.x))
            .attr("y", fixed_attr(pos.y))
            .attr("z", fixed_attr(pos.z))
            .attr("rot", fixed_attr(pos.rot_y.unwrap_or(0.0)))
            .attr("axis-x", "0")
            .attr("axis-y", "1")
            .attr("axis-z", "0");
    }
    assembly
}

/// Two packs sandwiched along their normal, named `front-{pack}` and `back-{pack}`
pub fn add_double_pack(
    doc: &mut Document,
    assembly_type: &str,
    pack_type: &str,
    separation: f64,
    slip: f64,
) -> NodeId {
    let assembly = doc.make_assembly_type(assembly_type);
    let component = doc.add_component(Some(assembly), pack_type, None, None);
    let tree = doc.tree_mut();
    for pos in double_pack_positions(pack_type, separation, slip) {
        tree.append(component, "location")
            .attr("name", pos.name)
            .attr("x", float_attr(pos.x))
            .attr("z", float_attr(pos.z));
    }
    assembly
}

/// Front and back flat panels plus the `double-flat-panel` type joining them
pub fn add_double_flat_panel_type(
    doc: &mut Document,
    tube: &TubeSpec,
    flat: &FlatPanelSpec,
) -> NodeId {
    let width = 3.0 * tube.tube_separation;
    let n = flat.number_eightpacks;
    for (assembly_type, first_index) in [(&flat.front_type, 1), (&flat.back_type, 1 + n)] {
        let elements = PanelElements {
            type_elem: "fourpack",
            name_elem: &flat.bank_name,
            first_index,
            assembly_type,
        };
        add_flat_panel_type(doc, n, width, tube.tube_separation, &elements);
    }

    doc.add_comment_section("TYPE: DOUBLE FLAT PANEL", None);
    let double_panel = doc.make_assembly_type("double-flat-panel");
    let x = tube.fourpack_slip / 2.0;
    let z = tube.fourpack_separation / 2.0;
    let front = doc.add_component(Some(double_panel), &flat.front_type, None, None);
    doc.add_location(front, [x, 0.0, -z], Rot::default(), None);
    let back = doc.add_component(Some(double_panel), &flat.back_type, None, None);
    doc.add_location(back, [-x, 0.0, z], Rot::default(), None);
    double_panel
}

/// Component of a double flat panel type; placed at the origin unless a location is given
pub fn add_double_flat_panel_component(
    doc: &mut Document,
    double_panel: NodeId,
    idlist: &str,
    name: &str,
    location: Option<[f64; 3]>,
) -> NodeId {
    doc.add_comment_section("COMPONENT: DOUBLE FLAT PANEL", None);
    let type_name = panel_type_name(doc, double_panel);
    let component = doc.add_component(None, &type_name, Some(idlist), Some(name));
    if let Some(xyz) = location {
        doc.add_location(component, xyz, Rot::default(), None);
    }
    component
}

/// Front and back curved panels plus the `double-curved-panel` type joining them.
///
/// With `to_origin` the panel center is moved from `(0, 0, r)` to the origin,
/// `r` being the radius of the eight-pack midline.
pub fn add_double_curved_panel_type(
    doc: &mut Document,
    tube: &TubeSpec,
    curved: &CurvedPanelSpec,
    first_bank_number: usize,
    to_origin: bool,
    comment: Option<&str>,
) -> NodeId {
    let r_eightpack = curved.bank_radius + curved.anchor_offset;
    let delta_r = tube.fourpack_separation / 2.0;
    let slip_angle = (tube.fourpack_slip / (2.0 * r_eightpack)).to_degrees();
    let translation = if to_origin {
        [0.0, 0.0, -r_eightpack]
    } else {
        [0.0; 3]
    };
    let n = curved.number_eightpacks;
    // negative step orders the eight-packs like the embedded geometry of the event files
    let dtheta = -curved.eightpack_angle;
    let halves = [
        (&curved.front_type, r_eightpack - delta_r, slip_angle, first_bank_number),
        (&curved.back_type, r_eightpack + delta_r, -slip_angle, first_bank_number + n),
    ];
    for (assembly_type, radius, theta_0, first_index) in halves {
        let elements = PanelElements {
            type_elem: "fourpack",
            name_elem: &curved.bank_name,
            first_index,
            assembly_type,
        };
        add_curved_panel_type(doc, n, radius, dtheta, theta_0, translation, &elements);
    }

    doc.add_comment_section("TYPE: DOUBLE CURVED PANEL", comment);
    let double_panel = doc.make_assembly_type("double-curved-panel");
    for panel_type in [&curved.front_type, &curved.back_type] {
        let component = doc.add_component(Some(double_panel), panel_type, None, None);
        doc.add_location(component, [0.0; 3], Rot::default(), None);
    }
    double_panel
}

pub fn add_double_curved_panel_component(
    doc: &mut Document,
    double_panel: NodeId,
    idlist: &str,
    name: &str,
    comment: Option<&str>,
) -> NodeId {
    doc.add_comment_section("COMPONENT: DOUBLE CURVED PANEL", comment);
    let type_name = panel_type_name(doc, double_panel);
    doc.add_component(None, &type_name, Some(idlist), Some(name))
}

/// Ids of a double panel, front four-packs first
pub fn add_double_panel_idlist(
    doc: &mut Document,
    tube: &TubeSpec,
    number_eightpacks: usize,
    name: &str,
    start: i64,
) -> NodeId {
    doc.add_comment_section("LIST OF PIXEL IDs in DETECTOR", None);
    let list = double_panel_idlist(number_eightpacks, tube.pixels_per_fourpack(), start);
    doc.add_detector_ids(name, &list)
}

/// Make coordinates of the element's location follow log values.
///
/// Reuses the element's first location, creating one if it has none.
pub fn insert_location_from_logs(
    doc: &mut Document,
    element: NodeId,
    coordinates: &[LogCoordinate],
) -> NodeId {
    let tree = doc.tree_mut();
    let location = match tree.find_child(element, "location") {
        Some(location) => location,
        None => tree.append(element, "location").id(),
    };
    for coordinate in coordinates {
        let parameter = tree
            .append(location, "parameter")
            .attr("name", coordinate.coord_name)
            .id();
        tree.append(parameter, "logfile")
            .attr("id", coordinate.log_key)
            .attr("eq", coordinate.equation);
    }
    location
}

fn panel_type_name(doc: &Document, type_element: NodeId) -> String {
    doc.tree()
        .attribute(type_element, "name")
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::IdfHeader;
    use crate::idlist::IdList;

    fn tube() -> TubeSpec {
        TubeSpec {
            tube_length: 1.046,
            tube_diameter: 0.00805,
            pixels_per_tube: 256,
            tube_separation: 0.0110,
            fourpack_separation: 0.0082,
            fourpack_slip: 0.0055,
        }
    }

    fn document() -> Document {
        Document::new(
            IdfHeader::new("TEST", "2019-01-01 00:00:00")
                .with_last_modified(Some("2020-01-01 00:00:00.000000")),
        )
    }

    fn location_names(doc: &Document, panel_type: NodeId) -> Vec<String> {
        let tree = doc.tree();
        let component = tree.find_child(panel_type, "component").unwrap();
        tree.child_elements(component, "location")
            .map(|loc| tree.attribute(loc, "name").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_flat_panel_type() {
        let mut doc = document();
        let elements = PanelElements {
            type_elem: "fourpack",
            name_elem: "bank",
            first_index: 3,
            assembly_type: "panel",
        };
        let panel = add_flat_panel_type(&mut doc, 4, 0.0082, 0.0, &elements);
        assert_eq!(location_names(&doc, panel), ["bank3", "bank4", "bank5", "bank6"]);
        let tree = doc.tree();
        let component = tree.find_child(panel, "component").unwrap();
        let xs: Vec<&str> = tree
            .child_elements(component, "location")
            .map(|loc| tree.attribute(loc, "x").unwrap())
            .collect();
        assert_eq!(xs, ["0.01230", "0.00410", "-0.00410", "-0.01230"]);
    }

    #[test]
    fn test_double_pack() {
        let mut doc = document();
        let pack = add_double_pack(&mut doc, "eightpack", "fourpack", 0.0082, 0.0055);
        assert_eq!(
            location_names(&doc, pack),
            ["front-fourpack", "back-fourpack"]
        );
    }

    #[test]
    fn test_double_flat_panel_validates() {
        let mut doc = document();
        let tube = tube();
        add_basic_types(&mut doc, 1.0, &tube);
        let flat = FlatPanelSpec {
            array_name: String::from("detector1"),
            front_type: String::from("front-panel"),
            back_type: String::from("back-panel"),
            bank_name: String::from("bank"),
            number_eightpacks: 2,
        };
        let double_panel = add_double_flat_panel_type(&mut doc, &tube, &flat);
        add_double_panel_idlist(&mut doc, &tube, 2, "ids", 0);
        add_double_flat_panel_component(&mut doc, double_panel, "ids", "detector1", None);
        assert_eq!(doc.validate().unwrap(), 2 * 8 * 256);

        let tree = doc.tree();
        let back = tree.descendants(tree.root()).into_iter().find(|node| {
            tree.name(*node) == Some("type") && tree.attribute(*node, "name") == Some("back-panel")
        });
        assert_eq!(location_names(&doc, back.unwrap()), ["bank3", "bank4"]);
    }

    #[test]
    fn test_double_curved_panel_geometry() {
        let mut doc = document();
        let tube = tube();
        add_basic_types(&mut doc, 1.0, &tube);
        let curved = CurvedPanelSpec {
            array_name: String::from("wing_detector_arm"),
            front_type: String::from("front-wing-panel"),
            back_type: String::from("back-wing-panel"),
            bank_name: String::from("wing-bank"),
            number_eightpacks: 20,
            bank_radius: 5.0,
            anchor_offset: 0.0041,
            eightpack_angle: 0.5041,
        };
        let double_panel = add_double_curved_panel_type(&mut doc, &tube, &curved, 1, true, None);
        doc.add_detector_ids("wing_ids", &IdList::dense(0, 20 * 8 * 256 - 1));
        add_double_curved_panel_component(&mut doc, double_panel, "wing_ids", "wing", None);
        assert_eq!(doc.validate().unwrap(), 20 * 8 * 256);

        let tree = doc.tree();
        let front = tree
            .descendants(tree.root())
            .into_iter()
            .find(|node| tree.attribute(*node, "name") == Some("front-wing-panel"))
            .unwrap();
        let component = tree.find_child(front, "component").unwrap();
        let locations: Vec<NodeId> = tree.child_elements(component, "location").collect();
        assert_eq!(locations.len(), 20);
        assert_eq!(tree.attribute(locations[0], "name"), Some("wing-bank1"));
        let radius = 5.0041 - 0.0041;
        for loc in locations {
            let get = |key: &str| tree.attribute(loc, key).unwrap().parse::<f64>().unwrap();
            let (x, z) = (get("x"), get("z") + 5.0041);
            assert!((x.hypot(z) - radius).abs() < 1e-4);
            assert!(get("rot") < 5.1 && get("rot") > -5.1);
        }
    }

    #[test]
    fn test_sample_aperture_and_logs() {
        let mut doc = document();
        let aperture = add_sample_aperture(&mut doc, 0.0, 14.0);
        let location = insert_location_from_logs(
            &mut doc,
            aperture,
            &[LogCoordinate {
                log_key: "sample_aperture_z",
                ..Default::default()
            }],
        );
        let tree = doc.tree();
        assert_eq!(tree.find_child(aperture, "location"), Some(location));
        let parameter = tree.find_child(location, "parameter").unwrap();
        assert_eq!(tree.attribute(parameter, "name"), Some("z"));
        let logfile = tree.find_child(parameter, "logfile").unwrap();
        assert_eq!(tree.attribute(logfile, "id"), Some("sample_aperture_z"));
        assert_eq!(tree.attribute(logfile, "eq"), Some("0.001*value"));
        assert!(doc.validate().is_ok());
    }
}
