use fxhash::{FxHashMap, FxHashSet};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use time::macros::format_description;
use time::OffsetDateTime;

use super::error::{IdfWriterError, ValidationError};
use super::idlist::{multiple_ranges, validate_idlist, IdEntry, IdList};
use super::placement::tube_pixel_offsets;
use super::xml_tree::{float_attr, NodeId, XmlTree};

const IDF_NAMESPACE: &str = "http://www.mantidproject.org/IDF/1.0";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const IDF_SCHEMA_LOCATION: &str =
    "http://www.mantidproject.org/IDF/1.0 http://schema.mantidproject.org/IDF/1.0/IDFSchema.xsd";

/// Type names whose components count as a single addressable pixel
const LEAF_KINDS: [&str; 4] = ["detector", "Detector", "monitor", "Monitor"];

/// The current local time in the format of the last-modified attribute
pub fn timestamp_now() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]"
    ))
    .unwrap_or_else(|_| now.to_string())
}

/// Attributes of the instrument root element
#[derive(Debug, Clone, PartialEq)]
pub struct IdfHeader {
    pub name: String,
    pub comment: Option<String>,
    pub valid_from: String,
    pub valid_to: Option<String>,
    pub last_modified: String,
}

impl IdfHeader {
    pub fn new(name: &str, valid_from: &str) -> Self {
        Self {
            name: name.to_string(),
            comment: None,
            valid_from: valid_from.to_string(),
            valid_to: None,
            last_modified: timestamp_now(),
        }
    }

    pub fn with_valid_to(mut self, valid_to: &str) -> Self {
        self.valid_to = Some(valid_to.to_string());
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Pin the last-modified stamp, which makes the output reproducible
    pub fn with_last_modified(mut self, last_modified: Option<&str>) -> Self {
        if let Some(stamp) = last_modified {
            self.last_modified = stamp.to_string();
        }
        self
    }
}

/// Options of the defaults section
#[derive(Debug, Clone, Default)]
pub struct DefaultsOptions {
    pub indirect: bool,
    pub default_view: Option<String>,
    pub axis_view_3d: Option<String>,
    pub theta_sign_axis: Option<String>,
}

/// Nested rotations of a location, in degrees. Applied Y, then Z, then X.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rot {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Rot {
    pub fn about_y(angle: f64) -> Self {
        Self {
            y: Some(angle),
            ..Default::default()
        }
    }
}

/// A pixel with physical position, optional neutronic position and analyser energy
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorPixel {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// (r, theta, phi) used for the neutronic position
    pub neutronic: Option<(f64, f64, f64)>,
    pub efixed: Option<f64>,
}

/// Owner of an instrument definition under construction.
///
/// All builder functions receive the document plus a parent handle and
/// return the handle of the subtree they created. Nothing is written to disk
/// until [`Document::write`], which validates the tree first.
#[derive(Debug, Clone)]
pub struct Document {
    header: IdfHeader,
    tree: XmlTree,
}

impl Document {
    /// Create the document with its instrument root element
    pub fn new(header: IdfHeader) -> Self {
        let mut tree = XmlTree::new("instrument");
        let root = tree.root();
        tree.set_attribute(root, "xmlns", IDF_NAMESPACE);
        tree.set_attribute(root, "xmlns:xsi", XSI_NAMESPACE);
        tree.set_attribute(root, "xsi:schemaLocation", IDF_SCHEMA_LOCATION);
        tree.set_attribute(root, "name", header.name.as_str());
        tree.set_attribute(root, "valid-from", header.valid_from.as_str());
        if let Some(valid_to) = &header.valid_to {
            tree.set_attribute(root, "valid-to", valid_to.as_str());
        }
        tree.set_attribute(root, "last-modified", header.last_modified.as_str());
        let mut doc = Self { header, tree };
        if let Some(comment) = doc.header.comment.clone() {
            doc.add_comment(&comment);
        }
        doc
    }

    pub fn header(&self) -> &IdfHeader {
        &self.header
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut XmlTree {
        &mut self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn add_comment(&mut self, comment: &str) -> NodeId {
        let root = self.root();
        self.tree.append_comment(root, comment)
    }

    /// Comment framed by empty comments, optionally followed by notes
    pub fn add_comment_section(&mut self, comment: &str, notes: Option<&str>) {
        self.add_comment("");
        self.add_comment(comment);
        if let Some(notes) = notes {
            self.add_comment(notes);
        }
        self.add_comment("");
    }

    /// Units and reference frame used by all SNS/HFIR/ILL instruments
    pub fn add_sns_defaults(&mut self, options: &DefaultsOptions) -> NodeId {
        let root = self.root();
        let defaults = self.tree.append(root, "defaults").id();
        self.tree.append(defaults, "length").attr("unit", "metre");
        self.tree.append(defaults, "angle").attr("unit", "degree");
        let frame = self.tree.append(defaults, "reference-frame").id();
        self.tree.append(frame, "along-beam").attr("axis", "z");
        self.tree.append(frame, "pointing-up").attr("axis", "y");
        self.tree.append(frame, "handedness").attr("val", "right");
        if let Some(axis) = &options.theta_sign_axis {
            self.tree.append(frame, "theta-sign").attr("axis", axis.as_str());
        }
        if options.indirect {
            self.tree.append(defaults, "indirect-neutronic-positions");
        }
        if let Some(view) = &options.default_view {
            let view = self
                .tree
                .append(defaults, "default-view")
                .attr("view", view.as_str())
                .id();
            if let Some(axis) = &options.axis_view_3d {
                self.tree.set_attribute(view, "axis-view", axis.as_str());
            }
        }
        defaults
    }

    /// Source component and type; the moderator always sits upstream (negative z)
    pub fn add_moderator(&mut self, distance: f64, name: &str) -> NodeId {
        let root = self.root();
        let distance = -distance.abs();
        let component = self.tree.append(root, "component").attr("type", name).id();
        self.tree
            .append(component, "location")
            .attr("z", float_attr(distance));
        self.tree
            .append(root, "type")
            .attr("name", name)
            .attr("is", "Source");
        component
    }

    pub fn add_sample_position(&mut self, location: Option<[f64; 3]>) -> NodeId {
        let root = self.root();
        let [x, y, z] = location.unwrap_or([0.0; 3]);
        let component = self
            .tree
            .append(root, "component")
            .attr("type", "sample-position")
            .id();
        self.tree
            .append(component, "location")
            .attr("y", float_attr(y))
            .attr("x", float_attr(x))
            .attr("z", float_attr(z));
        self.tree
            .append(root, "type")
            .attr("name", "sample-position")
            .attr("is", "SamplePos");
        component
    }

    /// Component with a located type of the given kind (ILL style source and sample)
    pub fn add_component_ill(
        &mut self,
        type_name: &str,
        xyz: [f64; 3],
        is_type: Option<&str>,
    ) -> NodeId {
        let root = self.root();
        let component = self
            .tree
            .append(root, "component")
            .attr("type", type_name)
            .id();
        self.add_location(component, xyz, Rot::default(), None);
        let type_element = self.tree.append(root, "type").attr("name", type_name).id();
        if let Some(kind) = is_type {
            self.tree.set_attribute(type_element, "is", kind);
        }
        component
    }

    /// All monitors as one component with idlist `monitors`
    pub fn add_monitors(&mut self, distances: &[f64], names: &[&str], neutronic: bool) -> NodeId {
        debug_assert_eq!(distances.len(), names.len());
        self.add_comment("MONITORS");
        let root = self.root();
        let component = self
            .tree
            .append(root, "component")
            .attr("type", "monitors")
            .attr("idlist", "monitors")
            .id();
        self.tree.append(component, "location");
        let type_element = self.tree.append(root, "type").attr("name", "monitors").id();
        let base = self
            .tree
            .append(type_element, "component")
            .attr("type", "monitor")
            .attr("mark-as", "monitor")
            .id();
        for (distance, name) in distances.iter().zip(names.iter()) {
            let location = self
                .tree
                .append(base, "location")
                .attr("z", float_attr(*distance))
                .attr("name", *name)
                .id();
            if neutronic {
                self.tree
                    .append(location, "neutronic")
                    .attr("z", float_attr(*distance));
            }
        }
        component
    }

    /// Cylindrical placeholder shape for monitors
    pub fn add_dummy_monitor(&mut self, radius: f64, height: f64) -> NodeId {
        let root = self.root();
        let type_element = self
            .tree
            .append(root, "type")
            .attr("name", "monitor")
            .attr("is", "detector")
            .id();
        self.add_cylinder(type_element, [0.0; 3], [0.0, 0.0, 1.0], radius, height, "cyl-approx");
        self.tree
            .append(type_element, "algebra")
            .attr("val", "cyl-approx");
        type_element
    }

    pub fn add_monitor_ids(&mut self, ids: &[i64]) -> NodeId {
        self.add_comment("MONITOR IDs");
        self.add_detector_ids("monitors", &IdList::values(ids))
    }

    /// Component of `type_name` under parent (the root when None)
    pub fn add_component(
        &mut self,
        parent: Option<NodeId>,
        type_name: &str,
        idlist: Option<&str>,
        name: Option<&str>,
    ) -> NodeId {
        let parent = parent.unwrap_or_else(|| self.root());
        let component = self
            .tree
            .append(parent, "component")
            .attr("type", type_name)
            .id();
        if let Some(idlist) = idlist {
            self.tree.set_attribute(component, "idlist", idlist);
        }
        if let Some(name) = name {
            self.tree.set_attribute(component, "name", name);
        }
        component
    }

    /// Component with an empty location, placing its type at the parent origin
    pub fn add_located_component(
        &mut self,
        parent: Option<NodeId>,
        type_name: &str,
        idlist: Option<&str>,
    ) -> NodeId {
        let component = self.add_component(parent, type_name, idlist, None);
        self.tree.append(component, "location");
        component
    }

    pub fn make_type_element(&mut self, name: &str) -> NodeId {
        let root = self.root();
        self.tree.append(root, "type").attr("name", name).id()
    }

    /// Type element holding a `properties` child, the usual start of an assembly
    pub fn make_assembly_type(&mut self, name: &str) -> NodeId {
        let type_element = self.make_type_element(name);
        self.tree.append(type_element, "properties");
        type_element
    }

    /// Cartesian location with nested rotations
    pub fn add_location(
        &mut self,
        parent: NodeId,
        xyz: [f64; 3],
        rot: Rot,
        name: Option<&str>,
    ) -> NodeId {
        let location = self
            .tree
            .append(parent, "location")
            .attr("x", float_attr(xyz[0]))
            .attr("y", float_attr(xyz[1]))
            .attr("z", float_attr(xyz[2]))
            .id();
        if let Some(name) = name {
            self.tree.set_attribute(location, "name", name);
        }
        let mut nest = location;
        for (angle, axis) in [(rot.y, [0, 1, 0]), (rot.z, [0, 0, 1]), (rot.x, [1, 0, 0])] {
            if let Some(angle) = angle {
                nest = self
                    .tree
                    .append(nest, "rot")
                    .attr("val", float_attr(angle))
                    .attr("axis-x", axis[0].to_string())
                    .attr("axis-y", axis[1].to_string())
                    .attr("axis-z", axis[2].to_string())
                    .id();
            }
        }
        location
    }

    /// Orient a location towards the sample position
    pub fn add_facing(&mut self, location: NodeId) -> NodeId {
        self.tree
            .append(location, "facing")
            .attr("x", "0.0")
            .attr("y", "0.0")
            .attr("z", "0.0")
            .id()
    }

    fn add_cylinder(
        &mut self,
        parent: NodeId,
        center_bottom_base: [f64; 3],
        axis: [f64; 3],
        radius: f64,
        height: f64,
        id: &str,
    ) -> NodeId {
        let cylinder = self.tree.append(parent, "cylinder").attr("id", id).id();
        self.tree
            .append(cylinder, "centre-of-bottom-base")
            .attr("x", float_attr(center_bottom_base[0]))
            .attr("y", float_attr(center_bottom_base[1]))
            .attr("z", float_attr(center_bottom_base[2]));
        self.tree
            .append(cylinder, "axis")
            .attr("x", float_attr(axis[0]))
            .attr("y", float_attr(axis[1]))
            .attr("z", float_attr(axis[2]));
        self.tree
            .append(cylinder, "radius")
            .attr("val", float_attr(radius));
        self.tree
            .append(cylinder, "height")
            .attr("val", float_attr(height));
        cylinder
    }

    /// Cylindrical pixel type; `algebra` names the cylinder shape
    pub fn add_cylinder_pixel(
        &mut self,
        name: &str,
        center_bottom_base: [f64; 3],
        axis: [f64; 3],
        radius: f64,
        height: f64,
        is_type: &str,
        algebra: &str,
    ) -> NodeId {
        let root = self.root();
        let type_element = self
            .tree
            .append(root, "type")
            .attr("name", name)
            .attr("is", is_type)
            .id();
        self.add_cylinder(type_element, center_bottom_base, axis, radius, height, algebra);
        self.tree
            .append(type_element, "algebra")
            .attr("val", algebra);
        type_element
    }

    /// Tube type of `num_pixels` pixels of `type_name` centered along Y
    pub fn add_pixelated_tube(
        &mut self,
        name: &str,
        num_pixels: usize,
        tube_height: f64,
        type_name: &str,
        neutronic: bool,
    ) -> NodeId {
        let root = self.root();
        let type_element = self
            .tree
            .append(root, "type")
            .attr("outline", "yes")
            .attr("name", name)
            .id();
        self.tree.append(type_element, "properties");
        let component = self
            .tree
            .append(type_element, "component")
            .attr("type", type_name)
            .id();
        for (i, y) in tube_pixel_offsets(num_pixels, tube_height)
            .into_iter()
            .enumerate()
        {
            let location = self
                .tree
                .append(component, "location")
                .attr("y", float_attr(y))
                .attr("name", format!("pixel{}", i + 1))
                .id();
            if neutronic {
                self.tree
                    .append(location, "neutronic")
                    .attr("y", float_attr(y));
            }
        }
        type_element
    }

    /// Pack of `num_tubes` tubes laid side by side along X
    pub fn add_n_pack(
        &mut self,
        name: &str,
        num_tubes: usize,
        tube_width: f64,
        air_gap: f64,
        type_name: &str,
    ) -> NodeId {
        let type_element = self.make_assembly_type(name);
        let component = self
            .tree
            .append(type_element, "component")
            .attr("type", type_name)
            .id();
        for (i, x) in super::placement::n_pack_offsets(num_tubes, tube_width, air_gap)
            .into_iter()
            .enumerate()
        {
            self.tree
                .append(component, "location")
                .attr("name", format!("tube{}", i + 1))
                .attr("x", float_attr(x));
        }
        type_element
    }

    /// Type `name` holding a single located component of `comp_type`
    pub fn add_detector(
        &mut self,
        xyz: [f64; 3],
        rot: Rot,
        name: &str,
        comp_type: &str,
        facing_sample: bool,
    ) -> NodeId {
        let type_element = self.make_assembly_type(name);
        let component = self
            .tree
            .append(type_element, "component")
            .attr("type", comp_type)
            .id();
        let location = self.add_location(component, xyz, rot, None);
        if facing_sample {
            self.add_facing(location);
        }
        type_element
    }

    /// Type `name` with one location per pixel, named by pixel id
    pub fn add_detector_pixels(&mut self, name: &str, pixels: &[DetectorPixel]) -> NodeId {
        let type_element = self.make_assembly_type(name);
        let component = self
            .tree
            .append(type_element, "component")
            .attr("type", "pixel")
            .id();
        for pixel in pixels.iter() {
            let location = self
                .tree
                .append(component, "location")
                .attr("x", float_attr(pixel.x))
                .attr("y", float_attr(pixel.y))
                .attr("z", float_attr(pixel.z))
                .attr("name", pixel.id.to_string())
                .id();
            if let Some((r, t, p)) = pixel.neutronic {
                self.tree
                    .append(location, "neutronic")
                    .attr("r", float_attr(r))
                    .attr("t", float_attr(t))
                    .attr("p", float_attr(p));
            }
            if let Some(energy) = pixel.efixed {
                let parameter = self
                    .tree
                    .append(location, "parameter")
                    .attr("name", "Efixed")
                    .id();
                self.tree
                    .append(parameter, "value")
                    .attr("val", float_attr(energy));
            }
        }
        type_element
    }

    /// Idlist matching [`Document::add_detector_pixels`], compressed into consecutive ranges
    pub fn add_detector_pixels_idlist(&mut self, name: &str, pixels: &[DetectorPixel]) -> NodeId {
        let ids: Vec<i64> = pixels.iter().map(|p| p.id).collect();
        self.add_detector_ids(name, &multiple_ranges(&ids))
    }

    /// Write an idlist element
    pub fn add_detector_ids(&mut self, idname: &str, list: &IdList) -> NodeId {
        let root = self.root();
        let idlist = self.tree.append(root, "idlist").attr("idname", idname).id();
        for entry in list.entries() {
            match *entry {
                IdEntry::Value(v) => {
                    self.tree.append(idlist, "id").attr("val", v.to_string());
                }
                IdEntry::Range { start, end, step } => {
                    let id = self
                        .tree
                        .append(idlist, "id")
                        .attr("start", start.to_string())
                        .id();
                    if let Some(step) = step {
                        self.tree.set_attribute(id, "step", step.to_string());
                    }
                    self.tree.set_attribute(id, "end", end.to_string());
                }
            }
        }
        idlist
    }

    /// Read an idlist element back into its entries
    fn read_idlist(&self, idlist: NodeId, idname: &str) -> Result<IdList, ValidationError> {
        let bad = |reason: String| ValidationError::BadIdEntry {
            idlist: idname.to_string(),
            reason,
        };
        let parse = |id: NodeId, key: &str| -> Result<Option<i64>, ValidationError> {
            match self.tree.attribute(id, key) {
                Some(text) => text
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|e| bad(format!("{key}={text:?}: {e}"))),
                None => Ok(None),
            }
        };
        let mut list = IdList::default();
        for id in self.tree.child_elements(idlist, "id") {
            if let Some(val) = parse(id, "val")? {
                list.push(IdEntry::Value(val));
                continue;
            }
            match (parse(id, "start")?, parse(id, "end")?) {
                (Some(start), Some(end)) => list.push(IdEntry::Range {
                    start,
                    end,
                    step: parse(id, "step")?,
                }),
                _ => return Err(bad(String::from("id needs val or start and end"))),
            }
        }
        Ok(list)
    }

    /// Check the structural rules of the format before anything is written.
    ///
    /// Every component type must be declared, every idlist reference must be
    /// declared, every declared idlist must be referenced, and every component
    /// carrying an idlist must place exactly as many pixels as its idlist holds
    /// ids. Returns the number of ids checked.
    pub fn validate(&self) -> Result<u64, ValidationError> {
        let tree = &self.tree;
        let mut types: FxHashMap<&str, NodeId> = FxHashMap::default();
        let mut idlists: FxHashMap<&str, u64> = FxHashMap::default();
        let mut components: Vec<NodeId> = Vec::new();

        for node in tree.descendants(tree.root()) {
            match tree.name(node) {
                Some("type") => {
                    let name = tree.attribute(node, "name").unwrap_or_default();
                    if types.insert(name, node).is_some() {
                        return Err(ValidationError::DuplicateType(name.to_string()));
                    }
                }
                Some("idlist") => {
                    let name = tree.attribute(node, "idname").unwrap_or_default();
                    let list = self.read_idlist(node, name)?;
                    let count = validate_idlist(name, &list)?;
                    if idlists.insert(name, count).is_some() {
                        return Err(ValidationError::DuplicateIdList(name.to_string()));
                    }
                }
                Some("component") => components.push(node),
                _ => (),
            }
        }

        let mut counter = LeafCounter {
            tree,
            types: &types,
            cache: FxHashMap::default(),
            visiting: FxHashSet::default(),
        };
        let mut checked = 0;
        let mut referenced: FxHashSet<&str> = FxHashSet::default();
        for component in components {
            let type_name = tree.attribute(component, "type").unwrap_or_default();
            if !types.contains_key(type_name) {
                return Err(ValidationError::MissingType(type_name.to_string()));
            }
            let Some(idname) = tree.attribute(component, "idlist") else {
                continue;
            };
            let ids = *idlists
                .get(idname)
                .ok_or_else(|| ValidationError::MissingIdList {
                    component: type_name.to_string(),
                    idlist: idname.to_string(),
                })?;
            referenced.insert(idname);
            let positions = location_count(tree, component) * counter.leaves(type_name)?;
            if positions != ids {
                return Err(ValidationError::CountMismatch {
                    component: type_name.to_string(),
                    idlist: idname.to_string(),
                    positions,
                    ids,
                });
            }
            checked += ids;
        }
        if let Some(unused) = idlists.keys().find(|name| !referenced.contains(*name)) {
            return Err(ValidationError::UnusedIdList(unused.to_string()));
        }
        Ok(checked)
    }

    /// Serialize the document without validating it
    pub fn to_xml_string(&self) -> Result<String, IdfWriterError> {
        self.tree.to_xml_string()
    }

    /// Validate, serialize and write the document to path.
    ///
    /// The text goes to a temporary file in the same directory first, which is
    /// moved onto path only once fully written and removed on any failure.
    /// Returns the number of bytes written.
    pub fn write(&self, path: &Path) -> Result<u64, IdfWriterError> {
        let n_ids = self.validate()?;
        let xml = self.to_xml_string()?;
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp_file = NamedTempFile::new_in(parent)?;
        tmp_file.write_all(xml.as_bytes())?;
        tmp_file.flush()?;
        tmp_file.persist(path)?;
        let size = xml.len() as u64;
        spdlog::info!(
            "Wrote {} ({} ids, {})",
            path.to_string_lossy(),
            n_ids,
            human_bytes::human_bytes(size as f64)
        );
        Ok(size)
    }
}

/// Number of times a component is placed; a component without location is placed once
fn location_count(tree: &XmlTree, component: NodeId) -> u64 {
    (tree.child_elements(component, "location").count() as u64).max(1)
}

/// Counts the pixels (detector or monitor leaves) below a type, memoized per type name
struct LeafCounter<'a, 'm> {
    tree: &'a XmlTree,
    types: &'m FxHashMap<&'a str, NodeId>,
    cache: FxHashMap<&'a str, u64>,
    visiting: FxHashSet<&'a str>,
}

impl<'a> LeafCounter<'a, '_> {
    fn leaves(&mut self, type_name: &'a str) -> Result<u64, ValidationError> {
        if let Some(count) = self.cache.get(type_name) {
            return Ok(*count);
        }
        let node = *self
            .types
            .get(type_name)
            .ok_or_else(|| ValidationError::MissingType(type_name.to_string()))?;
        let tree = self.tree;
        if let Some(kind) = tree.attribute(node, "is") {
            if LEAF_KINDS.contains(&kind) {
                self.cache.insert(type_name, 1);
                return Ok(1);
            }
        }
        if !self.visiting.insert(type_name) {
            return Err(ValidationError::CyclicType(type_name.to_string()));
        }
        let mut total = 0;
        for component in tree.child_elements(node, "component") {
            let child_type = tree.attribute(component, "type").unwrap_or_default();
            total += location_count(tree, component) * self.leaves(child_type)?;
        }
        self.visiting.remove(type_name);
        self.cache.insert(type_name, total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> IdfHeader {
        IdfHeader::new("TEST", "2019-01-01 00:00:00")
            .with_valid_to("2100-12-31 23:59:59")
            .with_last_modified(Some("2020-01-01 00:00:00.000000"))
    }

    /// Two tubes of four pixels each
    fn small_detector(ids: &IdList) -> Document {
        let mut doc = Document::new(header());
        doc.add_sns_defaults(&DefaultsOptions::default());
        doc.add_moderator(13.601, "moderator");
        doc.add_sample_position(None);
        doc.add_cylinder_pixel("pixel", [0.0; 3], [0.0, 1.0, 0.0], 0.004, 0.25, "detector", "cyl-approx");
        doc.add_pixelated_tube("tube", 4, 1.0, "pixel", false);
        doc.add_n_pack("twopack", 2, 0.008, 0.001, "tube");
        doc.add_located_component(None, "twopack", Some("ids"));
        doc.add_detector_ids("ids", ids);
        doc
    }

    #[test]
    fn test_root_attributes() {
        let doc = Document::new(header().with_comment("Created by someone"));
        let tree = doc.tree();
        assert_eq!(tree.attribute(doc.root(), "name"), Some("TEST"));
        assert_eq!(tree.attribute(doc.root(), "valid-to"), Some("2100-12-31 23:59:59"));
        let first = tree.children(doc.root())[0];
        assert_eq!(tree.comment(first), Some("Created by someone"));
    }

    #[test]
    fn test_valid_document() {
        let doc = small_detector(&IdList::dense(0, 7));
        assert_eq!(doc.validate().unwrap(), 8);
    }

    #[test]
    fn test_count_mismatch() {
        let doc = small_detector(&IdList::dense(0, 8));
        match doc.validate() {
            Err(ValidationError::CountMismatch { positions, ids, .. }) => {
                assert_eq!(positions, 8);
                assert_eq!(ids, 9);
            }
            other => panic!("expected CountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_and_idlist() {
        let mut doc = small_detector(&IdList::dense(0, 7));
        doc.add_located_component(None, "no-such-type", None);
        assert!(matches!(doc.validate(), Err(ValidationError::MissingType(_))));

        let mut doc = small_detector(&IdList::dense(0, 7));
        doc.add_located_component(None, "tube", Some("no-such-list"));
        assert!(matches!(
            doc.validate(),
            Err(ValidationError::MissingIdList { .. })
        ));
    }

    #[test]
    fn test_cyclic_type() {
        let mut doc = Document::new(header());
        let looped = doc.make_type_element("loop");
        doc.add_located_component(Some(looped), "loop", None);
        doc.add_located_component(None, "loop", Some("ids"));
        doc.add_detector_ids("ids", &IdList::dense(0, 0));
        assert!(matches!(doc.validate(), Err(ValidationError::CyclicType(_))));
    }

    #[test]
    fn test_monitors_count() {
        let mut doc = Document::new(header());
        doc.add_monitors(&[4.83, 1.5], &["monitor2", "monitor3"], false);
        doc.add_dummy_monitor(0.01, 0.03);
        doc.add_monitor_ids(&[-2, -3]);
        assert_eq!(doc.validate().unwrap(), 2);
        let xml = doc.to_xml_string().unwrap();
        assert!(xml.contains(r#"<component type="monitor" mark-as="monitor">"#));
        assert!(xml.contains(r#"<id val="-2"/>"#));
    }

    #[test]
    fn test_location_rotations_nest() {
        let mut doc = Document::new(header());
        let root = doc.root();
        let location = doc.add_location(
            root,
            [0.0, 0.0, 1.0],
            Rot {
                y: Some(10.0),
                z: Some(20.0),
                x: None,
            },
            Some("here"),
        );
        let tree = doc.tree();
        let rot_y = tree.find_child(location, "rot").unwrap();
        assert_eq!(tree.attribute(rot_y, "axis-y"), Some("1"));
        let rot_z = tree.find_child(rot_y, "rot").unwrap();
        assert_eq!(tree.attribute(rot_z, "val"), Some("20.0"));
        assert!(tree.find_child(rot_z, "rot").is_none());
    }

    #[test]
    fn test_unused_idlist() {
        let mut doc = small_detector(&IdList::dense(0, 7));
        doc.add_detector_ids("orphan", &IdList::dense(100, 107));
        match doc.validate() {
            Err(ValidationError::UnusedIdList(name)) => assert_eq!(name, "orphan"),
            other => panic!("expected UnusedIdList, got {other:?}"),
        }
    }

    #[test]
    fn test_write_is_atomic_and_deterministic() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("TEST_Definition.xml");
        let doc = small_detector(&IdList::dense(0, 7));
        let size = doc.write(&path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first.len() as u64, size);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        small_detector(&IdList::dense(0, 7)).write(&path).unwrap();
        assert_eq!(first, std::fs::read_to_string(&path).unwrap());

        let bad_path = dir.path().join("BAD_Definition.xml");
        assert!(small_detector(&IdList::dense(0, 3)).write(&bad_path).is_err());
        assert!(!bad_path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_move_leaves_no_temporary_file() {
        let dir = tempfile::TempDir::new().unwrap();
        // a non-empty directory cannot be replaced by a file
        let occupied = dir.path().join("TEST_Definition.xml");
        std::fs::create_dir(&occupied).unwrap();
        std::fs::write(occupied.join("keep"), b"keep").unwrap();

        let result = small_detector(&IdList::dense(0, 7)).write(&occupied);
        assert!(matches!(result, Err(IdfWriterError::PersistError(_))));
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries, vec![occupied.clone()]);
        assert!(occupied.join("keep").exists());
    }
}
