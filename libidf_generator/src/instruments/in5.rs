//! IN5 at the ILL: a cylindrical bank of 384 tubes of 256 pixels at 4 m from
//! the sample. The tube positions do not follow a regular step, so they come
//! from a measured table of azimuthal angles.
use crate::error::InstrumentError;
use crate::geometry::{DefaultsOptions, Document, IdfHeader};
use crate::idlist::IdList;
use crate::placement::linspace;
use crate::xml_tree::float_attr;

pub const DETECTOR_IDLIST: &str = "detectors";

/// Azimuthal angle of every tube in degrees, from the smallest to the largest.
/// Tubes are numbered from the other end.
const AZIMUTHAL_ANGLES: [f64; 384] = [
    -11.9175, -11.5451, -11.1727, -10.8003, -10.4279, -10.0554, -9.68300, -9.31058,
    -8.93816, -8.56573, -8.19331, -7.82089, -7.44846, -7.07604, -6.70362, -6.33119,
    -5.95877, -5.58635, -5.21393, -4.84150, -4.46908, -4.09666, -3.72423, -3.35181,
    -2.97939, -2.60696, -2.23454, -1.86212, -1.48969, -1.11727, -0.744846, -0.372423,
    0.372423, 0.744847, 1.11727, 1.48969, 1.86212, 2.23454, 2.60696, 2.97939,
    3.35181, 3.72423, 4.09666, 4.46908, 4.84150, 5.21393, 5.58635, 5.95877,
    6.33119, 6.70362, 7.07604, 7.44846, 7.82089, 8.19331, 8.56573, 8.93816,
    9.31058, 9.68300, 10.0554, 10.4279, 10.8003, 11.1727, 11.5451, 11.9175,
    12.6624, 13.0348, 13.4072, 13.7797, 14.1521, 14.5245, 14.8969, 15.2694,
    15.6418, 16.0142, 16.3866, 16.7590, 17.1315, 17.5039, 17.8763, 18.2487,
    18.6212, 18.9936, 19.3660, 19.7384, 20.1109, 20.4833, 20.8557, 21.2281,
    21.6005, 21.9730, 22.3454, 22.7178, 23.0902, 23.4627, 23.8351, 24.2075,
    24.9524, 25.3248, 25.6972, 26.0696, 26.4420, 26.8145, 27.1869, 27.5593,
    27.9317, 28.3042, 28.6766, 29.0490, 29.4214, 29.7939, 30.1663, 30.5387,
    30.9111, 31.2836, 31.6560, 32.0284, 32.4008, 32.7732, 33.1457, 33.5181,
    33.8905, 34.2629, 34.6354, 35.0078, 35.3802, 35.7526, 36.1251, 36.4975,
    37.2423, 37.6147, 37.9872, 38.3596, 38.7320, 39.1044, 39.4769, 39.8493,
    40.2217, 40.5941, 40.9666, 41.3390, 41.7114, 42.0838, 42.4562, 42.8287,
    43.2011, 43.5735, 43.9459, 44.3184, 44.6908, 45.0632, 45.4356, 45.8081,
    46.1805, 46.5529, 46.9253, 47.2978, 47.6702, 48.0426, 48.4150, 48.7874,
    49.5323, 49.9047, 50.2771, 50.6496, 51.0220, 51.3944, 51.7668, 52.1393,
    52.5117, 52.8841, 53.2565, 53.6289, 54.0014, 54.3738, 54.7462, 55.1186,
    55.4911, 55.8635, 56.2359, 56.6083, 56.9808, 57.3532, 57.7256, 58.0980,
    58.4704, 58.8429, 59.2153, 59.5877, 59.9601, 60.3326, 60.7050, 61.0774,
    61.8223, 62.1947, 62.5671, 62.9395, 63.3120, 63.6844, 64.0568, 64.4292,
    64.8017, 65.1741, 65.5465, 65.9189, 66.2913, 66.6638, 67.0362, 67.4086,
    67.7810, 68.1535, 68.5259, 68.8983, 69.2707, 69.6432, 70.0156, 70.3880,
    70.7604, 71.1328, 71.5053, 71.8777, 72.2501, 72.6225, 72.9950, 73.3674,
    74.1122, 74.4846, 74.8571, 75.2295, 75.6019, 75.9743, 76.3468, 76.7192,
    77.0916, 77.4640, 77.8365, 78.2089, 78.5813, 78.9537, 79.3262, 79.6986,
    80.0710, 80.4434, 80.8158, 81.1883, 81.5607, 81.9331, 82.3055, 82.6780,
    83.0504, 83.4228, 83.7952, 84.1677, 84.5401, 84.9125, 85.2849, 85.6573,
    86.4022, 86.7746, 87.1470, 87.5195, 87.8919, 88.2643, 88.6367, 89.0092,
    89.3816, 89.7540, 90.1264, 90.4989, 90.8713, 91.2437, 91.6161, 91.9885,
    92.3610, 92.7334, 93.1058, 93.4782, 93.8507, 94.2231, 94.5955, 94.9679,
    95.3404, 95.7128, 96.0852, 96.4576, 96.8300, 97.2025, 97.5749, 97.9473,
    98.6922, 99.0646, 99.4370, 99.8094, 100.182, 100.554, 100.927, 101.299,
    101.672, 102.044, 102.416, 102.789, 103.161, 103.534, 103.906, 104.279,
    104.651, 105.023, 105.396, 105.768, 106.141, 106.513, 106.885, 107.258,
    107.630, 108.003, 108.375, 108.748, 109.120, 109.492, 109.865, 110.237,
    110.982, 111.355, 111.727, 112.099, 112.472, 112.844, 113.217, 113.589,
    113.962, 114.334, 114.706, 115.079, 115.451, 115.824, 116.196, 116.568,
    116.941, 117.313, 117.686, 118.058, 118.431, 118.803, 119.175, 119.548,
    119.920, 120.293, 120.665, 121.038, 121.410, 121.782, 122.155, 122.527,
    123.272, 123.645, 124.017, 124.389, 124.762, 125.134, 125.507, 125.879,
    126.251, 126.624, 126.996, 127.369, 127.741, 128.114, 128.486, 128.858,
    129.231, 129.603, 129.976, 130.348, 130.721, 131.093, 131.465, 131.838,
    132.210, 132.583, 132.955, 133.328, 133.700, 134.072, 134.445, 134.817,
];

#[derive(Debug, Clone, PartialEq)]
pub struct In5Spec {
    pub instrument_name: String,
    pub comment: String,
    pub valid_from: String,
    pub radius: f64,
    pub pixels_per_tube: usize,
    /// Active height of a tube
    pub tube_height: f64,
    /// Pixels masked at the top of each tube
    pub removed_pixels_top: usize,
    /// Pixels masked at the bottom of each tube
    pub removed_pixels_bottom: usize,
    /// One inch tubes with 0.5 mm walls
    pub pixel_radius: f64,
    pub first_detector_id: i64,
    pub chopper_z: f64,
    pub monitor_z: f64,
    pub monitor_id: i64,
}

impl Default for In5Spec {
    fn default() -> Self {
        Self {
            instrument_name: String::from("IN5"),
            comment: String::from(
                "This is the instrument definition file of the IN5 spectrometer at the ILL.",
            ),
            valid_from: String::from("1900-01-31 23:59:59"),
            radius: 4.0,
            pixels_per_tube: 256,
            tube_height: 2.95,
            removed_pixels_top: 8,
            removed_pixels_bottom: 7,
            pixel_radius: (0.0254 - 0.001) / 2.0,
            first_detector_id: 1,
            chopper_z: -2.10945,
            monitor_z: -0.5,
            monitor_id: 100_000,
        }
    }
}

impl In5Spec {
    /// Height of one pixel; the masked pixels do not cover the active height
    pub fn pixel_step(&self) -> f64 {
        let active = self.pixels_per_tube - self.removed_pixels_top - self.removed_pixels_bottom;
        self.tube_height / active as f64
    }

    pub fn total_tube_height(&self) -> f64 {
        self.pixel_step() * self.pixels_per_tube as f64
    }

    pub fn n_tubes(&self) -> usize {
        AZIMUTHAL_ANGLES.len()
    }

    pub fn total_pixels(&self) -> i64 {
        (self.n_tubes() * self.pixels_per_tube) as i64
    }

    pub fn filename(&self) -> String {
        format!("{}_Definition.xml", self.instrument_name)
    }
}

/// Tube angles in numbering order
pub fn tube_angles() -> impl Iterator<Item = f64> {
    AZIMUTHAL_ANGLES.into_iter().rev()
}

pub fn build(spec: &In5Spec, last_modified: Option<&str>) -> Result<Document, InstrumentError> {
    let header = IdfHeader::new(&spec.instrument_name, &spec.valid_from)
        .with_comment(&spec.comment)
        .with_last_modified(last_modified);
    let mut doc = Document::new(header);
    doc.add_sns_defaults(&DefaultsOptions {
        theta_sign_axis: Some(String::from("x")),
        ..Default::default()
    });
    doc.add_component_ill("frame-overlap_chopper", [0.0, 0.0, spec.chopper_z], Some("Source"));
    doc.add_component_ill("sample-position", [0.0; 3], Some("SamplePos"));
    doc.add_monitors(&[spec.monitor_z], &["monitor"], false);
    doc.add_dummy_monitor(0.01, 0.03);
    doc.add_monitor_ids(&[spec.monitor_id]);

    let step = spec.pixel_step();
    doc.add_cylinder_pixel(
        "standard_pixel",
        [0.0, -step / 2.0, 0.0],
        [0.0, 1.0, 0.0],
        spec.pixel_radius,
        step,
        "detector",
        "pixel_shape",
    );

    let bank = doc.make_type_element("bank_uniq");
    let tubes = doc.add_component(Some(bank), "standard_tube", None, None);
    for (index, angle) in tube_angles().enumerate() {
        doc.tree_mut()
            .append(tubes, "location")
            .attr("r", float_attr(spec.radius))
            .attr("t", float_attr(angle))
            .attr("rot", float_attr(angle))
            .attr("axis-x", "0.0")
            .attr("axis-y", "1.0")
            .attr("axis-z", "0.0")
            .attr("name", format!("tube_{}", index + 1));
    }

    let tube = doc.make_type_element("standard_tube");
    doc.tree_mut().set_attribute(tube, "outline", "yes");
    let pixels = doc.add_component(Some(tube), "standard_pixel", None, None);
    let half_height = spec.total_tube_height() / 2.0;
    for y in linspace(-half_height, half_height, spec.pixels_per_tube) {
        doc.tree_mut()
            .append(pixels, "location")
            .attr("y", float_attr(y));
    }

    doc.add_located_component(None, "detectors", Some(DETECTOR_IDLIST));
    let detectors = doc.make_type_element("detectors");
    doc.add_located_component(Some(detectors), "bank_uniq", None);
    let first = spec.first_detector_id;
    doc.add_detector_ids(
        DETECTOR_IDLIST,
        &IdList::dense(first, first + spec.total_pixels() - 1),
    );

    doc.validate()?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAMP: Option<&str> = Some("2015-01-01 00:00:00.000000");

    #[test]
    fn test_table_is_sorted() {
        assert_eq!(AZIMUTHAL_ANGLES.len(), 384);
        for pair in AZIMUTHAL_ANGLES.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        let first = tube_angles().next().unwrap();
        assert_eq!(first, 134.817);
    }

    #[test]
    fn test_pixel_step() {
        let spec = In5Spec::default();
        assert!((spec.pixel_step() - 2.95 / 241.0).abs() < 1e-15);
        assert!((spec.total_tube_height() - 256.0 * 2.95 / 241.0).abs() < 1e-12);
    }

    #[test]
    fn test_build() {
        let spec = In5Spec::default();
        let doc = build(&spec, STAMP).unwrap();
        assert_eq!(doc.validate().unwrap(), 98304 + 1);
        let xml = doc.to_xml_string().unwrap();
        assert!(xml.contains(r#"<id start="1" end="98304"/>"#));
        assert!(xml.contains(r#"<theta-sign axis="x"/>"#));
        assert!(xml.contains(r#"<type name="frame-overlap_chopper" is="Source"/>"#));
        assert!(xml.contains(r#"<id val="100000"/>"#));
        assert!(xml.contains(r#"t="134.817" rot="134.817""#));
        assert!(xml.contains(r#"name="tube_384""#));
        assert_eq!(spec.filename(), "IN5_Definition.xml");
    }
}
