use std::path::PathBuf;

use super::config::Config;
use super::error::{InstrumentError, ProcessorError};
use super::geometry::Document;
use super::instruments::basis::{self, BasisSpec, Reflection};
use super::instruments::biosans::{self, BiosansSpec};
use super::instruments::biosans_wing::{self, WingDetectorSpec};
use super::instruments::in5::{self, In5Spec};
use super::instruments::vulcan::{self, VulcanSpec};
use super::instruments::InstrumentKind;

/// Write a finished document into the output directory
fn write_document(
    config: &Config,
    doc: &Document,
    file_name: &str,
) -> Result<(PathBuf, u64), ProcessorError> {
    let path = config.get_output_file_name(file_name)?;
    let size = doc.write(&path).map_err(InstrumentError::from)?;
    Ok((path, size))
}

/// Build and write every file of one instrument.
///
/// Most instruments produce a single file; BASIS produces one per analyser reflection.
/// Returns the written paths in order.
pub fn process_instrument(
    config: &Config,
    kind: InstrumentKind,
) -> Result<Vec<PathBuf>, ProcessorError> {
    let last_modified = config.last_modified();
    let mut written = Vec::new();
    let mut total_size = 0;
    match kind {
        InstrumentKind::Biosans => {
            let spec = BiosansSpec::default();
            let doc = biosans::build(&spec, last_modified)?;
            let (path, size) = write_document(config, &doc, &spec.filename()?)?;
            written.push(path);
            total_size += size;
        }
        InstrumentKind::BiosansWing => {
            let spec = WingDetectorSpec::default();
            let doc = biosans_wing::build(&spec, last_modified)?;
            let (path, size) = write_document(config, &doc, &spec.filename()?)?;
            written.push(path);
            total_size += size;
        }
        InstrumentKind::In5 => {
            let spec = In5Spec::default();
            let doc = in5::build(&spec, last_modified)?;
            let (path, size) = write_document(config, &doc, &spec.filename())?;
            written.push(path);
            total_size += size;
        }
        InstrumentKind::Basis => {
            let spec = BasisSpec::default();
            for reflection in Reflection::all().iter() {
                let nexus_path = config.get_basis_nexus_path(reflection)?;
                let doc = basis::build_from_nexus(&spec, reflection, nexus_path, last_modified)?;
                let (path, size) = write_document(config, &doc, &reflection.filename())?;
                written.push(path);
                total_size += size;
            }
        }
        InstrumentKind::Vulcan => {
            let spec = VulcanSpec::default();
            let survey_path = config.get_vulcan_survey_path()?;
            let doc = vulcan::build_from_survey(&spec, survey_path, last_modified)?;
            let (path, size) = write_document(config, &doc, &spec.filename())?;
            written.push(path);
            total_size += size;
        }
    }
    spdlog::info!(
        "Finished {}: {} file(s), {}",
        kind,
        written.len(),
        human_bytes::human_bytes(total_size as f64)
    );
    Ok(written)
}

/// The main loop of idf_generator.
///
/// Runs every instrument selected in the config in order and stops at the first failure.
pub fn process(config: &Config) -> Result<Vec<PathBuf>, ProcessorError> {
    let mut written = Vec::new();
    for kind in config.instruments.iter() {
        spdlog::info!("Generating {}...", kind);
        written.extend(process_instrument(config, *kind)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use tempfile::TempDir;

    #[test]
    fn test_process_writes_selected_instruments() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            output_path: dir.path().to_path_buf(),
            instruments: vec![InstrumentKind::In5, InstrumentKind::BiosansWing],
            last_modified: Some(String::from("2020-01-01 00:00:00.000000")),
            ..Default::default()
        };
        let written = process(&config).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("IN5_Definition.xml"),
                dir.path().join("BIOSANSWING_Definition_2016_2100.xml"),
            ]
        );
        let text = std::fs::read_to_string(&written[0]).unwrap();
        assert!(text.starts_with("<?xml version='1.0' encoding='UTF-8'?>"));
        assert!(text.contains(r#"last-modified="2020-01-01 00:00:00.000000""#));
    }

    #[test]
    fn test_process_requires_inputs() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            output_path: dir.path().to_path_buf(),
            instruments: vec![InstrumentKind::Vulcan],
            ..Default::default()
        };
        assert!(matches!(
            process(&config),
            Err(ProcessorError::ConfigError(ConfigError::MissingInput(_)))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
