//! # idf_generator
//!
//! idf_generator writes Instrument Definition Files (IDFs) for neutron scattering
//! instruments, written in Rust. An IDF is an XML document describing where every
//! source, sample, monitor and detector pixel of an instrument sits, how pixels are
//! grouped into tubes, packs, panels and banks, and which integer id addresses each
//! pixel. The files are consumed by data reduction software; idf_generator only
//! produces them.
//!
//! ## Installation
//!
//! The only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### HDF5
//!
//! The BASIS geometry reads its calibration from an event NeXus file, so HDF5 must be
//! installed. Typically this will be installed using a package manager (homebrew, apt,
//! etc), and the Rust libraries will auto detect the location of the HDF install. If it
//! lives in a custom location, write the following snippet into the file
//! `.cargo/config.toml` in the idf_generator repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./idf_generator_cli` from the
//! top level idf_generator repository.
//!
//! ## Instruments
//!
//! - BIOSANS: flat main detector and curved wing detector, both made of double panels
//! of eight-packs
//! - BIOSANSWING: the legacy BIOSANS geometry with only the wing detector
//! - IN5: 384 tubes on a cylinder, positioned from a fixed table of angles
//! - BASIS: indirect geometry, one file per analyser reflection, calibrated from a
//! NeXus file
//! - VULCAN: banks of interleaved eight-packs positioned from a survey of the corners
//!
//! Every instrument has a driver in [`instruments`] holding its layout in a parameter
//! record and a `build` function returning a validated [`geometry::Document`].
//!
//! ## Configuration
//!
//! The CLI is driven by a YAML configuration:
//!
//! ```yml
//! output_path: None
//! instruments:
//! - Biosans
//! - BiosansWing
//! - In5
//! - Basis
//! - Vulcan
//! vulcan_survey_path: null
//! basis_nexus_111: null
//! basis_nexus_311: null
//! last_modified: null
//! ```
//!
//! - `output_path`: directory the definition files are written to. Must exist.
//! - `instruments`: the instruments to generate, in order
//! - `vulcan_survey_path`: comma separated survey of the VULCAN banks. Required for VULCAN.
//! - `basis_nexus_111`, `basis_nexus_311`: event NeXus files holding the calibration for
//! the Si111 (also used for the generic and Si333 files) and Si311 reflections. Required
//! for BASIS.
//! - `last_modified`: fixed `last-modified` stamp. When null the current time is used,
//! so two runs only produce identical files when this is set.
//!
//! ## Output
//!
//! Every file is validated before it is written: each component type must be declared,
//! each idlist a component refers to must exist, and the number of pixels a component
//! places must equal the number of ids in its idlist. Files are written to a temporary
//! path first and renamed, so a failed run never leaves a partial file behind.
//!
//! File names follow `{INSTRUMENT}_Definition_{from}_{to}.xml`, where `from` and `to`
//! are the validity dates truncated after the first differing year, month or day.
pub mod config;
pub mod error;
pub mod filename;
pub mod geometry;
pub mod idlist;
pub mod instruments;
pub mod nexus;
pub mod panels;
pub mod placement;
pub mod process;
pub mod rectangle;
pub mod survey;
pub mod xml_tree;
