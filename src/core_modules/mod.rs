pub mod artifacts;
pub mod blob_detector;
pub mod chunk;
pub mod classifier;
pub mod color_histogram;
pub mod color_space;
pub mod decoder;
pub mod feature_extractor;
pub mod filters;
pub mod grid_manager;
pub mod moment;
pub mod preprocessor;
pub mod region;
pub mod registry;
pub mod segmentation;
pub mod shape_descriptor;
pub mod texture;
pub mod utils;
