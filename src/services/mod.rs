pub mod analysis;
pub mod csv_loader;
pub mod dataset_store;
