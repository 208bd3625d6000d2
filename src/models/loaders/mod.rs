pub mod toml_loader;

pub use toml_loader::{load_all_project_files, load_project_file};
