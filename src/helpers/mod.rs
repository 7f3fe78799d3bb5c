pub mod domain;
pub mod download;
pub mod media_type;
pub mod sanitize;
pub mod temp_dir;
