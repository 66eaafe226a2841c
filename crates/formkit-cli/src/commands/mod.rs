pub mod fields;
pub mod forms;
pub mod init;
pub mod misc;
pub mod module_config;
pub mod rules;
pub mod templates;
pub mod values;
