//! This module is responsible for preparing the resources needed by the application, such as directories and configurations.
//!

pub mod resource {
    use super::MutascanProperty;
    use crate::module::error::Result;

    /// Initialize the application resources and return a MutascanProperty instance containing paths and configurations.
    ///
    /// The config is read from `data_dir` first, since it decides where the cache root lives.
    pub fn init(data_dir: &str) -> Result<MutascanProperty> {
        crate::module::util::common::create_directory(data_dir)?;

        // Logging isn't up yet, so remember whether the default config gets written
        let conf_created = !std::path::Path::new(data_dir)
            .join(crate::module::define::path::CONF_FILE)
            .is_file();

        // Load the app configuration file by calling the load function from the toml submodule
        let conf = crate::module::util::conf::toml::load(data_dir)?;

        // Prepare the app data directory and the cache root
        let paths =
            crate::module::util::path::dir::create_app_sub_dir(data_dir, &conf.output.cache_dir)?;

        Ok(MutascanProperty {
            path: paths,
            conf,
            conf_created,
        })
    }
}

/// This struct represents the properties of the app, such as paths and configurations.
///
#[derive(Debug, Clone)]
pub struct MutascanProperty {
    pub path: crate::module::util::path::MutascanPath, // The paths of the app resources
    pub conf: crate::module::util::conf::Config,       // The configurations of the app
    pub conf_created: bool,                            // Whether init wrote the default conf.toml
}
