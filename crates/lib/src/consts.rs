pub const APP_NAME: &str = "deployer";

/// Directory under the artifacts root that receives injected-driver metadata.
pub const INJECTED_DRIVERS_DIR: &str = "Injected Drivers";

/// Directory under the artifacts root that receives downloaded repositories.
pub const REPOSITORIES_DIR: &str = "Repositories";

pub const DEFAULT_BRANCH: &str = "master";
