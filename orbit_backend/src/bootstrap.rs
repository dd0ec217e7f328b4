use crate::config::OrbitConfig;
use crate::database::Database;
use anyhow::Result;
use std::fs;

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    pub database_initialized: bool,
    pub database: Database,
}

pub fn initialize(config: &OrbitConfig) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    create_dir_if_missing(&config.paths.data_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.logs_dir, &mut directories_created)?;

    let database = Database::connect(&config.paths)?;
    let database_initialized = database.ensure_migrations()?;

    Ok(BootstrapResources {
        directories_created,
        database_initialized,
        database,
    })
}

fn create_dir_if_missing(path: &std::path::Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        created.push(path.display().to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrbitConfig, OrbitPaths, ProximityConfig};
    use tempfile::tempdir;

    #[test]
    fn initialize_creates_directories_and_database() {
        let dir = tempdir().expect("tempdir");
        let paths = OrbitPaths::from_base_dir(dir.path()).expect("paths");
        let config = OrbitConfig::new(0, paths, ProximityConfig::default());

        let resources = initialize(&config).expect("bootstrap");
        assert!(resources.database_initialized);
        assert!(config.paths.db_path.exists());
        assert!(config.paths.logs_dir.exists());

        let again = initialize(&config).expect("second bootstrap");
        assert!(!again.database_initialized);
        assert!(again.directories_created.is_empty());
    }
}
