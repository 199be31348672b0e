use super::SyncSettings;
use directories_next::ProjectDirs;
use std::fs;
use std::io::{self, BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "TableSync";
const APPLICATION: &str = "tablesync";
const CONFIG_FILE: &str = "sync_settings.json";

pub fn get_config_path() -> io::Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION) {
        let config_dir = proj_dirs.config_dir();
        fs::create_dir_all(config_dir)?;
        Ok(config_dir.join(CONFIG_FILE))
    } else {
        Err(io::Error::new(ErrorKind::NotFound, "Could not determine project directories for sync settings."))
    }
}

/// Load settings from `path`, or from the per-user config file when no path
/// is given. A missing file yields defaults. Environment overrides apply last.
pub fn load_settings(path: Option<&Path>) -> io::Result<SyncSettings> {
    let _ = dotenvy::dotenv();
    let config_file = match path {
        Some(p) => p.to_path_buf(),
        None => get_config_path()?,
    };
    let mut settings = load_settings_from_file(&config_file)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn load_settings_from_file(config_file: &Path) -> io::Result<SyncSettings> {
    info!("SyncSettings: Attempting to load settings from {:?}", config_file);
    match fs::File::open(config_file) {
        Ok(file) => {
            let reader = BufReader::new(file);
            match serde_json::from_reader(reader) {
                Ok(settings) => {
                    info!("SyncSettings: Successfully deserialized settings.");
                    Ok(settings)
                }
                Err(e) => {
                    error!("SyncSettings: Failed to parse settings file {:?}: {}", config_file, e);
                    Err(io::Error::new(ErrorKind::InvalidData, format!("Failed to parse settings file: {}", e)))
                }
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("SyncSettings: Settings file not found at {:?}. Returning default.", config_file);
            Ok(SyncSettings::default())
        }
        Err(e) => {
            error!("SyncSettings: Failed to open settings file {:?}: {}", config_file, e);
            Err(e)
        }
    }
}

pub fn save_settings_to_file(settings: &SyncSettings, config_file: &Path) -> io::Result<()> {
    info!("SyncSettings: Saving settings to {:?}", config_file);
    let file = fs::File::create(config_file)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, settings).map_err(|e| {
        error!("SyncSettings: Failed to serialize settings to {:?}: {}", config_file, e);
        io::Error::new(ErrorKind::Other, e)
    })?;
    Ok(())
}

fn apply_env_overrides(settings: &mut SyncSettings, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(table_id) = non_empty("TABLESYNC_TABLE_ID") {
        debug!("SyncSettings: table_id overridden from environment");
        settings.table_id = table_id;
    }
    if let Some(key) = non_empty("TABLESYNC_API_KEY") {
        settings.api_key = Some(key);
    }
    if let Some(key) = non_empty("TABLESYNC_GEOCODE_KEY") {
        settings.geocode_api_key = Some(key);
    }
}
