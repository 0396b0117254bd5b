mod config;
mod validation;

pub use config::{
    COOKIE_FILE, CONFIG_FILE, ClientConfig, ConfigError, ENV_API_PREFIX, ENV_BASE_URL,
    ENV_TIMEOUT_MS, SERVER_COOKIE_FILE, default_config_dir, load_config, load_config_file,
    write_default_config,
};
pub use validation::{
    FieldDescriptor, FieldRule, FormSchema, FormValues, ValidationErrors, coerce_number,
};
