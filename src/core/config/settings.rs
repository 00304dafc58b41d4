use super::parsing::{
    env_flag, env_optional, env_or_default, looks_like_email, parse_bool, parse_cors_origins,
    parse_environment, parse_non_negative_i32, parse_u16, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, MailSettings,
    RewardSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings,
    Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("CLASSHUB_HOST", "0.0.0.0");
        let port = env_or_default("CLASSHUB_PORT", "8000");

        let environment = parse_environment(
            env_optional("CLASSHUB_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("CLASSHUB_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "ClassHub API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "classhub");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "classhub_db");
        let database_url = env_optional("DATABASE_URL");

        let mail = MailSettings {
            enabled: env_flag("SMTP_ENABLED", false),
            smtp_host: env_or_default("SMTP_HOST", "localhost"),
            smtp_port: parse_u16("SMTP_PORT", env_or_default("SMTP_PORT", "587"))?,
            smtp_username: env_or_default("SMTP_USERNAME", ""),
            smtp_password: env_or_default("SMTP_PASSWORD", ""),
            starttls: env_flag("SMTP_STARTTLS", true),
            from_address: env_or_default("EMAIL_FROM_ADDRESS", "no-reply@classhub.local"),
            from_name: env_or_default("EMAIL_FROM_NAME", "ClassHub"),
            frontend_url: env_or_default("FRONTEND_URL", "http://localhost:5173"),
        };

        let submission_reward_tokens = parse_non_negative_i32(
            "SUBMISSION_REWARD_TOKENS",
            env_or_default("SUBMISSION_REWARD_TOKENS", "10"),
        )?;

        let first_superuser_email =
            env_or_default("FIRST_SUPERUSER_EMAIL", "admin@classhub.local");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let log_level = env_or_default("CLASSHUB_LOG_LEVEL", "info");
        let json = env_flag("CLASSHUB_LOG_JSON", false);
        let prometheus_enabled = env_flag("PROMETHEUS_ENABLED", false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            mail,
            rewards: RewardSettings { submission_reward_tokens },
            admin: AdminSettings { first_superuser_email, first_superuser_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn mail(&self) -> &MailSettings {
        &self.mail
    }

    pub(crate) fn rewards(&self) -> &RewardSettings {
        &self.rewards
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !looks_like_email(&self.mail.from_address) {
            return Err(ConfigError::InvalidValue {
                field: "EMAIL_FROM_ADDRESS",
                value: self.mail.from_address.clone(),
            });
        }

        if self.mail.enabled && self.mail.smtp_host.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "SMTP_HOST",
                value: String::from("<empty>"),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }
        if self.mail.enabled
            && (self.mail.smtp_username.is_empty() || self.mail.smtp_password.is_empty())
        {
            return Err(ConfigError::MissingSecret("SMTP_USERNAME/SMTP_PASSWORD"));
        }

        Ok(())
    }
}

#[cfg(test)]
impl Settings {
    /// Deterministic settings that never touch the process environment.
    pub(crate) fn for_tests() -> Self {
        use super::types::Environment;

        Self {
            server: ServerSettings {
                host: ServerHost("127.0.0.1".to_string()),
                port: ServerPort(8000),
            },
            runtime: RuntimeSettings { environment: Environment::Test, strict_config: false },
            api: ApiSettings {
                project_name: "ClassHub API".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                api_v1_str: "/api/v1".to_string(),
            },
            security: SecuritySettings {
                secret_key: "test-secret".to_string(),
                access_token_expire_minutes: 60,
                algorithm: "HS256".to_string(),
            },
            cors: CorsSettings { origins: Vec::new() },
            database: DatabaseSettings {
                postgres_server: "localhost".to_string(),
                postgres_port: 5432,
                postgres_user: "classhub_test".to_string(),
                postgres_password: "classhub_test".to_string(),
                postgres_db: "classhub_test".to_string(),
                database_url: None,
            },
            mail: MailSettings {
                enabled: false,
                smtp_host: "localhost".to_string(),
                smtp_port: 1025,
                smtp_username: String::new(),
                smtp_password: String::new(),
                starttls: false,
                from_address: "no-reply@classhub.test".to_string(),
                from_name: "ClassHub".to_string(),
                frontend_url: "http://localhost:5173".to_string(),
            },
            rewards: RewardSettings { submission_reward_tokens: 10 },
            admin: AdminSettings {
                first_superuser_email: "admin@classhub.test".to_string(),
                first_superuser_password: String::new(),
            },
            telemetry: TelemetrySettings {
                log_level: "debug".to_string(),
                json: false,
                prometheus_enabled: false,
            },
        }
    }

    pub(crate) fn set_superuser_password(&mut self, password: &str) {
        self.admin.first_superuser_password = password.to_string();
    }
}
