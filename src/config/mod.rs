use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub scheduling: SchedulingConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Запасные значения планирования: применяются, пока у студии нет собственной
// строки настроек, плюс окно "недавно завершённых" в расписании
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    pub fallback_session_length_hours: i32,
    pub fallback_buffer_minutes: i32,
    pub recent_window_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "studio_system=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            scheduling: SchedulingConfig {
                fallback_session_length_hours: env::var("DEFAULT_SESSION_LENGTH_HOURS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .expect("DEFAULT_SESSION_LENGTH_HOURS must be a valid number"),
                fallback_buffer_minutes: env::var("DEFAULT_BUFFER_MINUTES")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()
                    .expect("DEFAULT_BUFFER_MINUTES must be a valid number"),
                recent_window_days: env::var("RECENT_WINDOW_DAYS")
                    .unwrap_or_else(|_| "14".to_string())
                    .parse()
                    .expect("RECENT_WINDOW_DAYS must be a valid number"),
            },
        }
    }
}
