use std::{
    env, fs, io,
    net::SocketAddr,
    panic,
    path::{Path, PathBuf},
    str::FromStr,
    thread,
    time::{Duration, SystemTime},
};
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

const DEFAULT_LOG_DIR: &str = "/var/log/powerwatch";

/// Keeps the non-blocking file writer alive for the lifetime of the service.
pub struct TracingGuards {
    _file_guard: Option<WorkerGuard>,
}

/// Where and for how long service logs are kept.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub root: PathBuf,
    pub retention: Duration,
    pub cleanup_interval: Duration,
}

impl LogSettings {
    pub fn from_env(service_name: &str) -> Self {
        let log_dir = env_or("LOG_DIR", DEFAULT_LOG_DIR.to_string());
        let retention_days = env_or("LOG_RETENTION_DAYS", 14u64);
        let cleanup_minutes = env_or("LOG_CLEANUP_INTERVAL_MINUTES", 360u64);
        Self {
            root: PathBuf::from(log_dir).join(service_name),
            retention: Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60)),
            cleanup_interval: Duration::from_secs(cleanup_minutes.saturating_mul(60)),
        }
    }
}

pub fn init_tracing(service_name: &str) -> TracingGuards {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let settings = LogSettings::from_env(service_name);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // A read-only or missing log volume degrades to stdout only.
    let file_writer = fs::create_dir_all(&settings.root)
        .ok()
        .and_then(|_| {
            panic::catch_unwind(|| {
                tracing_appender::rolling::daily(&settings.root, format!("{service_name}.log"))
            })
            .ok()
        })
        .map(tracing_appender::non_blocking);

    let file_guard = match file_writer {
        Some((writer, guard)) => {
            let subscriber = Registry::default()
                .with(filter)
                .with(stdout_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer));
            let _ = tracing::subscriber::set_global_default(subscriber);
            spawn_log_cleanup(settings);
            Some(guard)
        }
        None => {
            let subscriber = Registry::default().with(filter).with(stdout_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
            None
        }
    };

    TracingGuards {
        _file_guard: file_guard,
    }
}

pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

fn spawn_log_cleanup(settings: LogSettings) {
    if settings.retention.is_zero() || settings.cleanup_interval.is_zero() {
        return;
    }

    thread::spawn(move || loop {
        if let Some(cutoff) = SystemTime::now().checked_sub(settings.retention) {
            let removed = remove_logs_older_than(&settings.root, cutoff);
            if removed > 0 {
                tracing::info!(removed, root = %settings.root.display(), "old log files removed");
            }
        }
        thread::sleep(settings.cleanup_interval);
    });
}

/// Deletes files under `root` last modified before `cutoff` and returns how many went.
pub fn remove_logs_older_than(root: &Path, cutoff: SystemTime) -> usize {
    let Ok(entries) = fs::read_dir(root) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            removed += remove_logs_older_than(&path, cutoff);
            continue;
        }
        let modified = fs::metadata(&path).and_then(|metadata| metadata.modified());
        if matches!(modified, Ok(modified) if modified < cutoff) && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}

pub async fn bind_listener(port: u16) -> io::Result<TcpListener> {
    // Bind on all interfaces for container compatibility.
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr).await
}

pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(err) => {
                    tracing::warn!(error = %err, "sigterm handler unavailable");
                    let _ = ctrl_c.await;
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }

    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_missing_or_invalid() {
        assert_eq!(env_or("POWERWATCH_TEST_UNSET_KEY", 42u16), 42);
        env::set_var("POWERWATCH_TEST_BAD_PORT", "not-a-port");
        assert_eq!(env_or("POWERWATCH_TEST_BAD_PORT", 3000u16), 3000);
        env::set_var("POWERWATCH_TEST_GOOD_PORT", "8081");
        assert_eq!(env_or("POWERWATCH_TEST_GOOD_PORT", 3000u16), 8081);
    }

    #[test]
    fn oversized_retention_saturates() {
        env::set_var("LOG_RETENTION_DAYS", u64::MAX.to_string());
        env::set_var("LOG_CLEANUP_INTERVAL_MINUTES", u64::MAX.to_string());
        let settings = LogSettings::from_env("gateway-service");
        env::remove_var("LOG_RETENTION_DAYS");
        env::remove_var("LOG_CLEANUP_INTERVAL_MINUTES");

        assert_eq!(settings.retention, Duration::from_secs(u64::MAX));
        assert_eq!(settings.cleanup_interval, Duration::from_secs(u64::MAX));
        assert!(settings.root.ends_with("gateway-service"));
    }

    #[test]
    fn removes_only_files_older_than_cutoff() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("gateway-service");
        fs::create_dir_all(&nested).expect("nested dir");
        fs::write(nested.join("old.log"), b"old").expect("write old");

        let future = SystemTime::now() + Duration::from_secs(60);
        assert_eq!(remove_logs_older_than(dir.path(), future), 1);
        assert!(!nested.join("old.log").exists());

        fs::write(nested.join("fresh.log"), b"fresh").expect("write fresh");
        let past = SystemTime::now() - Duration::from_secs(60 * 60);
        assert_eq!(remove_logs_older_than(dir.path(), past), 0);
        assert!(nested.join("fresh.log").exists());
    }

    #[test]
    fn missing_log_root_removes_nothing() {
        let missing = Path::new("/nonexistent/powerwatch/logs");
        assert_eq!(remove_logs_older_than(missing, SystemTime::now()), 0);
    }
}
