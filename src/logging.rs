use crate::report::{SecurityReport, Severity};
use crate::{COMMAND_TARGET, CONSOLE_TARGET, Data, ERROR_TARGET, Error, SECURITY_TARGET};
use poise::{Context, FrameworkError};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::{LevelFilter, Targets},
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log directory name
pub const LOG_DIR: &str = "logs";
/// Command log file name
pub const COMMAND_LOG_FILE: &str = "commands";
/// Security report log file name
pub const SECURITY_LOG_FILE: &str = "security";

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,serenity=error";

/// Initialize the logging system with console and file outputs
pub fn init() -> Result<(), Error> {
    if !Path::new(LOG_DIR).exists() {
        std::fs::create_dir_all(LOG_DIR)?;
    }

    let command_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, COMMAND_LOG_FILE);
    let security_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, SECURITY_LOG_FILE);

    // Human-readable console output
    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(true);

    let command_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(command_file);

    // Security reports only, one JSON record per report
    let security_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(security_file)
        .with_filter(Targets::new().with_target(SECURITY_TARGET, LevelFilter::INFO));

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(DEFAULT_FILTER)?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(command_layer)
        .with(security_layer)
        .init();

    info!("Logging system initialized");
    Ok(())
}

// Store command start time in the context data
thread_local! {
    static COMMAND_START_TIME: std::cell::RefCell<Option<Instant>> = const { std::cell::RefCell::new(None) };
}

fn guild_label(guild_id: Option<poise::serenity_prelude::GuildId>) -> String {
    guild_id.map_or_else(|| "DM".to_string(), |id| id.get().to_string())
}

/// Log the start of a command execution (pre-command hook)
pub fn log_command_start(ctx: Context<'_, Data, Error>) {
    COMMAND_START_TIME.with(|cell| {
        *cell.borrow_mut() = Some(Instant::now());
    });

    let args = if ctx.command().parameters.is_empty() {
        String::new()
    } else {
        format!("{:?}", ctx.invocation_string())
    };

    info!(
        target: COMMAND_TARGET,
        command = %ctx.command().qualified_name,
        guild_id = %guild_label(ctx.guild_id()),
        user_id = %ctx.author().id,
        arguments = %args,
        event = "start",
        "Command execution started"
    );
}

/// Log the end of a command execution (post-command hook)
pub fn log_command_end(ctx: Context<'_, Data, Error>) {
    let duration =
        COMMAND_START_TIME.with(|cell| cell.borrow_mut().take().map(|start| start.elapsed()));
    let duration_ms = u64::try_from(duration.map_or(0, |d| d.as_millis())).unwrap_or_default();

    info!(
        target: COMMAND_TARGET,
        command = %ctx.command().qualified_name,
        guild_id = %guild_label(ctx.guild_id()),
        user_id = %ctx.author().id,
        duration_ms = duration_ms,
        event = "end",
        "Command execution completed"
    );
}

/// Log errors that occur during command execution
pub fn log_command_error(error: &FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Command { error, ctx, .. } => {
            error!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                guild_id = %guild_label(ctx.guild_id()),
                user_id = %ctx.author().id,
                error = %error,
                "Command error"
            );
        }
        FrameworkError::CommandCheckFailed { error, ctx, .. } => {
            let error_msg = error
                .as_ref()
                .map_or_else(|| "Check failed".to_string(), ToString::to_string);

            warn!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                guild_id = %guild_label(ctx.guild_id()),
                user_id = %ctx.author().id,
                error = %error_msg,
                "Command check failed"
            );
        }
        err => {
            error!(
                target: ERROR_TARGET,
                error = ?err,
                "Other framework error"
            );
        }
    }
}

/// Record a security report on the security target.
///
/// The level follows the report severity so a plain level filter can drop
/// informational creation reports.
pub fn log_report(report: &SecurityReport) {
    let fields = report
        .fields
        .iter()
        .map(|field| format!("{}={}", field.name, field.value))
        .collect::<Vec<_>>()
        .join("; ");

    match report.severity {
        Severity::Info => info!(
            target: SECURITY_TARGET,
            guild_id = %report.guild_id,
            incident_id = %report.incident_id,
            severity = %report.severity,
            fields = %fields,
            "{}", report.title
        ),
        Severity::Warn => warn!(
            target: SECURITY_TARGET,
            guild_id = %report.guild_id,
            incident_id = %report.incident_id,
            severity = %report.severity,
            fields = %fields,
            "{}", report.title
        ),
        Severity::Danger => error!(
            target: SECURITY_TARGET,
            guild_id = %report.guild_id,
            incident_id = %report.incident_id,
            severity = %report.severity,
            fields = %fields,
            "{}", report.title
        ),
    }
}

pub fn log_console(message: impl AsRef<str>) {
    info!(
        target: CONSOLE_TARGET,
        message = %message.as_ref(),
        event = "console",
    );
}
