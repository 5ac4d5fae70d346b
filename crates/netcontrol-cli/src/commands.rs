use std::path::Path;

use anyhow::{bail, Context, Result};
use netcontrol_core::auth::RegistrationForm;
use netcontrol_core::dashboard::{Notification, NotificationLevel, Outcome};
use netcontrol_core::models::DeviceStatus;
use netcontrol_core::offline::{CacheRequest, FetchOutcome, Registration};
use netcontrol_core::Dashboard;
use url::Url;

use crate::context::AppContext;

// ===== Output helpers =====

fn print_notification(n: &Notification) {
    match n.level {
        NotificationLevel::Success => println!("✓ {}", n.message),
        NotificationLevel::Warning => eprintln!("! {}", n.message),
        NotificationLevel::Danger => eprintln!("✗ {}", n.message),
    }
}

/// Print pending notifications and turn the outcome into a result.
fn finish(dashboard: &Dashboard, outcome: Outcome) -> Result<()> {
    for n in dashboard.drain_notifications() {
        print_notification(&n);
    }
    match outcome {
        Outcome::Completed => Ok(()),
        Outcome::Rejected => bail!("Nothing was changed"),
        Outcome::Failed => bail!("Request failed"),
        Outcome::SignedOut => bail!("Session was rejected and has been cleared. Run `netcontrol login`."),
        Outcome::Busy => bail!("Another operation is in progress"),
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

// ===== Account =====

pub async fn register(
    ctx: &AppContext,
    name: String,
    email: String,
    password: Option<String>,
) -> Result<()> {
    let (password, confirm_password) = match password {
        Some(p) => (p.clone(), p),
        None => (prompt_password("Password: ")?, prompt_password("Confirm password: ")?),
    };
    let form = RegistrationForm {
        name,
        email,
        password,
        confirm_password,
    };

    let session = ctx.session.register(&form).await?;
    ctx.remember_email(&session.user.email)?;
    println!("Registered and signed in as {} <{}>", session.user.name, session.user.email);
    Ok(())
}

pub async fn login(ctx: &AppContext, email: Option<String>, password: Option<String>) -> Result<()> {
    let Some(email) = email.or_else(|| ctx.config.last_email.clone()) else {
        bail!("No email given. Use --email.");
    };
    let password = match password {
        Some(p) => p,
        None => prompt_password(&format!("Password for {}: ", email))?,
    };

    let session = ctx.session.login(&email, &password).await?;
    ctx.remember_email(&session.user.email)?;
    println!("Signed in as {} <{}>", session.user.name, session.user.email);
    Ok(())
}

pub fn logout(ctx: &AppContext) -> Result<()> {
    ctx.session.logout();
    println!("Signed out");
    Ok(())
}

pub fn status(ctx: &AppContext) -> Result<()> {
    println!("Server:      {}", ctx.config.base_url);
    println!("Data source: {}", ctx.config.data_source);
    if ctx.session.is_authenticated() {
        match ctx.session.current_user() {
            Some(user) => println!("Signed in:   {} <{}>", user.name, user.email),
            None => println!("Signed in:   yes"),
        }
    } else {
        println!("Signed in:   no");
    }
    Ok(())
}

// ===== Devices =====

pub async fn devices(ctx: &AppContext) -> Result<()> {
    ctx.require_session()?;
    let dashboard = ctx.dashboard();
    let outcome = dashboard.load_devices().await;
    finish(&dashboard, outcome)?;

    let devices = dashboard.devices();
    if devices.is_empty() {
        println!("No devices found");
    }
    for device in devices {
        let status = match device.status {
            DeviceStatus::Connected => "connected",
            DeviceStatus::Blocked => "blocked",
        };
        println!("{:<16} {:<20} {}", device.ip, device.display_name(), status);
    }
    Ok(())
}

/// Block or unblock the device with `ip`; a device already in the wanted
/// state is left alone.
pub async fn set_device(ctx: &AppContext, ip: &str, block: bool) -> Result<()> {
    ctx.require_session()?;
    let dashboard = ctx.dashboard();
    let outcome = dashboard.load_devices().await;
    finish(&dashboard, outcome)?;

    let Some(device) = dashboard.devices().into_iter().find(|d| d.ip == ip) else {
        bail!("No device with IP {}", ip);
    };
    let wanted = if block {
        DeviceStatus::Blocked
    } else {
        DeviceStatus::Connected
    };
    if device.status == wanted {
        println!("Device {} is already {}", ip, if block { "blocked" } else { "connected" });
        return Ok(());
    }

    let outcome = dashboard.toggle_device(&device).await;
    finish(&dashboard, outcome)
}

// ===== Blocked Sites =====

pub async fn sites(ctx: &AppContext) -> Result<()> {
    ctx.require_session()?;
    let dashboard = ctx.dashboard();
    let outcome = dashboard.load_blocked_sites().await;
    finish(&dashboard, outcome)?;

    let sites = dashboard.blocked_sites();
    if sites.is_empty() {
        println!("No blocked sites");
    }
    for site in sites {
        println!("{}", site.url);
    }
    Ok(())
}

pub async fn block_site(ctx: &AppContext, url: &str) -> Result<()> {
    ctx.require_session()?;
    let dashboard = ctx.dashboard();
    let outcome = dashboard.add_blocked_site(url).await;
    finish(&dashboard, outcome)
}

pub async fn unblock_site(ctx: &AppContext, url: &str) -> Result<()> {
    ctx.require_session()?;
    let dashboard = ctx.dashboard();
    let outcome = dashboard.unblock_site(url).await;
    finish(&dashboard, outcome)
}

// ===== Schedules =====

pub async fn schedules(ctx: &AppContext) -> Result<()> {
    ctx.require_session()?;
    let dashboard = ctx.dashboard();
    let outcome = dashboard.load_schedules().await;
    finish(&dashboard, outcome)?;

    let schedules = dashboard.schedules();
    if schedules.is_empty() {
        println!("No schedules");
    }
    for s in schedules {
        println!("{} - {}  {}", s.start_time, s.end_time, s.action);
    }
    Ok(())
}

pub async fn save_schedule(ctx: &AppContext, start: &str, end: &str, action: &str) -> Result<()> {
    ctx.require_session()?;
    let dashboard = ctx.dashboard();
    let outcome = dashboard.save_schedule(start, end, action).await;
    finish(&dashboard, outcome)
}

// ===== Offline Cache =====

pub async fn offline_install(ctx: &AppContext, manifest: Option<&Path>) -> Result<()> {
    let worker = ctx.offline_worker(manifest)?;
    let registration = Registration::new();
    let report = registration.register(worker.clone()).await?;

    println!(
        "Installed {}: {} cached, {} failed",
        worker.cache_name(),
        report.cached.len(),
        report.failed.len()
    );
    for asset in &report.failed {
        eprintln!("  not cached: {}", asset);
    }
    Ok(())
}

pub async fn offline_get(ctx: &AppContext, target: &str, output: Option<&Path>, page: bool) -> Result<()> {
    let registration = ctx.offline_registration().await?;
    let url = ctx
        .config
        .base_url()?
        .join(target)
        .or_else(|_| Url::parse(target))
        .with_context(|| format!("Invalid URL: {}", target))?;
    let request = if page {
        CacheRequest::navigation(url.clone())
    } else {
        CacheRequest::get(url.clone())
    };

    match registration.fetch(&request).await? {
        FetchOutcome::Bypass => {
            println!("{} is not handled by the offline cache", url);
        }
        FetchOutcome::Respond(response, source) => {
            if let Some(path) = output {
                std::fs::write(path, &response.body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            println!(
                "{} {} ({} bytes, from {:?})",
                response.status,
                url,
                response.body.len(),
                source
            );
        }
    }
    Ok(())
}

pub async fn offline_list(ctx: &AppContext) -> Result<()> {
    let worker = ctx.offline_worker(None)?;
    if !worker.is_installed().await? {
        println!("{} is not installed. Run `netcontrol offline install`.", worker.cache_name());
        return Ok(());
    }
    let entries = worker.storage().entries(worker.cache_name()).await?;
    println!("{} ({} entries)", worker.cache_name(), entries.len());
    for entry in entries {
        println!(
            "{:>4} {:>9} {:>10}  {}",
            entry.status,
            entry.size,
            entry.age_display(),
            entry.url
        );
    }
    Ok(())
}
