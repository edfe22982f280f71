mod bootstrap;
mod render;

use std::time::Duration;

use anyhow::{Context, Result};
use production_core::models::CapacityLogEntry;
use production_core::profile::IngestionProfile;
use production_core::settings::Settings;
use production_data::analysis::{build_dashboard, load_work_orders, DashboardOptions, HISTOGRAM_BINS};
use production_data::capacity::load_capacity_log;
use production_data::export::export_csv;
use production_data::filter::apply_filters;
use production_data::kpi::{load_sector_kpis, KpiCalendar, SectorKpiTable};
use production_data::reader::SourceLocation;
use production_data::twin::ProjectionRequest;
use tracing::{info, warn};

use crate::render::RunOutput;

fn main() -> Result<()> {
    let settings = Settings::load();
    bootstrap::setup_logging(&settings.log_level)?;

    info!("Production dashboard v{} starting", env!("CARGO_PKG_VERSION"));

    let timeout = Duration::from_secs(settings.timeout_secs);
    let profile = settings
        .resolve_profile()
        .context("failed to resolve the ingestion profile")?;
    let criteria = settings.filter_criteria()?;

    let location = SourceLocation::parse(&settings.source);
    let (table, ingestion) = load_work_orders(&location, &profile, timeout)
        .with_context(|| format!("failed to load work orders from {}", location))?;

    let capacity_log = settings
        .capacity_log
        .as_deref()
        .and_then(|raw| load_optional_capacity_log(raw, timeout));
    let sector_kpis = load_all_sector_kpis(&settings.sector_kpi, &profile, timeout);

    let options = DashboardOptions {
        value_column: settings.value_column(),
        top_n: settings.top_n,
        window: settings.window as usize,
        z_threshold: settings.z_threshold,
        histogram_bins: HISTOGRAM_BINS,
        projection: ProjectionRequest {
            shift: settings.shift,
            headcount: settings.headcount,
            working_days: settings.working_days,
            horizon: settings.horizon,
        },
    };
    let report = build_dashboard(&table, &criteria, &options, capacity_log.as_deref());

    if let Some(path) = &settings.export {
        let filtered = apply_filters(&table, &criteria);
        export_csv(&filtered, path)
            .with_context(|| format!("failed to export work orders to {}", path.display()))?;
    }

    let output = RunOutput {
        source: location.to_string(),
        profile: &profile.name,
        ingestion: &ingestion,
        dashboard: &report,
        sector_kpis: &sector_kpis,
    };
    if settings.wants_json() {
        println!("{}", output.to_json()?);
    } else {
        print!("{}", output);
    }

    Ok(())
}

/// The capacity log only feeds the projection, so a failed load degrades to
/// the fallback SDOR instead of aborting the run.
fn load_optional_capacity_log(raw: &str, timeout: Duration) -> Option<Vec<CapacityLogEntry>> {
    let location = SourceLocation::parse(raw);
    match load_capacity_log(&location, timeout) {
        Ok(entries) => {
            info!("Loaded {} capacity log months from {}", entries.len(), location);
            Some(entries)
        }
        Err(e) => {
            warn!("Capacity log {} unavailable, using fallback SDOR: {}", location, e);
            None
        }
    }
}

fn load_all_sector_kpis(
    sources: &[String],
    profile: &IngestionProfile,
    timeout: Duration,
) -> Vec<SectorKpiTable> {
    sources
        .iter()
        .filter_map(|raw| {
            let location = SourceLocation::parse(raw);
            load_sector_kpis(&location, KpiCalendar::default(), profile.numeric_locale, timeout)
                .map_err(|e| warn!("Skipping sector KPI source {}: {}", location, e))
                .ok()
        })
        .collect()
}
