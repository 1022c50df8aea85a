//! Command-line sessions against the headless map engine

use crate::AppError;
use crate::app::{
    Command, FileStorage, JsonPresentation, MapToggle, Presentation, Settings, StorageBackend,
    TrailMapApp, UiState,
};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use trailmap_lib::elevation::TilequeryElevationSource;
use trailmap_lib::layers::{InMemoryEngine, ScreenPoint, ids};
use trailmap_lib::utils::path_length_km;
use trailmap_lib::{
    ElevationSource, ProfileBuilder, RenderingEngine, TrailDataset, TrailFeature, TrailMapError,
};

/// Where the selected trail is drawn in the headless engine
const TRAIL_ANCHOR: ScreenPoint = ScreenPoint::new(0.0, 0.0);

type HeadlessApp<P> = TrailMapApp<TilequeryElevationSource, InMemoryEngine, P>;

/// Execute the command given on the command line
pub async fn run(settings: Settings) -> Result<(), AppError> {
    match settings.command.clone() {
        Command::List => list(&settings),
        Command::Profile { trail_id } => profile(&settings, &trail_id).await,
        Command::Layers => {
            let app = open_map(&settings, None, false).await?;
            print_layers(&app)
        }
        Command::Toggle { toggle, on } => {
            let mut app = open_map(&settings, None, true).await?;
            app.set_toggle(toggle, on)?;
            print_layers(&app)
        }
        Command::Terrain {
            enabled,
            exaggeration,
        } => {
            let mut app = open_map(&settings, None, true).await?;
            if let Some(enabled) = enabled {
                app.set_terrain_enabled(enabled)?;
            }
            if let Some(exaggeration) = exaggeration {
                app.set_terrain_exaggeration(exaggeration)?;
            }
            print_layers(&app)
        }
    }
}

fn load_dataset(settings: &Settings) -> Result<TrailDataset, AppError> {
    let dataset = match (&settings.trails, &settings.gpx) {
        (Some(path), _) => TrailDataset::from_geojson_file(path)?,
        (None, Some(path)) => TrailDataset::from_gpx_file(path)?,
        (None, None) => return Err(AppError::NoDataset),
    };
    tracing::info!(trails = dataset.len(), "Loaded trail dataset");
    Ok(dataset)
}

fn list(settings: &Settings) -> Result<(), AppError> {
    let dataset = load_dataset(settings)?;
    write_trail_list(&dataset, &mut std::io::stdout().lock())?;
    Ok(())
}

/// One `id<TAB>name<TAB>length` line per trail
fn write_trail_list(dataset: &TrailDataset, out: &mut impl Write) -> std::io::Result<()> {
    for trail in dataset.features() {
        let length_km = path_length_km(&trail.path);
        writeln!(out, "{}\t{}\t{:.2} km", trail.id, trail.name, length_km)?;
    }
    Ok(())
}

async fn profile(settings: &Settings, trail_id: &str) -> Result<(), AppError> {
    profiling::scope!("profile_command");
    if settings.token.as_deref().is_none_or(str::is_empty) {
        return Err(AppError::MissingToken);
    }

    let dataset = load_dataset(settings)?;
    let trail = dataset
        .get(trail_id)
        .ok_or_else(|| AppError::UnknownTrail(trail_id.to_string()))?;

    let mut app = open_map(settings, Some(trail), false).await?;
    let job = match app.click(TRAIL_ANCHOR)? {
        Some(job) => job,
        None => {
            tracing::info!("Trails layer hidden, selecting the trail directly");
            app.select(&trail.to_rendered(ids::TRAILS_LINE))?
                .ok_or_else(|| AppError::UnknownTrail(trail_id.to_string()))?
        }
    };

    let completed = job.run().await?;
    app.deliver(Ok(completed));
    Ok(())
}

/// Load the persisted controls, bring up the map and apply `--basemap`.
///
/// With `storage_required`, failing to open the state file is an error;
/// otherwise the session just runs without persistence.
async fn open_map(
    settings: &Settings,
    trail: Option<&TrailFeature>,
    storage_required: bool,
) -> Result<HeadlessApp<JsonPresentation<std::io::Stdout>>, AppError> {
    profiling::scope!("open_map");
    let storage = match FileStorage::new_with_path(settings.state_file.clone()) {
        Ok(storage) => Some(storage),
        Err(e) if !storage_required => {
            tracing::warn!("Running without persisted state: {}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let state = match &storage {
        Some(storage) if !settings.ignore_persisted => UiState::load(storage),
        _ => UiState::default(),
    };

    let mut engine = InMemoryEngine::new().with_style_load_delay(Duration::ZERO);
    if let Some(trail) = trail {
        engine.place_feature(ids::TRAILS_SOURCE, TRAIL_ANCHOR, trail.to_rendered(ids::TRAILS_LINE));
    }

    let source = TilequeryElevationSource::new(settings.token.clone().unwrap_or_default())
        .with_base_url(&settings.tilequery_url);
    let builder = ProfileBuilder::new(source, settings.profile_config());

    let mut app = TrailMapApp::new(engine, builder, state, JsonPresentation::new(std::io::stdout()))
        .with_retry_policy(settings.retry_policy());
    if let Some(storage) = storage {
        app = app.with_storage(Box::new(storage) as Box<dyn StorageBackend>);
    }

    app.load()?;
    app.restore().await?;

    if let Some(basemap) = settings.basemap
        && basemap != app.state().basemap
    {
        app.change_basemap(basemap)?;
        app.restore().await?;
    }

    Ok(app)
}

fn print_layers<P: Presentation>(app: &HeadlessApp<P>) -> Result<(), AppError> {
    let report = layers_report(app);
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &report).map_err(TrailMapError::from)?;
    writeln!(out)?;
    Ok(())
}

/// Controls and layer stack of a loaded map, plus the engine's style document
fn layers_report<S, P>(app: &TrailMapApp<S, InMemoryEngine, P>) -> serde_json::Value
where
    S: ElevationSource,
    P: Presentation,
{
    let sync = app.synchronizer();

    // Topmost first, as a layer panel lists them
    let layers: Vec<serde_json::Value> = app
        .engine()
        .layer_order()
        .iter()
        .rev()
        .filter_map(|id| {
            let spec = sync.registry().layer(id)?;
            Some(json!({
                "id": id,
                "visible": sync.is_visible(id),
                "stack_rank": spec.stack_rank,
            }))
        })
        .collect();

    let toggles: serde_json::Map<String, serde_json::Value> = MapToggle::ALL
        .iter()
        .map(|toggle| (toggle.label().to_string(), json!(app.state().is_on(*toggle))))
        .collect();

    json!({
        "basemap": sync.basemap(),
        "style_url": app.engine().style_url(),
        "terrain": sync.terrain(),
        "toggles": toggles,
        "layers": layers,
        "style": app.engine().style_json(),
    })
}
