use campus_tb::*;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/**** Project patterns ****************************************************************************
 * Don't use apreviations, as Rust does
 * Always east before north, like in GroundPosition
 * Only a broken configuration stops the run, failing sources just leave a gap
 */

#[derive(Parser, Debug, Clone)]
#[command(about = "Campus ToolBox: GeoJSON footprints to a pickable 3D campus", version, long_about = None)]
pub struct CampusArgs {
    /// Directory or http(s) URL of the GeoJSON files
    #[arg(short, long)]
    pub data: Option<String>,
    /// JSON file with settings, missing fields keep the campus defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// JSON map of building id to display name
    #[arg(long)]
    pub names: Option<PathBuf>,
    /// JSON map of building id to texture path
    #[arg(long)]
    pub textures: Option<PathBuf>,
    /// Number of building sources
    #[arg(short = 'n', long)]
    pub count: Option<u32>,
    #[arg(short, long)]
    pub batch_size: Option<usize>,
    /// Pixel to pick with the overview camera, like "640,360"
    #[arg(long, value_parser = parse_pixel)]
    pub click: Option<(f64, f64)>,
    #[arg(long, default_value = "1280")]
    pub width: f64,
    #[arg(long, default_value = "720")]
    pub height: f64,
    /// Print every registered building
    #[arg(short, long)]
    pub list: bool,
}

fn parse_pixel(text: &str) -> Result<(f64, f64), String> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {text}"))?;
    let x = x.trim().parse::<f64>().map_err(|error| error.to_string())?;
    let y = y.trim().parse::<f64>().map_err(|error| error.to_string())?;
    Ok((x, y))
}

fn load_config(args: &CampusArgs) -> Result<(CampusConfig, SideTables), ConfigError> {
    let mut config = match &args.config {
        Some(path) => CampusConfig::from_file(path)?,
        None => CampusConfig::default(),
    };
    if let Some(data) = &args.data {
        config.data = data.clone();
    }
    if let Some(count) = args.count {
        config.source_count = count;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }

    let side_tables = if args.names.is_some() || args.textures.is_some() {
        SideTables::from_files(args.names.as_deref(), args.textures.as_deref())?
    } else {
        SideTables::campus()?
    };
    Ok((config, side_tables))
}

fn texture_loader(config: &CampusConfig) -> Box<dyn TextureLoader> {
    match fetcher_for(&config.data) {
        AnyFetcher::Http(_) => Box::new(DeferredTextureLoader {
            repeat: config.texture.repeat,
        }),
        AnyFetcher::File(_) => Box::new(FileTextureLoader::new(
            &config.texture_root,
            config.texture.repeat,
        )),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(error) => error!("output not serializable: {error}"),
    }
}

fn report_click(campus: &mut Campus, args: &CampusArgs, (x, y): (f64, f64)) {
    let mut camera = campus.config.camera;
    camera.aspect = args.width / args.height;
    let ray = camera.screen_ray(x, y, args.width, args.height);

    let mut controller = campus.pick_controller();
    let mut display = CollectedInfo::default();
    let state = controller.click(ray.as_ref(), &mut campus.scene, &campus.registry, &mut display);
    info!("click at {x},{y}: {state:?}");
    for info in &display.emitted {
        print_json(info);
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////
// MAIN ///////////////////////////////////////////////////////////////////////////////////////////

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = CampusArgs::parse();
    let (config, side_tables) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(error) => {
            error!("{error}");
            return ExitCode::FAILURE;
        }
    };
    info!("campus from {}, {} sources", config.data, config.source_count);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            error!("no async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    let fetcher = fetcher_for(&config.data);
    let registry = BuildingRegistry::new(
        side_tables,
        config.palette.clone(),
        config.texture.clone(),
        TextureCache::new(texture_loader(&config)),
    );
    let mut campus = Campus::new(config, registry);
    runtime.block_on(campus.load(&fetcher));

    print_json(&campus.report);
    if args.list {
        for record in campus.registry.records() {
            println!(
                "{:>4}  {:<40} {:>6.1} m  {} meshes  {:?}",
                record.building_id,
                record.display_name,
                record.height_meters,
                record.mesh_handles.len(),
                record.material_descriptor
            );
        }
    }
    if let Some(pixel) = args.click {
        report_click(&mut campus, &args, pixel);
    }

    #[cfg(feature = "bevy")]
    render_init(campus);

    ExitCode::SUCCESS
}
