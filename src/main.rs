// Example runner for the `chili_ripeness` library.
//
//   chili_ripeness <image_path> [--dump-dir DIR]
//
// Prints both models' predictions as JSON. With `--dump-dir`, the intermediate
// preprocessing views are written next to each other as PNGs for inspection.

use anyhow::{bail, Context};
use chili_ripeness::core_modules::decoder::decode_image;
use chili_ripeness::core_modules::utils::image_helper::image_helper::{save_gray, save_rgb};
use chili_ripeness::{EngineConfig, PredictionOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

struct Args {
    image_path: PathBuf,
    dump_dir: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut image_path = None;
    let mut dump_dir = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump-dir" => {
                dump_dir = Some(PathBuf::from(args.next().context("--dump-dir needs a directory")?));
            }
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            path if image_path.is_none() => image_path = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {}", extra),
        }
    }
    let image_path = image_path.context("usage: chili_ripeness <image_path> [--dump-dir DIR]")?;
    Ok(Args { image_path, dump_dir })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "chili_ripeness=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args()?;
    let config = EngineConfig::from_env();
    let orchestrator = PredictionOrchestrator::from_config(&config).context("failed to start worker pool")?;
    orchestrator.warm_up().await.context("failed to load models")?;

    let bytes = tokio::fs::read(&args.image_path)
        .await
        .with_context(|| format!("failed to read {}", args.image_path.display()))?;
    info!(path = %args.image_path.display(), size = bytes.len(), "image loaded");

    let image = Arc::new(decode_image(&bytes)?);
    if let Some(dump_dir) = &args.dump_dir {
        let processed = orchestrator.engine().preprocess(Arc::clone(&image)).await?;
        std::fs::create_dir_all(dump_dir).with_context(|| format!("failed to create {}", dump_dir.display()))?;
        save_gray(&dump_dir.join("mask.png"), &processed.mask)?;
        save_rgb(&dump_dir.join("enhanced.png"), &processed.enhanced_image)?;
        save_gray(&dump_dir.join("equalized_gray.png"), &processed.equalized_gray)?;
        info!(dir = %dump_dir.display(), mask = ?processed.mask_origin, "preprocessing views written");
    }

    let pair = orchestrator.predict_image(image).await?;
    println!("{}", serde_json::to_string_pretty(&pair)?);
    Ok(())
}
